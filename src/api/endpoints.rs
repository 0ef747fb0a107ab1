// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed wrappers for each backend endpoint.

use async_trait::async_trait;

use super::client::{ApiClient, OnUnauthorized};
use crate::error::ApiError;
use crate::models::{
    Announcement, Assignment, Course, CourseDetail, GenerateCodeRequest, GenerateCodeResponse,
    Invoice, LoginRequest, LoginResponse, PaymentStatusResponse,
};
use crate::payment::{PaymentBackend, PaymentRequest, GENERATION_FAILED_MESSAGE};
use crate::session::AuthBackend;

impl ApiClient {
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.post_json(
            &["auth", "login"],
            &LoginRequest { email, password },
            OnUnauthorized::Propagate,
        )
        .await
    }

    pub async fn my_courses(&self, student_id: Option<&str>) -> Result<Vec<Course>, ApiError> {
        self.get_json(&["students", "my-courses"], &student_query(student_id))
            .await
    }

    pub async fn my_assignments(&self, student_id: Option<&str>) -> Result<Vec<Assignment>, ApiError> {
        self.get_json(&["students", "my-assignments"], &student_query(student_id))
            .await
    }

    pub async fn invoices(&self) -> Result<Vec<Invoice>, ApiError> {
        self.get_json(&["financial", "invoices"], &[]).await
    }

    pub async fn course(&self, course_id: &str) -> Result<CourseDetail, ApiError> {
        self.get_json(&["courses", course_id], &[]).await
    }

    pub async fn announcements(&self, course_id: &str) -> Result<Vec<Announcement>, ApiError> {
        self.get_json(&["announcements"], &[("courseId", course_id)])
            .await
    }

    pub async fn generate_payment_code(&self, request: &PaymentRequest) -> Result<String, ApiError> {
        let response: GenerateCodeResponse = self
            .post_json(
                &["financial", "bakong-qr"],
                &GenerateCodeRequest {
                    amount: request.amount,
                    currency: request.currency,
                    invoice_id: &request.invoice_id,
                },
                OnUnauthorized::Invalidate,
            )
            .await?;

        response
            .qr_string
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| ApiError::invalid_response(GENERATION_FAILED_MESSAGE))
    }

    pub async fn payment_status(&self, invoice_id: &str) -> Result<bool, ApiError> {
        let response: PaymentStatusResponse = self
            .get_json(&["financial", "bakong-status", invoice_id], &[])
            .await?;
        Ok(response.is_paid)
    }
}

fn student_query(student_id: Option<&str>) -> Vec<(&'static str, &str)> {
    student_id
        .map(|id| vec![("studentId", id)])
        .unwrap_or_default()
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn authenticate(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.login(email, password).await
    }
}

#[async_trait]
impl PaymentBackend for ApiClient {
    async fn generate_code(&self, request: &PaymentRequest) -> Result<String, ApiError> {
        self.generate_payment_code(request).await
    }

    async fn is_paid(&self, invoice_id: &str) -> Result<bool, ApiError> {
        self.payment_status(invoice_id).await
    }
}
