// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-invoice payment flow driver.
//!
//! The engine owns at most one flow task. Restarting (retry, currency
//! switch) or closing cancels the task through its `CancellationToken` and
//! awaits it before anything new is spawned, so two poll loops never
//! overlap. Inside the task each status request is awaited before the next
//! tick is scheduled, which keeps at most one request in flight.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::amount::display_amount;
use super::{Currency, PaymentBackend, PaymentRequest};
use crate::config::PaymentSettings;
use crate::error::ApiError;
use crate::models::Invoice;

/// Shown when code generation fails without a server explanation.
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate QR code";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Idle,
    Generating,
    Ready,
    Polling,
    Confirmed,
    Failed,
}

impl PaymentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentState::Confirmed | PaymentState::Failed)
    }
}

/// Everything the payment sheet renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSnapshot {
    pub state: PaymentState,
    pub currency: Currency,
    /// KHQR payload to render as a QR code.
    pub code: Option<String>,
    pub last_error: Option<String>,
    pub amount_display: String,
    /// Set once, after the grace period following confirmation.
    pub close_requested: bool,
}

struct Flow {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PaymentEngine {
    backend: Arc<dyn PaymentBackend>,
    invoice_id: String,
    amount: f64,
    settings: PaymentSettings,
    snapshot: Arc<watch::Sender<PaymentSnapshot>>,
    flow: Option<Flow>,
}

impl PaymentEngine {
    pub fn new(backend: Arc<dyn PaymentBackend>, invoice: &Invoice, settings: PaymentSettings) -> Self {
        let currency = Currency::default();
        let (snapshot, _) = watch::channel(idle_snapshot(
            currency,
            display_amount(invoice.total_amount, currency, settings.khr_per_usd),
        ));
        Self {
            backend,
            invoice_id: invoice.id.clone(),
            amount: invoice.total_amount,
            settings,
            snapshot: Arc::new(snapshot),
            flow: None,
        }
    }

    pub fn snapshot(&self) -> PaymentSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaymentSnapshot> {
        self.snapshot.subscribe()
    }

    /// The sheet became visible: start generating a code.
    pub async fn open(&mut self) {
        if self.snapshot.borrow().state != PaymentState::Idle {
            return;
        }
        if self.invoice_id.trim().is_empty() || !self.amount.is_finite() {
            warn!(invoice_id = %self.invoice_id, "Refusing to open payment for invalid invoice");
            return;
        }
        self.restart().await;
    }

    /// Manual retry after a generation failure.
    pub async fn retry(&mut self) {
        if self.snapshot.borrow().state != PaymentState::Failed {
            return;
        }
        self.restart().await;
    }

    /// Codes are currency-specific, so an active flow starts over.
    pub async fn select_currency(&mut self, currency: Currency) {
        let state = {
            let current = self.snapshot.borrow();
            if current.currency == currency {
                return;
            }
            current.state
        };

        match state {
            PaymentState::Confirmed => {}
            PaymentState::Idle => {
                let amount_display = self.display_for(currency);
                self.snapshot.send_modify(|s| {
                    s.currency = currency;
                    s.amount_display = amount_display;
                });
            }
            PaymentState::Generating
            | PaymentState::Ready
            | PaymentState::Polling
            | PaymentState::Failed => {
                self.stop().await;
                let amount_display = self.display_for(currency);
                self.snapshot.send_modify(|s| {
                    s.currency = currency;
                    s.amount_display = amount_display;
                });
                self.restart().await;
            }
        }
    }

    /// The sheet was dismissed. Timers are cancelled and the session is
    /// discarded; a later `open` starts from scratch.
    pub async fn close(&mut self) {
        self.stop().await;
        let currency = Currency::default();
        let amount_display = self.display_for(currency);
        self.snapshot
            .send_replace(idle_snapshot(currency, amount_display));
    }

    fn display_for(&self, currency: Currency) -> String {
        display_amount(self.amount, currency, self.settings.khr_per_usd)
    }

    async fn restart(&mut self) {
        self.stop().await;

        let currency = self.snapshot.borrow().currency;
        self.snapshot.send_modify(|s| {
            s.state = PaymentState::Generating;
            s.code = None;
            s.last_error = None;
            s.close_requested = false;
        });

        let cancel = CancellationToken::new();
        let task = FlowTask {
            backend: self.backend.clone(),
            request: PaymentRequest {
                invoice_id: self.invoice_id.clone(),
                amount: self.amount,
                currency,
            },
            settings: self.settings,
            snapshot: self.snapshot.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run());
        self.flow = Some(Flow { cancel, handle });
    }

    async fn stop(&mut self) {
        if let Some(flow) = self.flow.take() {
            flow.cancel.cancel();
            if let Err(e) = flow.handle.await {
                if e.is_panic() {
                    warn!(invoice_id = %self.invoice_id, error = %e, "Payment flow task panicked");
                }
            }
        }
    }
}

impl Drop for PaymentEngine {
    fn drop(&mut self) {
        if let Some(flow) = self.flow.take() {
            flow.cancel.cancel();
            flow.handle.abort();
        }
    }
}

fn idle_snapshot(currency: Currency, amount_display: String) -> PaymentSnapshot {
    PaymentSnapshot {
        state: PaymentState::Idle,
        currency,
        code: None,
        last_error: None,
        amount_display,
        close_requested: false,
    }
}

/// One generate-then-poll run for a fixed currency.
struct FlowTask {
    backend: Arc<dyn PaymentBackend>,
    request: PaymentRequest,
    settings: PaymentSettings,
    snapshot: Arc<watch::Sender<PaymentSnapshot>>,
    cancel: CancellationToken,
}

impl FlowTask {
    async fn run(self) {
        let generated = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            result = self.backend.generate_code(&self.request) => result,
        };

        let code = match generated {
            Ok(code) if !code.trim().is_empty() => code,
            Ok(_) => {
                warn!(invoice_id = %self.request.invoice_id, "Payment code response was blank");
                self.fail(GENERATION_FAILED_MESSAGE.to_string());
                return;
            }
            Err(e) => {
                warn!(
                    invoice_id = %self.request.invoice_id,
                    currency = %self.request.currency,
                    error = %e,
                    "Payment code generation failed"
                );
                self.fail(generation_message(e));
                return;
            }
        };

        info!(
            invoice_id = %self.request.invoice_id,
            currency = %self.request.currency,
            "Payment code ready"
        );
        self.snapshot.send_modify(|s| {
            s.state = PaymentState::Ready;
            s.code = Some(code);
        });
        self.snapshot.send_modify(|s| s.state = PaymentState::Polling);

        if !self.poll_until_paid().await {
            return;
        }

        info!(invoice_id = %self.request.invoice_id, "Payment confirmed");
        self.snapshot.send_modify(|s| s.state = PaymentState::Confirmed);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            _ = tokio::time::sleep(self.settings.auto_close_delay) => {},
        }
        self.snapshot.send_modify(|s| s.close_requested = true);
    }

    /// Returns `true` once paid, `false` if cancelled first. Errors are
    /// logged and retried on the next tick without limit.
    async fn poll_until_paid(&self) -> bool {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.settings.poll_interval) => {},
            }

            let status = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                status = self.backend.is_paid(&self.request.invoice_id) => status,
            };

            match status {
                Ok(true) => return true,
                Ok(false) => debug!(invoice_id = %self.request.invoice_id, "Payment not settled yet"),
                Err(e) => warn!(
                    invoice_id = %self.request.invoice_id,
                    error = %e,
                    "Polling error"
                ),
            }
        }
    }

    fn fail(&self, message: String) {
        self.snapshot.send_modify(|s| {
            s.state = PaymentState::Failed;
            s.code = None;
            s.last_error = Some(message);
        });
    }
}

/// The backend's `error` text when it sent one, the generic text otherwise.
fn generation_message(e: ApiError) -> String {
    e.server_error
        .unwrap_or_else(|| GENERATION_FAILED_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvoiceStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const SETTINGS: PaymentSettings = PaymentSettings {
        poll_interval: Duration::from_secs(3),
        auto_close_delay: Duration::from_secs(3),
        khr_per_usd: 4100.0,
    };

    #[derive(Default)]
    struct FakeRail {
        generated: Mutex<Vec<PaymentRequest>>,
        polls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        /// Poll number (1-based) from which the invoice reads as paid.
        paid_from: Option<usize>,
        /// Polls up to and including this number fail.
        failing_polls: usize,
        poll_delay: Duration,
        generation_error: Option<ApiError>,
        blank_code: bool,
    }

    impl FakeRail {
        fn generated(&self) -> Vec<PaymentRequest> {
            self.generated.lock().unwrap().clone()
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    struct InFlight<'a>(&'a AtomicUsize);

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl PaymentBackend for FakeRail {
        async fn generate_code(&self, request: &PaymentRequest) -> Result<String, ApiError> {
            let mut generated = self.generated.lock().unwrap();
            generated.push(request.clone());
            if let Some(e) = &self.generation_error {
                return Err(e.clone());
            }
            if self.blank_code {
                return Ok("   ".to_string());
            }
            Ok(format!("khqr-{}-{}", request.currency, generated.len()))
        }

        async fn is_paid(&self, _invoice_id: &str) -> Result<bool, ApiError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(&self.in_flight);

            tokio::time::sleep(self.poll_delay).await;

            if n <= self.failing_polls {
                return Err(ApiError::transport("Network Error"));
            }
            Ok(self.paid_from.is_some_and(|from| n >= from))
        }
    }

    fn invoice(amount: f64) -> Invoice {
        Invoice {
            id: "inv-0001".to_string(),
            total_amount: amount,
            status: InvoiceStatus::Sent,
            issue_date: None,
            due_date: None,
            items: Vec::new(),
            payments: Vec::new(),
        }
    }

    fn engine(rail: &Arc<FakeRail>) -> PaymentEngine {
        PaymentEngine::new(rail.clone(), &invoice(100.0), SETTINGS)
    }

    async fn wait_until<F>(engine: &PaymentEngine, pred: F) -> PaymentSnapshot
    where
        F: Fn(&PaymentSnapshot) -> bool,
    {
        let mut rx = engine.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|s| pred(s)))
            .await
            .expect("timed out waiting for payment state")
            .expect("payment engine dropped")
            .clone();
        snapshot
    }

    #[tokio::test(start_paused = true)]
    async fn generates_polls_and_confirms_once() {
        let rail = Arc::new(FakeRail {
            paid_from: Some(3),
            ..Default::default()
        });
        let mut engine = engine(&rail);
        assert_eq!(engine.snapshot().state, PaymentState::Idle);

        engine.open().await;
        assert_eq!(engine.snapshot().state, PaymentState::Generating);

        let polling = wait_until(&engine, |s| s.state == PaymentState::Polling).await;
        assert_eq!(polling.code.as_deref(), Some("khqr-USD-1"));
        assert_eq!(polling.amount_display, "100.00");

        let done = wait_until(&engine, |s| s.close_requested).await;
        assert_eq!(done.state, PaymentState::Confirmed);
        assert_eq!(rail.polls(), 3);
        assert_eq!(rail.generated().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_requested_after_confirmation() {
        let rail = Arc::new(FakeRail {
            paid_from: Some(1),
            ..Default::default()
        });
        let mut engine = engine(&rail);
        engine.open().await;
        wait_until(&engine, |s| s.close_requested).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        engine.select_currency(Currency::Khr).await;
        engine.retry().await;
        engine.open().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.state, PaymentState::Confirmed);
        assert_eq!(snapshot.currency, Currency::Usd);
        assert_eq!(rail.polls(), 1);
        assert_eq!(rail.generated().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_status_endpoint_never_overlaps() {
        let rail = Arc::new(FakeRail {
            paid_from: Some(5),
            poll_delay: Duration::from_secs(10),
            ..Default::default()
        });
        let mut engine = engine(&rail);
        engine.open().await;

        wait_until(&engine, |s| s.state == PaymentState::Confirmed).await;

        assert_eq!(rail.polls(), 5);
        assert_eq!(rail.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_errors_keep_polling() {
        let rail = Arc::new(FakeRail {
            paid_from: Some(1),
            failing_polls: 4,
            ..Default::default()
        });
        let mut engine = engine(&rail);
        engine.open().await;

        let done = wait_until(&engine, |s| s.state == PaymentState::Confirmed).await;

        assert_eq!(rail.polls(), 5);
        assert!(done.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn currency_switch_restarts_with_single_loop() {
        let rail = Arc::new(FakeRail::default());
        let mut engine = engine(&rail);
        engine.open().await;
        wait_until(&engine, |s| s.state == PaymentState::Polling).await;
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(rail.polls(), 2);

        engine.select_currency(Currency::Khr).await;
        let restarted = wait_until(&engine, |s| {
            s.currency == Currency::Khr && s.state == PaymentState::Polling
        })
        .await;

        assert_eq!(restarted.code.as_deref(), Some("khqr-KHR-2"));
        assert_eq!(restarted.amount_display, "410,000");

        let generated = rail.generated();
        assert_eq!(generated.len(), 2);
        assert_eq!(generated[1].currency, Currency::Khr);
        assert_eq!(generated[1].amount, 100.0);
        assert_eq!(generated[1].invoice_id, "inv-0001");

        let before = rail.polls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rail.polls() - before, 3);
        assert_eq!(rail.generated().len(), 2);
        assert_eq!(rail.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn generation_failure_surfaces_message_and_allows_retry() {
        let rail = Arc::new(FakeRail {
            generation_error: Some(ApiError::http(400, r#"{"error":"Invoice already paid"}"#)),
            ..Default::default()
        });
        let mut engine = engine(&rail);
        engine.open().await;

        let failed = wait_until(&engine, |s| s.state == PaymentState::Failed).await;
        assert_eq!(failed.last_error.as_deref(), Some("Invoice already paid"));
        assert!(failed.code.is_none());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(rail.polls(), 0);
        assert_eq!(rail.generated().len(), 1);

        engine.retry().await;
        wait_until(&engine, |s| s.state == PaymentState::Failed).await;
        assert_eq!(rail.generated().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_uses_generic_message() {
        let rail = Arc::new(FakeRail {
            generation_error: Some(ApiError::transport("connection refused")),
            ..Default::default()
        });
        let mut engine = engine(&rail);
        engine.open().await;

        let failed = wait_until(&engine, |s| s.state == PaymentState::Failed).await;
        assert_eq!(failed.last_error.as_deref(), Some(GENERATION_FAILED_MESSAGE));
    }

    #[test]
    fn server_error_without_error_field_uses_generic_message() {
        assert_eq!(
            generation_message(ApiError::http(500, "<html>oops</html>")),
            GENERATION_FAILED_MESSAGE
        );
        assert_eq!(
            generation_message(ApiError::http(422, r#"{"message":"amount required"}"#)),
            GENERATION_FAILED_MESSAGE
        );
        assert_eq!(
            generation_message(ApiError::http(400, r#"{"error":"Invoice already paid"}"#)),
            "Invoice already paid"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blank_code_is_a_failure() {
        let rail = Arc::new(FakeRail {
            blank_code: true,
            ..Default::default()
        });
        let mut engine = engine(&rail);
        engine.open().await;

        let failed = wait_until(&engine, |s| s.state == PaymentState::Failed).await;
        assert_eq!(failed.last_error.as_deref(), Some(GENERATION_FAILED_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn currency_switch_from_failed_regenerates() {
        let rail = Arc::new(FakeRail {
            blank_code: true,
            ..Default::default()
        });
        let mut engine = engine(&rail);
        engine.open().await;
        wait_until(&engine, |s| s.state == PaymentState::Failed).await;

        engine.select_currency(Currency::Khr).await;
        wait_until(&engine, |s| s.state == PaymentState::Failed && s.currency == Currency::Khr).await;

        let generated = rail.generated();
        assert_eq!(generated.len(), 2);
        assert_eq!(generated[1].currency, Currency::Khr);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_polling_and_resets() {
        let rail = Arc::new(FakeRail::default());
        let mut engine = engine(&rail);
        engine.select_currency(Currency::Khr).await;
        assert_eq!(engine.snapshot().amount_display, "410,000");
        assert!(rail.generated().is_empty());

        engine.open().await;
        wait_until(&engine, |s| s.state == PaymentState::Polling).await;

        engine.close().await;
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.state, PaymentState::Idle);
        assert_eq!(snapshot.currency, Currency::Usd);
        assert!(snapshot.code.is_none());

        let polls = rail.polls();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(rail.polls(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn close_during_grace_period_suppresses_auto_close() {
        let rail = Arc::new(FakeRail {
            paid_from: Some(1),
            ..Default::default()
        });
        let mut engine = engine(&rail);
        engine.open().await;
        wait_until(&engine, |s| s.state == PaymentState::Confirmed).await;

        engine.close().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!engine.snapshot().close_requested);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_engine_stops_polling() {
        let rail = Arc::new(FakeRail::default());
        let mut engine = engine(&rail);
        engine.open().await;
        wait_until(&engine, |s| s.state == PaymentState::Polling).await;

        drop(engine);
        tokio::time::sleep(Duration::from_secs(1)).await;
        let polls = rail.polls();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(rail.polls(), polls);
    }
}
