// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Amount rendering for the payment sheet.

use super::Currency;

/// USD with two fraction digits and thousands separators, e.g. `1,234.50`.
pub fn format_usd(amount: f64) -> String {
    if !amount.is_finite() || amount == 0.0 {
        return "0.00".to_string();
    }
    let fixed = format!("{amount:.2}");
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    format!("{}.{fraction}", group_thousands(whole))
}

/// Whole riel for a USD amount at the configured rate.
pub fn usd_to_khr(amount: f64, khr_per_usd: f64) -> i64 {
    let khr = (amount * khr_per_usd).round();
    if khr.is_finite() {
        khr as i64
    } else {
        0
    }
}

/// KHR with no fraction digits and thousands separators, e.g. `410,000`.
pub fn format_khr(amount_usd: f64, khr_per_usd: f64) -> String {
    group_thousands(&usd_to_khr(amount_usd, khr_per_usd).to_string())
}

pub fn display_amount(amount_usd: f64, currency: Currency, khr_per_usd: f64) -> String {
    match currency {
        Currency::Usd => format_usd(amount_usd),
        Currency::Khr => format_khr(amount_usd, khr_per_usd),
    }
}

fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_has_two_decimals_and_separators() {
        assert_eq!(format_usd(100.0), "100.00");
        assert_eq!(format_usd(1234.5), "1,234.50");
        assert_eq!(format_usd(1_000_000.0), "1,000,000.00");
        assert_eq!(format_usd(0.0), "0.00");
        assert_eq!(format_usd(f64::NAN), "0.00");
    }

    #[test]
    fn khr_is_rounded_whole_riel() {
        assert_eq!(format_khr(100.0, 4100.0), "410,000");
        assert_eq!(format_khr(0.25, 4100.0), "1,025");
        assert_eq!(format_khr(12.3456, 4100.0), "50,617");
        assert_eq!(format_khr(0.1, 4100.0), "410");
    }

    #[test]
    fn rate_is_not_baked_in() {
        assert_eq!(format_khr(100.0, 4000.0), "400,000");
    }

    #[test]
    fn display_follows_currency() {
        assert_eq!(display_amount(100.0, Currency::Usd, 4100.0), "100.00");
        assert_eq!(display_amount(100.0, Currency::Khr, 4100.0), "410,000");
    }

    #[test]
    fn negative_amounts_keep_sign_outside_groups() {
        assert_eq!(group_thousands("-1234567"), "-1,234,567");
        assert_eq!(group_thousands("123"), "123");
    }
}
