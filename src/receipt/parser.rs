//! Extracts structured fields from receipt text.
//!
//! Text extraction itself (OCR for images, text layers for PDFs) happens
//! outside this server; this parser takes whatever text came out of that
//! step and recovers the fields worth pre-filling a transaction form with:
//! the total, the purchase date, and the merchant name. Receipts are messy,
//! so every field is optional and a failed match is never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Patterns for the receipt total, tried in order. The first match wins.
static TOTAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)total\s*:?\s*\$?(\d+\.?\d*)").unwrap(),
        Regex::new(r"(?i)amount\s*:?\s*\$?(\d+\.?\d*)").unwrap(),
        Regex::new(r"(?i)grand\s*total\s*:?\s*\$?(\d+\.?\d*)").unwrap(),
    ]
});

/// Patterns for the purchase date: slash, dash, and ISO forms.
static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(\d{1,2}/\d{1,2}/\d{2,4})").unwrap(),
        Regex::new(r"(\d{1,2}-\d{1,2}-\d{2,4})").unwrap(),
        Regex::new(r"(\d{4}-\d{2}-\d{2})").unwrap(),
    ]
});

/// Patterns for the merchant name: an all-caps or capitalized line near the
/// top of the receipt.
static MERCHANT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^([A-Z\s&]+)$").unwrap(),
        Regex::new(r"^([A-Z][a-z\s&]+)$").unwrap(),
    ]
});

/// How many lines from the top of the receipt to scan for the merchant name.
const MERCHANT_SCAN_LINES: usize = 5;

/// The fields recovered from a receipt's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReceiptData {
    /// The receipt total, if a total-like line was found.
    pub total: Option<f64>,
    /// The purchase date as it appeared on the receipt, unparsed.
    pub date: Option<String>,
    /// The merchant name, if a plausible name line was found.
    pub merchant: Option<String>,
}

/// Parse receipt text to extract the total, date, and merchant.
///
/// Fields that cannot be recovered are left as `None`; empty input yields
/// an empty [ReceiptData].
pub fn parse_receipt_text(text: &str) -> ReceiptData {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    ReceiptData {
        total: extract_total(text),
        date: extract_date(text),
        merchant: extract_merchant(&lines),
    }
}

fn extract_total(text: &str) -> Option<f64> {
    for pattern in TOTAL_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(text) {
            if let Ok(total) = captures[1].parse() {
                return Some(total);
            }
        }
    }

    None
}

fn extract_date(text: &str) -> Option<String> {
    for pattern in DATE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(text) {
            return Some(captures[1].to_owned());
        }
    }

    None
}

fn extract_merchant(lines: &[&str]) -> Option<String> {
    for line in lines.iter().take(MERCHANT_SCAN_LINES) {
        for pattern in MERCHANT_PATTERNS.iter() {
            if let Some(captures) = pattern.captures(line) {
                let candidate = captures[1].trim();

                if candidate.len() > 3 && candidate.len() < 50 {
                    return Some(candidate.to_owned());
                }
            }
        }
    }

    None
}
