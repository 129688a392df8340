//! Receipt uploads and parsing.
//!
//! This module contains:
//! - The text parser that pulls the total, date, and merchant out of
//!   OCR-extracted receipt text ([parser])
//! - The REST handlers for uploading, serving, and deleting receipt files
//!   ([handlers])

mod handlers;
mod parser;

pub use handlers::{delete_receipt_endpoint, get_receipt_endpoint, upload_receipt_endpoint};
pub use parser::{ReceiptData, parse_receipt_text};
