//! JSON response types and formatting for CLI output.

use serde::Serialize;

use crate::sqlite::{InventoryRecord, Loan};
use crate::types::{SearchHit, TitleView};

/// Response for a successfully created or updated title.
#[derive(Serialize)]
pub struct TitleResponse {
    pub status: String,
    #[serde(flatten)]
    pub title: TitleView,
}

/// Response for listing titles.
#[derive(Serialize)]
pub struct TitleListResponse {
    pub titles: Vec<TitleView>,
}

/// Response for semantic search results.
#[derive(Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

/// Response for a loan-affecting operation (borrow or return).
#[derive(Serialize)]
pub struct LoanResponse {
    pub status: String,
    #[serde(flatten)]
    pub loan: Loan,
}

/// Response for listing loans.
#[derive(Serialize)]
pub struct LoanListResponse {
    pub loans: Vec<Loan>,
}

/// Response for an inventory record.
#[derive(Serialize)]
pub struct InventoryResponse {
    pub status: String,
    #[serde(flatten)]
    pub inventory: InventoryRecord,
    pub available_copies: i64,
}

/// Response for listing inventory records.
#[derive(Serialize)]
pub struct InventoryListResponse {
    pub records: Vec<InventoryRecord>,
}

/// Response for the staff statistics dashboard.
#[derive(Serialize)]
pub struct StatsResponse {
    pub total_titles: i64,
    pub total_borrowed: i64,
    pub open_loans: i64,
}

/// Response for successful deletions.
#[derive(Serialize)]
pub struct DeleteResponse {
    pub status: String,
    pub id: i64,
}

/// Response for errors, carrying the stable error code.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Print a value as formatted JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}
