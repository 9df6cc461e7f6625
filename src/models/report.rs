use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::lenient;

/// A month for which the backend can produce a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub year: i64,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub month: i64,
    #[serde(default)]
    pub month_name: String,
}

/// Body of the date-range report request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeRequest {
    pub start_date: String,
    pub end_date: String,
}

/// Cost breakdown of a single record inside a monthly summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetail {
    pub id: i64,
    pub folio: i64,
    pub part_numbers: String,
    pub pallets: i64,
    pub entry_date: DateTime<Utc>,
    pub exit_date: Option<DateTime<Utc>>,
    pub days_in_storage: i64,
    pub entrance_cost: Decimal,
    pub exit_cost: Decimal,
    pub storage_cost: Decimal,
    pub total_cost: Decimal,
}

/// Locally computed monthly report, mirroring the spreadsheet the backend
/// produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub total_records: usize,
    pub total_pallets: i64,
    pub active_records: usize,
    pub completed_records: usize,
    pub total_entry_cost: Decimal,
    pub total_exit_cost: Decimal,
    pub total_storage_cost: Decimal,
    pub total_general_cost: Decimal,
    pub records: Vec<RecordDetail>,
}
