use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::client::WarehouseApi;
use crate::config::CostRates;
use crate::errors::ServiceError;
use crate::models::lenient::parse_timestamp;
use crate::models::{DateRangeRequest, Entrance, MonthlyReport, RecordDetail, ReportItem};
use crate::services::costs::entrance_metrics;

const MONTH_NAMES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Spanish (es-MX) name of `month`, 1-based.
pub fn month_name(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|idx| MONTH_NAMES.get(idx as usize))
        .copied()
}

pub fn monthly_report_filename(year: i32, month: u32) -> Result<String, ServiceError> {
    let name = month_name(month).ok_or_else(|| {
        ServiceError::ValidationError(format!("Month must be between 1 and 12, got {}", month))
    })?;
    Ok(format!("Reporte_Mensual_{}_{}.xlsx", name, year))
}

pub fn date_range_filename(range: &DateRangeRequest) -> String {
    format!("Reporte_{}_{}.xlsx", range.start_date, range.end_date)
}

/// Checks that both dates parse and the range is not inverted.
pub fn validate_date_range(start: &str, end: &str) -> Result<DateRangeRequest, ServiceError> {
    let (start, end) = (start.trim(), end.trim());
    let (Some(from), Some(to)) = (parse_timestamp(start), parse_timestamp(end)) else {
        return Err(ServiceError::ValidationError(
            "Invalid date format".to_string(),
        ));
    };
    if from > to {
        return Err(ServiceError::ValidationError(
            "The start date cannot be after the end date".to_string(),
        ));
    }
    Ok(DateRangeRequest {
        start_date: start.to_string(),
        end_date: end.to_string(),
    })
}

/// Builds the monthly cost summary for entrances received in `year`/`month`.
pub fn summarize_month(
    entrances: &[Entrance],
    year: i32,
    month: u32,
    now: DateTime<Utc>,
    rates: &CostRates,
) -> Result<MonthlyReport, ServiceError> {
    let name = month_name(month).ok_or_else(|| {
        ServiceError::ValidationError(format!("Month must be between 1 and 12, got {}", month))
    })?;
    if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        return Err(ServiceError::ValidationError(format!(
            "{} is not a valid year",
            year
        )));
    }

    let records: Vec<RecordDetail> = entrances
        .iter()
        .filter(|e| e.entry_date.year() == year && e.entry_date.month() == month)
        .map(|e| {
            let metrics = entrance_metrics(e, now, rates);
            let part_numbers = e
                .breakdown()
                .into_iter()
                .map(|p| p.part_number)
                .collect::<Vec<_>>()
                .join(", ");
            RecordDetail {
                id: e.id,
                folio: e.folio,
                part_numbers,
                pallets: e.platforms,
                entry_date: e.entry_date,
                exit_date: e.exit_date,
                days_in_storage: metrics.days_in_warehouse,
                entrance_cost: metrics.entrance_fee,
                exit_cost: metrics.exit_fee,
                storage_cost: metrics.storage_cost,
                total_cost: metrics.total_cost,
            }
        })
        .collect();

    let sum = |f: fn(&RecordDetail) -> Decimal| records.iter().map(f).sum::<Decimal>();
    let completed_records = records.iter().filter(|r| r.exit_date.is_some()).count();

    Ok(MonthlyReport {
        year,
        month,
        month_name: name.to_string(),
        total_records: records.len(),
        total_pallets: records.iter().map(|r| r.pallets).sum(),
        active_records: records.len() - completed_records,
        completed_records,
        total_entry_cost: sum(|r| r.entrance_cost),
        total_exit_cost: sum(|r| r.exit_cost),
        total_storage_cost: sum(|r| r.storage_cost),
        total_general_cost: sum(|r| r.total_cost),
        records,
    })
}

/// Report listing and spreadsheet downloads.
#[derive(Clone)]
pub struct ReportService {
    api: Arc<dyn WarehouseApi>,
    rates: CostRates,
    report_dir: PathBuf,
}

impl ReportService {
    pub fn new(api: Arc<dyn WarehouseApi>, rates: CostRates, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            rates,
            report_dir: report_dir.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn available_reports(&self) -> Result<Vec<ReportItem>, ServiceError> {
        self.api.list_available_reports().await
    }

    /// Downloads the backend spreadsheet for a month and returns its path.
    #[instrument(skip(self))]
    pub async fn download_monthly(&self, year: i32, month: u32) -> Result<PathBuf, ServiceError> {
        let filename = monthly_report_filename(year, month)?;
        let bytes = self.api.download_monthly_report(year, month).await?;
        self.save(&filename, bytes).await
    }

    /// Downloads the spreadsheet for an inclusive date range.
    #[instrument(skip(self))]
    pub async fn download_range(&self, start: &str, end: &str) -> Result<PathBuf, ServiceError> {
        let range = validate_date_range(start, end)?;
        let bytes = self.api.download_report_by_date_range(&range).await?;
        self.save(&date_range_filename(&range), bytes).await
    }

    /// Computes the monthly summary from the live entrance listing.
    #[instrument(skip(self))]
    pub async fn monthly_summary(
        &self,
        year: i32,
        month: u32,
        now: DateTime<Utc>,
    ) -> Result<MonthlyReport, ServiceError> {
        let entrances = self.api.list_entrances().await?;
        summarize_month(&entrances, year, month, now, &self.rates)
    }

    async fn save(&self, filename: &str, bytes: Bytes) -> Result<PathBuf, ServiceError> {
        tokio::fs::create_dir_all(&self.report_dir).await?;
        let path = self.report_dir.join(filename);
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), size = bytes.len(), "report saved");
        Ok(path)
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }
}
