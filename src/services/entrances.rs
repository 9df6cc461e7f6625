use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationError};

use crate::client::WarehouseApi;
use crate::config::CostRates;
use crate::errors::ServiceError;
use crate::models::lenient::parse_timestamp;
use crate::models::{Entrance, EntranceForm, ExitPatch, MutationResponse, PartNumberQuantity};
use crate::services::costs::{entrance_metrics, general_metrics, GeneralMetrics, PlatformMetrics};

const MAX_VISIBLE_PAGES: usize = 5;

/// Operator input for creating or editing an entrance.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct EntranceDraft {
    #[validate(range(min = 1, message = "Folio is required and must be greater than 0"))]
    pub folio: i64,
    #[validate(custom = "validate_entry_date")]
    pub entry_date: String,
    pub part_numbers: Vec<PartNumberQuantity>,
}

impl EntranceDraft {
    /// Validates the draft and builds the request body.
    ///
    /// Rows with a blank part number are dropped before the remaining rules
    /// are checked.
    pub fn into_form(self) -> Result<EntranceForm, ServiceError> {
        self.validate()?;

        let part_numbers: Vec<PartNumberQuantity> = self
            .part_numbers
            .into_iter()
            .filter_map(|p| {
                let name = p.part_number.trim();
                (!name.is_empty()).then(|| PartNumberQuantity::new(name, p.quantity))
            })
            .collect();

        if part_numbers.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one part number is required".to_string(),
            ));
        }
        if let Some(bad) = part_numbers.iter().find(|p| p.quantity <= 0) {
            return Err(ServiceError::ValidationError(format!(
                "Quantity for part number \"{}\" must be greater than 0",
                bad.part_number
            )));
        }
        if part_numbers.iter().map(|p| p.quantity).sum::<i64>() <= 0 {
            return Err(ServiceError::ValidationError(
                "Total number of pieces cannot be 0".to_string(),
            ));
        }

        Ok(EntranceForm {
            folio: self.folio,
            entry_date: self.entry_date.trim().to_string(),
            part_numbers,
        })
    }
}

fn validate_entry_date(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("Entry date is required".into());
        return Err(err);
    }
    if parse_timestamp(value).is_none() {
        let mut err = ValidationError::new("invalid_date");
        err.message = Some(format!("'{}' is not a valid entry date", value.trim()).into());
        return Err(err);
    }
    Ok(())
}

/// Checks an exit against a single entrance and builds the patch body.
pub fn build_exit_patch(
    entrance: &Entrance,
    platforms: i64,
    exit_date: &str,
) -> Result<ExitPatch, ServiceError> {
    if platforms < 0 {
        return Err(ServiceError::ValidationError(
            "Number of pallets cannot be negative".to_string(),
        ));
    }
    if platforms > entrance.platforms {
        return Err(ServiceError::ValidationError(format!(
            "Exit quantity cannot exceed {} (available pallets)",
            entrance.platforms
        )));
    }
    if exit_date.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Exit date is required".to_string(),
        ));
    }
    let exit_date = parse_timestamp(exit_date).ok_or_else(|| {
        ServiceError::ValidationError(format!("'{}' is not a valid exit date", exit_date.trim()))
    })?;

    Ok(ExitPatch {
        platforms,
        exit_date: exit_date.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Listing status filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StatusFilter {
    #[default]
    All,
    /// No exit date yet
    Active,
    /// Exit date set
    Completed,
}

/// Criteria applied to the entrance listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntranceFilter {
    pub status: StatusFilter,
    pub part_number: Option<String>,
    pub entry_from: Option<NaiveDate>,
    pub entry_to: Option<NaiveDate>,
}

impl EntranceFilter {
    pub fn matches(&self, entrance: &Entrance) -> bool {
        let status_ok = match self.status {
            StatusFilter::All => true,
            StatusFilter::Active => entrance.exit_date.is_none(),
            StatusFilter::Completed => entrance.exit_date.is_some(),
        };
        if !status_ok {
            return false;
        }

        if let Some(part) = &self.part_number {
            if !entrance.has_part_number(part) {
                return false;
            }
        }

        let entry_day = entrance.entry_date.date_naive();
        if self.entry_from.map_or(false, |from| entry_day < from) {
            return false;
        }
        if self.entry_to.map_or(false, |to| entry_day > to) {
            return false;
        }
        true
    }

    pub fn apply(&self, entrances: Vec<Entrance>) -> Vec<Entrance> {
        entrances.into_iter().filter(|e| self.matches(e)).collect()
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, clamped to the available pages
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// Page numbers to offer around the current one
    pub window: Vec<usize>,
}

/// Slices `items` into the requested page.
///
/// Requests outside `[1, total_pages]` are clamped. An empty listing yields
/// page 1 of 0.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = (total_items + page_size - 1) / page_size;
    let page = page.clamp(1, total_pages.max(1));

    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        total_pages,
        total_items,
        window: page_window(page, total_pages),
    }
}

/// Up to five page numbers centred on `current`, shifted at the edges.
pub fn page_window(current: usize, total_pages: usize) -> Vec<usize> {
    if total_pages == 0 {
        return Vec::new();
    }
    let mut start = current.saturating_sub(MAX_VISIBLE_PAGES / 2).max(1);
    let end = (start + MAX_VISIBLE_PAGES - 1).min(total_pages);
    if end + 1 - start < MAX_VISIBLE_PAGES {
        start = (end + 1).saturating_sub(MAX_VISIBLE_PAGES).max(1);
    }
    (start..=end).collect()
}

/// An entrance with its running costs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntranceWithMetrics {
    pub entrance: Entrance,
    pub metrics: PlatformMetrics,
}

/// Entrance registration, editing and listing.
#[derive(Clone)]
pub struct EntranceService {
    api: Arc<dyn WarehouseApi>,
    rates: CostRates,
}

impl EntranceService {
    pub fn new(api: Arc<dyn WarehouseApi>, rates: CostRates) -> Self {
        Self { api, rates }
    }

    /// Fetches every entrance and keeps those matching `filter`.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: &EntranceFilter) -> Result<Vec<Entrance>, ServiceError> {
        let entrances = self.api.list_entrances().await?;
        let total = entrances.len();
        let filtered = filter.apply(entrances);
        info!(total, matched = filtered.len(), "entrances listed");
        Ok(filtered)
    }

    /// Attaches cost metrics computed at `now`.
    pub fn with_metrics(
        &self,
        entrances: Vec<Entrance>,
        now: DateTime<Utc>,
    ) -> Vec<EntranceWithMetrics> {
        entrances
            .into_iter()
            .map(|entrance| EntranceWithMetrics {
                metrics: entrance_metrics(&entrance, now, &self.rates),
                entrance,
            })
            .collect()
    }

    /// Totals over a listing, `None` when it is empty.
    pub fn general_metrics(
        &self,
        entrances: &[Entrance],
        now: DateTime<Utc>,
    ) -> Option<GeneralMetrics> {
        let metrics: Vec<PlatformMetrics> = entrances
            .iter()
            .map(|e| entrance_metrics(e, now, &self.rates))
            .collect();
        general_metrics(&metrics)
    }

    #[instrument(skip(self, draft), fields(folio = draft.folio))]
    pub async fn create(&self, draft: EntranceDraft) -> Result<MutationResponse, ServiceError> {
        let form = draft.into_form()?;
        let response = self.api.create_entrance(&form).await?;
        ensure_accepted(response, "Could not save the entrance")
    }

    #[instrument(skip(self, draft), fields(folio = draft.folio))]
    pub async fn update(
        &self,
        id: i64,
        draft: EntranceDraft,
    ) -> Result<MutationResponse, ServiceError> {
        if id <= 0 {
            return Err(ServiceError::ValidationError(
                "An entrance id is required to update".to_string(),
            ));
        }
        let form = draft.into_form()?;
        let response = self.api.update_entrance(id, &form).await?;
        ensure_accepted(response, "Could not update the entrance")
    }

    /// Registers an exit for the entrance with `id`.
    #[instrument(skip(self))]
    pub async fn register_exit(
        &self,
        id: i64,
        platforms: i64,
        exit_date: &str,
    ) -> Result<MutationResponse, ServiceError> {
        let entrances = self.api.list_entrances().await?;
        let entrance = entrances
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Entrance {} not found", id)))?;

        let patch = build_exit_patch(entrance, platforms, exit_date)?;
        let response = self.api.patch_entrance_exit(id, &patch).await?;
        ensure_accepted(response, "Could not register the exit")
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<MutationResponse, ServiceError> {
        let response = self.api.delete_entrance(id).await?;
        ensure_accepted(response, "Could not delete the entrance")
    }
}

fn ensure_accepted(
    response: MutationResponse,
    fallback: &str,
) -> Result<MutationResponse, ServiceError> {
    if response.success {
        return Ok(response);
    }
    let message = response
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    warn!(%message, "backend rejected mutation");
    Err(ServiceError::ExternalApiError(message))
}
