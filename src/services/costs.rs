use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::CostRates;
use crate::models::Entrance;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Aging and cost figures for a single pallet record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMetrics {
    pub days_in_warehouse: i64,
    pub storage_cost: Decimal,
    pub entrance_fee: Decimal,
    pub exit_fee: Decimal,
    pub total_cost: Decimal,
}

/// Whole days a record has been (or was) stored.
///
/// Partial days round up and a record is billed at least one day. Still-open
/// records are measured against `now`.
pub fn days_in_warehouse(
    entry: DateTime<Utc>,
    exit: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    let departure = exit.unwrap_or(now);
    let elapsed_ms = (departure - entry).num_milliseconds().abs();
    let days = (elapsed_ms + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
    days.max(1)
}

/// Computes the metrics of one record under `rates`.
pub fn calculate_metrics(
    entry: DateTime<Utc>,
    exit: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    rates: &CostRates,
) -> PlatformMetrics {
    let days = days_in_warehouse(entry, exit, now);
    let storage_cost = Decimal::from(days) * rates.daily_storage;
    let entrance_fee = rates.entrance_fee;
    let exit_fee = if exit.is_some() {
        rates.exit_fee
    } else {
        Decimal::ZERO
    };

    PlatformMetrics {
        days_in_warehouse: days,
        storage_cost,
        entrance_fee,
        exit_fee,
        total_cost: entrance_fee + exit_fee + storage_cost,
    }
}

/// Convenience wrapper over [`calculate_metrics`] for an entrance.
pub fn entrance_metrics(entrance: &Entrance, now: DateTime<Utc>, rates: &CostRates) -> PlatformMetrics {
    calculate_metrics(entrance.entry_date, entrance.exit_date, now, rates)
}

/// Totals over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralMetrics {
    pub record_count: usize,
    pub total_storage_cost: Decimal,
    pub total_entrance_fees: Decimal,
    pub total_exit_fees: Decimal,
    pub total_general_cost: Decimal,
    pub total_days_in_warehouse: i64,
    pub average_days_in_warehouse: Decimal,
}

/// Aggregates per-record metrics. Returns `None` for an empty set.
pub fn general_metrics<'a, I>(metrics: I) -> Option<GeneralMetrics>
where
    I: IntoIterator<Item = &'a PlatformMetrics>,
{
    let mut totals = GeneralMetrics::default();
    for m in metrics {
        totals.record_count += 1;
        totals.total_storage_cost += m.storage_cost;
        totals.total_entrance_fees += m.entrance_fee;
        totals.total_exit_fees += m.exit_fee;
        totals.total_days_in_warehouse += m.days_in_warehouse;
    }

    if totals.record_count == 0 {
        return None;
    }

    totals.total_general_cost =
        totals.total_storage_cost + totals.total_entrance_fees + totals.total_exit_fees;
    totals.average_days_in_warehouse = (Decimal::from(totals.total_days_in_warehouse)
        / Decimal::from(totals.record_count as u64))
    .round_dp(2);
    Some(totals)
}
