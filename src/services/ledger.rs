use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ServiceError;
use crate::models::{ExitItem, UnitKind};

/// A pending withdrawal the operator has selected but not yet submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedItem {
    pub folio: i64,
    /// Part number, or the `TARIMAS-{folio}` key for whole pallets
    pub part_number: String,
    pub quantity: i64,
    pub max_quantity: i64,
    pub unit_kind: UnitKind,
}

impl SelectedItem {
    /// Checks `0 < quantity <= max_quantity`.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Quantity for {} in folio {} must be greater than 0",
                self.part_number, self.folio
            )));
        }
        if self.quantity > self.max_quantity {
            return Err(ServiceError::ValidationError(format!(
                "Requested {} {} for {} in folio {} but only {} available",
                self.quantity, self.unit_kind, self.part_number, self.folio, self.max_quantity
            )));
        }
        Ok(())
    }

    pub fn to_exit_item(&self) -> ExitItem {
        ExitItem {
            folio: self.folio,
            part_number: self.part_number.clone(),
            quantity: self.quantity,
            is_platforms: self.unit_kind.is_platforms(),
        }
    }
}

/// Why a quantity change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ExceedsMaximum,
    InvalidMaximum,
}

/// Effect of a [`ExitLedger::set_quantity`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Inserted,
    Updated,
    Removed,
    /// Zero requested for an entry that did not exist
    Unchanged,
    /// Out of bounds; the ledger was not touched
    Rejected(RejectReason),
}

impl QuantityChange {
    pub fn is_rejected(self) -> bool {
        matches!(self, QuantityChange::Rejected(_))
    }
}

type LedgerKey = (i64, String, UnitKind);

/// Pending withdrawal selections keyed by (folio, part number, unit kind).
///
/// Every stored quantity satisfies `0 < quantity <= max_quantity`.
#[derive(Debug, Clone, Default)]
pub struct ExitLedger {
    entries: BTreeMap<LedgerKey, SelectedItem>,
}

impl ExitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts, removes or rejects a selection.
    ///
    /// A quantity of zero or less removes the entry. A quantity above
    /// `max_quantity` (or a negative maximum) is rejected without mutation.
    pub fn set_quantity(
        &mut self,
        folio: i64,
        part_number: &str,
        quantity: i64,
        max_quantity: i64,
        unit_kind: UnitKind,
    ) -> QuantityChange {
        let key = (folio, part_number.to_string(), unit_kind);

        if quantity <= 0 {
            return match self.entries.remove(&key) {
                Some(_) => QuantityChange::Removed,
                None => QuantityChange::Unchanged,
            };
        }

        if max_quantity < 0 {
            debug!(folio, part_number, max_quantity, "rejected selection with negative maximum");
            return QuantityChange::Rejected(RejectReason::InvalidMaximum);
        }
        if quantity > max_quantity {
            debug!(folio, part_number, quantity, max_quantity, "rejected selection above maximum");
            return QuantityChange::Rejected(RejectReason::ExceedsMaximum);
        }

        let item = SelectedItem {
            folio,
            part_number: part_number.to_string(),
            quantity,
            max_quantity,
            unit_kind,
        };
        match self.entries.insert(key, item) {
            Some(_) => QuantityChange::Updated,
            None => QuantityChange::Inserted,
        }
    }

    /// Stored quantity for the triple, or 0.
    pub fn get_quantity(&self, folio: i64, part_number: &str, unit_kind: UnitKind) -> i64 {
        self.entries
            .get(&(folio, part_number.to_string(), unit_kind))
            .map(|item| item.quantity)
            .unwrap_or(0)
    }

    /// Sum of every stored quantity.
    pub fn total_selected(&self) -> i64 {
        self.entries.values().map(|item| item.quantity).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops every selection for `folio`.
    pub fn remove_folio(&mut self, folio: i64) {
        self.entries.retain(|(f, _, _), _| *f != folio);
    }

    /// Snapshot of the selections in key order.
    pub fn items(&self) -> Vec<SelectedItem> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
