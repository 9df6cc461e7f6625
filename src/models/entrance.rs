use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;

/// A part number and the number of pieces received for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartNumberQuantity {
    #[serde(default, deserialize_with = "lenient::string_or_number")]
    pub part_number: String,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub quantity: i64,
}

impl PartNumberQuantity {
    pub fn new(part_number: impl Into<String>, quantity: i64) -> Self {
        Self {
            part_number: part_number.into(),
            quantity,
        }
    }
}

/// One inbound warehouse event as returned by the entrance listing.
///
/// Older records carry only a comma-separated `partNumber` string and a
/// `numberOfPieces` total; newer ones carry the structured `partNumbers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entrance {
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub folio: i64,
    #[serde(default)]
    pub part_numbers: Vec<PartNumberQuantity>,
    #[serde(default, deserialize_with = "lenient::string_or_number")]
    pub part_number: String,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub platforms: i64,
    #[serde(
        default,
        alias = "totalPieces",
        deserialize_with = "lenient::number_or_zero"
    )]
    pub number_of_pieces: i64,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub entry_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub exit_date: Option<DateTime<Utc>>,
}

impl Entrance {
    /// Completed entrances are closed to further withdrawal.
    pub fn is_completed(&self) -> bool {
        self.exit_date.is_some() || self.platforms <= 0
    }

    /// Part-number breakdown for this entrance.
    ///
    /// Falls back to splitting the legacy `partNumber` string and spreading
    /// `numberOfPieces` evenly (floor division) when no structured breakdown
    /// was sent.
    pub fn breakdown(&self) -> Vec<PartNumberQuantity> {
        if !self.part_numbers.is_empty() {
            return self.part_numbers.clone();
        }
        split_legacy_part_numbers(&self.part_number, self.number_of_pieces)
    }

    /// Total pieces: sum of the breakdown, or `numberOfPieces` without one.
    pub fn total_pieces(&self) -> i64 {
        if self.part_numbers.is_empty() {
            return self.number_of_pieces;
        }
        self.part_numbers.iter().map(|p| p.quantity).sum()
    }

    /// True when `part_number` appears in this entrance's part numbers.
    pub fn has_part_number(&self, part_number: &str) -> bool {
        let needle = part_number.trim();
        if needle.is_empty() {
            return true;
        }
        self.breakdown()
            .iter()
            .any(|p| p.part_number.contains(needle))
            || self.part_number.contains(needle)
    }
}

/// Splits `"A, B,C"` into parts and divides `pieces` evenly between them.
pub fn split_legacy_part_numbers(raw: &str, pieces: i64) -> Vec<PartNumberQuantity> {
    if raw.trim().is_empty() || pieces == 0 {
        return Vec::new();
    }

    let parts: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Vec::new();
    }

    let per_part = pieces / parts.len() as i64;
    parts
        .into_iter()
        .map(|part| PartNumberQuantity::new(part, per_part))
        .collect()
}

/// Payload for creating or updating an entrance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntranceForm {
    pub folio: i64,
    pub entry_date: String,
    pub part_numbers: Vec<PartNumberQuantity>,
}

/// Payload for registering an exit against a single entrance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitPatch {
    pub platforms: i64,
    pub exit_date: String,
}

/// Generic mutation acknowledgement from the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "idStageEntrances", alias = "id")]
    pub id: Option<i64>,
    #[serde(default, rename = "IdModified")]
    pub modified_id: Option<i64>,
}
