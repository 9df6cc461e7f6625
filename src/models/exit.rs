use serde::{Deserialize, Serialize};

use super::lenient;

/// Prefix of the synthetic part-number key used for whole-pallet withdrawal.
pub const PLATFORM_KEY_PREFIX: &str = "TARIMAS-";

/// Synthetic ledger/wire key for withdrawing whole pallets from `folio`.
pub fn platform_key(folio: i64) -> String {
    format!("{}{}", PLATFORM_KEY_PREFIX, folio)
}

/// Unit a withdrawal is expressed in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnitKind {
    Platforms,
    Pieces,
}

impl UnitKind {
    pub fn is_platforms(self) -> bool {
        matches!(self, UnitKind::Platforms)
    }
}

/// A single line of an exit batch as the backend expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitItem {
    pub folio: i64,
    pub part_number: String,
    pub quantity: i64,
    pub is_platforms: bool,
}

/// Request body of the process-exits endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessExitsRequest {
    #[serde(rename = "ExitItem")]
    pub exit_items: Vec<ExitItem>,
}

/// Per-folio outcome of an exit batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitResult {
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub folio: i64,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub previous_platforms: Option<i64>,
    #[serde(default)]
    pub current_platforms: Option<i64>,
    #[serde(default)]
    pub previous_pieces: Option<i64>,
    #[serde(default)]
    pub current_pieces: Option<i64>,
}

impl ExitResult {
    /// True when the folio still has pallets after this exit.
    pub fn has_remaining(&self) -> bool {
        self.current_platforms.map(|p| p > 0).unwrap_or(false)
            || self.current_pieces.map(|p| p > 0).unwrap_or(false)
    }
}

/// Response of the process-exits endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessExitsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub results: Vec<ExitResult>,
    #[serde(default)]
    pub exit_date: Option<String>,
}
