use serde::{Deserialize, Serialize};

use super::entrance::Entrance;
use super::lenient;

/// Server-side summary of a folio and the entrances that share it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolioSearch {
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub folio: i64,
    #[serde(default)]
    pub entrances: Vec<Entrance>,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub total_platforms: i64,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub total_pieces: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedPartNumber {
    #[serde(default, deserialize_with = "lenient::string_or_number")]
    pub part_number: String,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub total_quantity: i64,
}

/// Response of the search-by-folio endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolioSearchResponse {
    #[serde(default)]
    pub folio_results: Vec<FolioSearch>,
    #[serde(default)]
    pub accumulated_part_numbers: Vec<AccumulatedPartNumber>,
}

/// One part number and every folio holding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartNumberSearchResult {
    #[serde(default, deserialize_with = "lenient::string_or_number")]
    pub part_number: String,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub total_platforms: i64,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub total_pieces: i64,
    #[serde(default)]
    pub folios: Vec<Entrance>,
}

/// The part-number endpoint returns either a list or a single bare result.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}
