use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Entrance, FolioSearchResponse, PartNumberQuantity, PartNumberSearchResult};

/// Totals for one folio across every entrance that shares it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolioSummary {
    pub folio: i64,
    /// Pallets still in the warehouse (completed entrances excluded)
    pub total_platforms: i64,
    /// Pieces across all entrances, completed ones included
    pub total_pieces: i64,
    pub entrances: Vec<Entrance>,
}

impl FolioSummary {
    pub fn from_entrances(folio: i64, entrances: Vec<Entrance>) -> Self {
        let total_platforms = entrances
            .iter()
            .filter(|e| !e.is_completed())
            .map(|e| e.platforms)
            .sum();
        let total_pieces = entrances.iter().map(Entrance::total_pieces).sum();

        Self {
            folio,
            total_platforms,
            total_pieces,
            entrances,
        }
    }

    /// Entrances that can still be withdrawn from.
    pub fn actionable_entrances(&self) -> impl Iterator<Item = &Entrance> {
        self.entrances.iter().filter(|e| !e.is_completed())
    }

    /// Pieces of `part_number` held by entrances that are still open.
    pub fn open_part_quantity(&self, part_number: &str) -> i64 {
        self.actionable_entrances()
            .flat_map(Entrance::breakdown)
            .filter(|p| p.part_number == part_number)
            .map(|p| p.quantity)
            .sum()
    }
}

/// Result of a folio search, recomputed from the raw entrances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolioAggregate {
    pub folios: Vec<FolioSummary>,
    /// Part number → quantity summed over every entrance in scope
    pub accumulated: BTreeMap<String, i64>,
}

impl FolioAggregate {
    /// Groups entrances by folio, keeping the order folios first appear in.
    pub fn from_entrances(entrances: &[Entrance]) -> Self {
        let mut order: Vec<i64> = Vec::new();
        let mut grouped: BTreeMap<i64, Vec<Entrance>> = BTreeMap::new();
        for entrance in entrances {
            grouped
                .entry(entrance.folio)
                .or_insert_with(|| {
                    order.push(entrance.folio);
                    Vec::new()
                })
                .push(entrance.clone());
        }

        let folios: Vec<FolioSummary> = order
            .into_iter()
            .filter_map(|folio| {
                grouped
                    .remove(&folio)
                    .map(|group| FolioSummary::from_entrances(folio, group))
            })
            .collect();

        let accumulated = accumulate(folios.iter().flat_map(|f| f.entrances.iter()));
        Self { folios, accumulated }
    }

    /// Rebuilds the aggregate from a search-by-folio response.
    ///
    /// Results without entrances keep the totals the server reported, and
    /// server-side accumulated entries for part numbers absent from every
    /// entrance are kept.
    pub fn from_response(response: FolioSearchResponse) -> Self {
        let folios: Vec<FolioSummary> = response
            .folio_results
            .into_iter()
            .map(|result| {
                if result.entrances.is_empty() {
                    FolioSummary {
                        folio: result.folio,
                        total_platforms: result.total_platforms,
                        total_pieces: result.total_pieces,
                        entrances: Vec::new(),
                    }
                } else {
                    FolioSummary::from_entrances(result.folio, result.entrances)
                }
            })
            .collect();

        let mut accumulated = accumulate(folios.iter().flat_map(|f| f.entrances.iter()));
        for server in response.accumulated_part_numbers {
            if server.part_number.is_empty() {
                continue;
            }
            accumulated
                .entry(server.part_number)
                .or_insert(server.total_quantity);
        }

        Self { folios, accumulated }
    }

    /// Total available for `part_number`, 0 when unknown.
    pub fn part_number_quantity(&self, part_number: &str) -> i64 {
        self.accumulated.get(part_number).copied().unwrap_or(0)
    }

    pub fn folio(&self, folio: i64) -> Option<&FolioSummary> {
        self.folios.iter().find(|f| f.folio == folio)
    }

    pub fn total_platforms(&self) -> i64 {
        self.folios.iter().map(|f| f.total_platforms).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.folios.is_empty()
    }
}

fn accumulate<'a>(entrances: impl Iterator<Item = &'a Entrance>) -> BTreeMap<String, i64> {
    let mut totals = BTreeMap::new();
    for entrance in entrances {
        for part in entrance.breakdown() {
            if part.part_number.is_empty() {
                continue;
            }
            *totals.entry(part.part_number).or_insert(0) += part.quantity;
        }
    }
    totals
}

/// One folio's holding of a given part number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartNumberFolio {
    pub folio: i64,
    pub platforms: i64,
    pub pieces: i64,
    pub completed: bool,
    pub part_numbers: Vec<PartNumberQuantity>,
}

/// Search result grouped by part number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartNumberAggregate {
    pub part_number: String,
    pub total_platforms: i64,
    pub total_pieces: i64,
    pub folios: Vec<PartNumberFolio>,
}

/// Normalizes search-by-part-number results from the backend.
///
/// Each folio record gets its part-number breakdown attached (splitting the
/// legacy comma-separated field when needed). Zero totals from the server are
/// replaced by the sums over the folio records.
pub fn normalize_part_number_results(
    results: Vec<PartNumberSearchResult>,
) -> Vec<PartNumberAggregate> {
    results
        .into_iter()
        .map(|result| {
            let folios: Vec<PartNumberFolio> = result
                .folios
                .iter()
                .map(|entrance| {
                    let completed = entrance.is_completed();
                    PartNumberFolio {
                        folio: entrance.folio,
                        platforms: if completed { 0 } else { entrance.platforms },
                        pieces: entrance.total_pieces(),
                        completed,
                        part_numbers: entrance.breakdown(),
                    }
                })
                .collect();

            let total_platforms = if result.total_platforms != 0 {
                result.total_platforms
            } else {
                folios.iter().map(|f| f.platforms).sum()
            };
            let total_pieces = if result.total_pieces != 0 {
                result.total_pieces
            } else {
                folios.iter().map(|f| f.pieces).sum()
            };

            PartNumberAggregate {
                part_number: result.part_number,
                total_platforms,
                total_pieces,
                folios,
            }
        })
        .collect()
}
