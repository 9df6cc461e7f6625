use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::client::WarehouseApi;
use crate::errors::ServiceError;
use crate::models::{platform_key, ExitResult, ProcessExitsResponse, UnitKind};
use crate::services::aggregation::{
    normalize_part_number_results, FolioAggregate, PartNumberAggregate,
};
use crate::services::ledger::{ExitLedger, QuantityChange, SelectedItem};

/// Parses an operator-typed folio. Surrounding whitespace is ignored.
pub fn parse_folio(input: &str) -> Result<i64, ServiceError> {
    let trimmed = input.trim();
    match trimmed.parse::<i64>() {
        Ok(folio) if folio > 0 => Ok(folio),
        _ => Err(ServiceError::ValidationError(format!(
            "'{}' is not a valid folio",
            trimmed
        ))),
    }
}

/// What a submitted batch did to the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitOutcome {
    pub success: bool,
    pub message: String,
    pub results: Vec<ExitResult>,
    pub exit_date: Option<String>,
    /// Selections left in the ledger for a retry
    pub pending_items: usize,
    /// Folio that was searched again after a successful batch
    pub refreshed_folio: Option<i64>,
    /// Why that search failed; the batch itself still succeeded
    pub refresh_error: Option<String>,
}

impl ExitOutcome {
    pub fn failed_results(&self) -> impl Iterator<Item = &ExitResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// One operator's exit workflow: search, select quantities, submit.
///
/// Every mutating call takes `&mut self`, so a session cannot have two
/// submissions in flight.
pub struct ExitSession {
    api: Arc<dyn WarehouseApi>,
    ledger: ExitLedger,
    folio_results: Option<FolioAggregate>,
    part_results: Vec<PartNumberAggregate>,
    last_folio: Option<i64>,
    last_error: Option<String>,
}

impl ExitSession {
    pub fn new(api: Arc<dyn WarehouseApi>) -> Self {
        Self {
            api,
            ledger: ExitLedger::new(),
            folio_results: None,
            part_results: Vec::new(),
            last_folio: None,
            last_error: None,
        }
    }

    pub fn ledger(&self) -> &ExitLedger {
        &self.ledger
    }

    pub fn folio_results(&self) -> Option<&FolioAggregate> {
        self.folio_results.as_ref()
    }

    pub fn part_results(&self) -> &[PartNumberAggregate] {
        &self.part_results
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn total_selected(&self) -> i64 {
        self.ledger.total_selected()
    }

    /// Searches a folio and replaces the current results.
    ///
    /// Blank input clears the search. A new search drops any pending
    /// selections, since their maximums came from the previous results.
    #[instrument(skip(self))]
    pub async fn search_by_folio(
        &mut self,
        input: &str,
    ) -> Result<Option<&FolioAggregate>, ServiceError> {
        if input.trim().is_empty() {
            self.clear_search();
            return Ok(None);
        }
        let folio = match parse_folio(input) {
            Ok(folio) => folio,
            Err(err) => {
                self.last_error = Some(err.user_message());
                return Err(err);
            }
        };

        self.ledger.clear();
        self.part_results.clear();
        self.last_error = None;

        match self.api.search_by_folio(folio).await {
            Ok(response) => {
                let aggregate = FolioAggregate::from_response(response);
                info!(
                    folio,
                    folios = aggregate.folios.len(),
                    platforms = aggregate.total_platforms(),
                    "folio search completed"
                );
                self.last_folio = Some(folio);
                Ok(Some(&*self.folio_results.insert(aggregate)))
            }
            Err(err) => {
                warn!(folio, error = %err, "folio search failed");
                self.folio_results = None;
                self.last_error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Searches by part number and replaces the current results.
    #[instrument(skip(self))]
    pub async fn search_by_part_number(
        &mut self,
        part_number: &str,
    ) -> Result<&[PartNumberAggregate], ServiceError> {
        let part_number = part_number.trim();
        if part_number.is_empty() {
            self.clear_search();
            return Ok(self.part_results.as_slice());
        }

        self.ledger.clear();
        self.folio_results = None;
        self.last_folio = None;
        self.last_error = None;

        match self.api.search_by_part_number(part_number).await {
            Ok(results) => {
                self.part_results = normalize_part_number_results(results);
                info!(
                    part_number,
                    groups = self.part_results.len(),
                    "part number search completed"
                );
                Ok(self.part_results.as_slice())
            }
            Err(err) => {
                warn!(part_number, error = %err, "part number search failed");
                self.part_results.clear();
                self.last_error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Raw ledger update with an explicit maximum.
    pub fn set_quantity(
        &mut self,
        folio: i64,
        part_number: &str,
        quantity: i64,
        max_quantity: i64,
        unit_kind: UnitKind,
    ) -> QuantityChange {
        self.ledger
            .set_quantity(folio, part_number, quantity, max_quantity, unit_kind)
    }

    /// Selects whole pallets of `folio`, capped by its open platforms.
    pub fn select_platforms(
        &mut self,
        folio: i64,
        quantity: i64,
    ) -> Result<QuantityChange, ServiceError> {
        let max = self
            .folio_results
            .as_ref()
            .and_then(|agg| agg.folio(folio))
            .map(|summary| summary.total_platforms)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Folio {} is not in the current results", folio))
            })?;

        Ok(self.ledger.set_quantity(
            folio,
            &platform_key(folio),
            quantity,
            max,
            UnitKind::Platforms,
        ))
    }

    /// Selects pieces of one part number from `folio`.
    ///
    /// The cap is the folio's open quantity of the part, further limited so
    /// that the selections for the part across every folio never exceed its
    /// accumulated total. Completed entrances cannot be withdrawn from.
    pub fn select_part_quantity(
        &mut self,
        folio: i64,
        part_number: &str,
        quantity: i64,
    ) -> Result<QuantityChange, ServiceError> {
        let aggregate = self.folio_results.as_ref().ok_or_else(|| {
            ServiceError::NotFound("No folio search results to select from".to_string())
        })?;
        let summary = aggregate.folio(folio).ok_or_else(|| {
            ServiceError::NotFound(format!("Folio {} is not in the current results", folio))
        })?;
        let open = summary.open_part_quantity(part_number);
        if open <= 0 {
            return Err(ServiceError::NotFound(format!(
                "Part number {} has no open stock in folio {}",
                part_number, folio
            )));
        }
        let selected_elsewhere: i64 = self
            .ledger
            .items()
            .iter()
            .filter(|item| {
                item.folio != folio
                    && item.unit_kind == UnitKind::Pieces
                    && item.part_number == part_number
            })
            .map(|item| item.quantity)
            .sum();
        let remaining = aggregate.part_number_quantity(part_number) - selected_elsewhere;
        let max = open.min(remaining.max(0));

        Ok(self
            .ledger
            .set_quantity(folio, part_number, quantity, max, UnitKind::Pieces))
    }

    /// Submits everything currently in the ledger.
    pub async fn process_selected(&mut self) -> Result<ExitOutcome, ServiceError> {
        let items = self.ledger.items();
        self.process_exits(items).await
    }

    /// Submits `items` and reconciles the session with the outcome.
    ///
    /// Nothing is sent when the batch is empty or any item is out of bounds.
    /// Transport failures leave the ledger as it was. After a partial failure
    /// only the selections of failed folios remain.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn process_exits(
        &mut self,
        items: Vec<SelectedItem>,
    ) -> Result<ExitOutcome, ServiceError> {
        if let Err(err) = Self::validate_batch(&items) {
            self.last_error = Some(err.user_message());
            return Err(err);
        }

        let exit_items = items.iter().map(SelectedItem::to_exit_item).collect();
        let response = match self.api.process_exits(exit_items).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "exit submission failed");
                self.last_error = Some(err.user_message());
                return Err(err);
            }
        };

        if response.success {
            self.apply_success(response).await
        } else {
            Ok(self.apply_partial_failure(response))
        }
    }

    /// Resets results, selections and the last error.
    pub fn clear_search(&mut self) {
        self.ledger.clear();
        self.folio_results = None;
        self.part_results.clear();
        self.last_folio = None;
        self.last_error = None;
    }

    fn validate_batch(items: &[SelectedItem]) -> Result<(), ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Select at least one quantity before processing exits".to_string(),
            ));
        }
        items.iter().try_for_each(SelectedItem::validate)
    }

    async fn apply_success(
        &mut self,
        response: ProcessExitsResponse,
    ) -> Result<ExitOutcome, ServiceError> {
        let folio = self.last_folio;
        let remaining = response.results.iter().any(ExitResult::has_remaining);
        info!(
            results = response.results.len(),
            remaining, "exit batch processed"
        );

        self.clear_search();

        let mut refreshed_folio = None;
        let mut refresh_error = None;
        if let (true, Some(folio)) = (remaining, folio) {
            match self.search_by_folio(&folio.to_string()).await {
                Ok(_) => refreshed_folio = Some(folio),
                Err(err) => {
                    warn!(folio, error = %err, "refresh after exit failed");
                    self.last_error = None;
                    refresh_error = Some(err.user_message());
                }
            }
        }

        Ok(ExitOutcome {
            success: true,
            message: response.message,
            results: response.results,
            exit_date: response.exit_date,
            pending_items: self.ledger.len(),
            refreshed_folio,
            refresh_error,
        })
    }

    fn apply_partial_failure(&mut self, response: ProcessExitsResponse) -> ExitOutcome {
        for result in response.results.iter().filter(|r| r.success) {
            self.ledger.remove_folio(result.folio);
        }

        let failures: Vec<String> = response
            .results
            .iter()
            .filter(|r| !r.success)
            .map(|r| format!("Folio {}: {}", r.folio, r.message))
            .collect();
        warn!(failed = failures.len(), "exit batch partially failed");

        self.last_error = Some(if failures.is_empty() {
            response.message.clone()
        } else {
            failures.join("; ")
        });

        ExitOutcome {
            success: false,
            message: response.message,
            results: response.results,
            exit_date: response.exit_date,
            pending_items: self.ledger.len(),
            refreshed_folio: None,
            refresh_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockWarehouseApi;
    use crate::models::{ExitItem, FolioSearchResponse};
    use mockall::predicate::eq;
    use mockall::Sequence;
    use serde_json::json;

    fn folio_response(folio: i64, platforms: i64) -> FolioSearchResponse {
        serde_json::from_value(json!({
            "folioResults": [{
                "folio": folio,
                "entrances": [{
                    "id": 1, "folio": folio, "platforms": platforms,
                    "entryDate": "2024-05-01T08:00:00",
                    "partNumbers": [{"partNumber": "X1", "quantity": 50}]
                }]
            }],
            "accumulatedPartNumbers": []
        }))
        .unwrap()
    }

    fn two_folio_response() -> FolioSearchResponse {
        serde_json::from_value(json!({
            "folioResults": [
                {"folio": 100, "entrances": [{"id": 1, "folio": 100, "platforms": 2,
                    "entryDate": "2024-05-01", "partNumbers": [{"partNumber": "X1", "quantity": 50}]}]},
                {"folio": 200, "entrances": [{"id": 2, "folio": 200, "platforms": 3,
                    "entryDate": "2024-05-01", "partNumbers": [{"partNumber": "Y1", "quantity": 9}]}]}
            ]
        }))
        .unwrap()
    }

    fn result(folio: i64, success: bool, previous: i64, current: i64) -> ExitResult {
        ExitResult {
            folio,
            success,
            message: if success { "OK".into() } else { "Stock changed".into() },
            previous_platforms: Some(previous),
            current_platforms: Some(current),
            previous_pieces: None,
            current_pieces: None,
        }
    }

    #[tokio::test]
    async fn single_pallet_exit_clears_and_refreshes_folio() {
        let mut api = MockWarehouseApi::new();
        let mut seq = Sequence::new();
        api.expect_search_by_folio()
            .with(eq(100))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(folio_response(100, 2)));
        api.expect_process_exits()
            .withf(|items: &Vec<ExitItem>| {
                items
                    == &vec![ExitItem {
                        folio: 100,
                        part_number: "TARIMAS-100".into(),
                        quantity: 1,
                        is_platforms: true,
                    }]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(ProcessExitsResponse {
                    success: true,
                    message: "Processed".into(),
                    results: vec![result(100, true, 2, 1)],
                    exit_date: Some("2024-05-03T10:00:00Z".into()),
                })
            });
        api.expect_search_by_folio()
            .with(eq(100))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(folio_response(100, 1)));

        let mut session = ExitSession::new(Arc::new(api));
        session.search_by_folio("100").await.unwrap();
        assert_eq!(
            session.select_platforms(100, 1).unwrap(),
            QuantityChange::Inserted
        );

        let outcome = session.process_selected().await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.results[0].previous_platforms, Some(2));
        assert_eq!(outcome.results[0].current_platforms, Some(1));
        assert_eq!(outcome.refreshed_folio, Some(100));
        assert!(session.ledger().is_empty());
        assert_eq!(session.folio_results().unwrap().total_platforms(), 1);
    }

    #[tokio::test]
    async fn last_pallet_exit_leaves_search_cleared() {
        let mut api = MockWarehouseApi::new();
        api.expect_search_by_folio()
            .times(1)
            .returning(|_| Ok(folio_response(100, 1)));
        api.expect_process_exits().times(1).returning(|_| {
            Ok(ProcessExitsResponse {
                success: true,
                results: vec![result(100, true, 1, 0)],
                ..Default::default()
            })
        });

        let mut session = ExitSession::new(Arc::new(api));
        session.search_by_folio("100").await.unwrap();
        session.select_platforms(100, 1).unwrap();
        let outcome = session.process_selected().await.unwrap();

        assert_eq!(outcome.refreshed_folio, None);
        assert!(session.folio_results().is_none());
        assert_eq!(session.total_selected(), 0);
    }

    #[tokio::test]
    async fn over_selection_is_rejected_without_network_call() {
        let mut api = MockWarehouseApi::new();
        api.expect_search_by_folio()
            .returning(|_| Ok(folio_response(100, 2)));
        api.expect_process_exits().never();

        let mut session = ExitSession::new(Arc::new(api));
        session.search_by_folio("100").await.unwrap();

        let change = session.select_platforms(100, 3).unwrap();
        assert!(change.is_rejected());
        assert!(session.ledger().is_empty());

        let over = SelectedItem {
            folio: 100,
            part_number: platform_key(100),
            quantity: 3,
            max_quantity: 2,
            unit_kind: UnitKind::Platforms,
        };
        let err = session.process_exits(vec![over]).await.unwrap_err();
        assert!(err.is_validation());
        assert!(session.last_error().is_some());
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_locally() {
        let mut api = MockWarehouseApi::new();
        api.expect_process_exits().never();

        let mut session = ExitSession::new(Arc::new(api));
        let err = session.process_selected().await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn partial_failure_keeps_only_failed_folios() {
        let mut api = MockWarehouseApi::new();
        api.expect_search_by_folio()
            .returning(|_| Ok(two_folio_response()));
        api.expect_process_exits().times(1).returning(|_| {
            Ok(ProcessExitsResponse {
                success: false,
                message: "Some exits failed".into(),
                results: vec![result(100, true, 2, 1), result(200, false, 3, 3)],
                exit_date: None,
            })
        });

        let mut session = ExitSession::new(Arc::new(api));
        session.search_by_folio("100").await.unwrap();
        session.select_platforms(100, 1).unwrap();
        session.select_part_quantity(200, "Y1", 4).unwrap();

        let outcome = session.process_selected().await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.failed_results().count(), 1);
        assert_eq!(outcome.pending_items, 1);
        assert_eq!(session.ledger().get_quantity(200, "Y1", UnitKind::Pieces), 4);
        assert_eq!(session.ledger().total_selected(), 4);
        assert!(session.last_error().unwrap().contains("Folio 200"));
        assert!(session.folio_results().is_some());
    }

    #[tokio::test]
    async fn transport_failure_leaves_ledger_untouched() {
        let mut api = MockWarehouseApi::new();
        api.expect_search_by_folio()
            .returning(|_| Ok(folio_response(100, 2)));
        api.expect_process_exits().times(1).returning(|_| {
            Err(ServiceError::from_http_response(
                http::StatusCode::BAD_GATEWAY,
                "",
            ))
        });

        let mut session = ExitSession::new(Arc::new(api));
        session.search_by_folio("100").await.unwrap();
        session.select_part_quantity(100, "X1", 20).unwrap();

        let err = session.process_selected().await.unwrap_err();

        assert_eq!(err.user_message(), "HTTP Error: 502 - Bad Gateway");
        assert_eq!(session.ledger().get_quantity(100, "X1", UnitKind::Pieces), 20);
        assert_eq!(session.last_error(), Some("HTTP Error: 502 - Bad Gateway"));
    }

    #[tokio::test]
    async fn clear_search_is_idempotent() {
        let mut api = MockWarehouseApi::new();
        api.expect_search_by_folio()
            .returning(|_| Ok(folio_response(100, 2)));

        let mut session = ExitSession::new(Arc::new(api));
        session.search_by_folio("100").await.unwrap();
        session.select_platforms(100, 2).unwrap();

        session.clear_search();
        let once = (
            session.ledger().len(),
            session.folio_results().cloned(),
            session.last_error().map(str::to_string),
        );
        session.clear_search();
        let twice = (
            session.ledger().len(),
            session.folio_results().cloned(),
            session.last_error().map(str::to_string),
        );

        assert_eq!(once, twice);
        assert_eq!(once, (0, None, None));
    }

    #[tokio::test]
    async fn invalid_folio_input_never_reaches_backend() {
        let mut api = MockWarehouseApi::new();
        api.expect_search_by_folio().never();

        let mut session = ExitSession::new(Arc::new(api));
        assert!(session.search_by_folio("abc").await.is_err());
        assert!(session.search_by_folio("   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn part_selection_is_capped_by_accumulated_total() {
        let mut api = MockWarehouseApi::new();
        api.expect_search_by_folio()
            .returning(|_| Ok(folio_response(100, 2)));

        let mut session = ExitSession::new(Arc::new(api));
        session.search_by_folio("100").await.unwrap();

        assert!(session.select_part_quantity(100, "X1", 51).unwrap().is_rejected());
        assert_eq!(
            session.select_part_quantity(100, "X1", 50).unwrap(),
            QuantityChange::Inserted
        );
        assert!(session.select_part_quantity(100, "NOPE", 1).is_err());
        assert!(session.select_platforms(999, 1).is_err());
    }

    #[tokio::test]
    async fn exited_entrance_parts_cannot_be_selected() {
        let mut api = MockWarehouseApi::new();
        api.expect_search_by_folio().returning(|_| {
            Ok(serde_json::from_value(json!({
                "folioResults": [{
                    "folio": 100,
                    "entrances": [{
                        "id": 1, "folio": 100, "platforms": 2,
                        "entryDate": "2024-05-01T08:00:00",
                        "exitDate": "2024-05-04T08:00:00Z",
                        "partNumbers": [{"partNumber": "X1", "quantity": 30}]
                    }]
                }]
            }))
            .unwrap())
        });

        let mut session = ExitSession::new(Arc::new(api));
        session.search_by_folio("100").await.unwrap();

        let err = session.select_part_quantity(100, "X1", 30).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(session.ledger().is_empty());
    }

    #[tokio::test]
    async fn shared_part_is_capped_per_folio_and_in_total() {
        let mut api = MockWarehouseApi::new();
        api.expect_search_by_folio().returning(|_| {
            Ok(serde_json::from_value(json!({
                "folioResults": [
                    {"folio": 100, "entrances": [{"id": 1, "folio": 100, "platforms": 2,
                        "entryDate": "2024-05-01",
                        "partNumbers": [{"partNumber": "X1", "quantity": 50}]}]},
                    {"folio": 200, "entrances": [{"id": 2, "folio": 200, "platforms": 1,
                        "entryDate": "2024-05-01",
                        "partNumbers": [{"partNumber": "X1", "quantity": 30}]}]}
                ]
            }))
            .unwrap())
        });

        let mut session = ExitSession::new(Arc::new(api));
        session.search_by_folio("100").await.unwrap();

        assert!(session.select_part_quantity(100, "X1", 80).unwrap().is_rejected());
        assert!(session.select_part_quantity(200, "X1", 80).unwrap().is_rejected());
        assert_eq!(
            session.select_part_quantity(100, "X1", 50).unwrap(),
            QuantityChange::Inserted
        );
        assert_eq!(
            session.select_part_quantity(200, "X1", 30).unwrap(),
            QuantityChange::Inserted
        );
        assert_eq!(session.total_selected(), 80);
    }

    #[tokio::test]
    async fn failed_refresh_is_reported_on_the_outcome() {
        let mut api = MockWarehouseApi::new();
        let mut seq = Sequence::new();
        api.expect_search_by_folio()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(folio_response(100, 2)));
        api.expect_process_exits()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(ProcessExitsResponse {
                    success: true,
                    results: vec![result(100, true, 2, 1)],
                    ..Default::default()
                })
            });
        api.expect_search_by_folio()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(ServiceError::from_http_response(
                    http::StatusCode::SERVICE_UNAVAILABLE,
                    "",
                ))
            });

        let mut session = ExitSession::new(Arc::new(api));
        session.search_by_folio("100").await.unwrap();
        session.select_platforms(100, 1).unwrap();

        let outcome = session.process_selected().await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.refreshed_folio, None);
        assert_eq!(
            outcome.refresh_error.as_deref(),
            Some("HTTP Error: 503 - Service Unavailable")
        );
        assert_eq!(session.last_error(), None);
    }

    #[test]
    fn parses_folio_with_whitespace() {
        assert_eq!(parse_folio(" 42 ").unwrap(), 42);
        assert!(parse_folio("0").is_err());
        assert!(parse_folio("4x").is_err());
    }
}
