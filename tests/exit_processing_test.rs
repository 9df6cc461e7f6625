mod common;

use common::{entrance_json, folio_search_json, TestApp};
use palletrack::models::UnitKind;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

const SEARCH_100: &str = "/api/StageEntrance/SearchByFolio/100";
const PROCESS_EXITS: &str = "/api/StageEntrance/ProcessExits";

#[tokio::test]
async fn pallet_exit_round_trip_refreshes_remaining_stock() {
    let app = TestApp::new().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_100))
        .respond_with(ResponseTemplate::new(200).set_body_json(folio_search_json(
            100,
            vec![entrance_json(1, 100, 2, &[("X1", 50)])],
        )))
        .up_to_n_times(1)
        .expect(1)
        .mount(&app.server)
        .await;

    Mock::given(method("POST"))
        .and(path(PROCESS_EXITS))
        .and(body_json(json!({
            "ExitItem": [{
                "folio": 100,
                "partNumber": "TARIMAS-100",
                "quantity": 1,
                "isPlatforms": true
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Exits processed",
            "exitDate": "2024-05-03T10:00:00Z",
            "results": [{
                "folio": 100,
                "success": true,
                "message": "OK",
                "previousPlatforms": 2,
                "currentPlatforms": 1
            }]
        })))
        .expect(1)
        .mount(&app.server)
        .await;

    Mock::given(method("GET"))
        .and(path(SEARCH_100))
        .respond_with(ResponseTemplate::new(200).set_body_json(folio_search_json(
            100,
            vec![entrance_json(1, 100, 1, &[("X1", 50)])],
        )))
        .expect(1)
        .mount(&app.server)
        .await;

    let mut session = app.factory.exit_session();
    let found = session.search_by_folio("100").await.unwrap().unwrap();
    assert_eq!(found.total_platforms(), 2);

    session.select_platforms(100, 1).unwrap();
    let outcome = session.process_selected().await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.results[0].previous_platforms, Some(2));
    assert_eq!(outcome.results[0].current_platforms, Some(1));
    assert_eq!(outcome.refreshed_folio, Some(100));
    assert!(session.ledger().is_empty());
    assert_eq!(session.folio_results().unwrap().total_platforms(), 1);
}

#[tokio::test]
async fn partial_failure_preserves_every_result_and_failed_selection() {
    let app = TestApp::new().await;

    let search = json!({
        "folioResults": [
            {"folio": 100, "entrances": [entrance_json(1, 100, 2, &[("X1", 50)])]},
            {"folio": 200, "entrances": [entrance_json(2, 200, 3, &[("Y1", 9)])]}
        ]
    });
    Mock::given(method("GET"))
        .and(path(SEARCH_100))
        .respond_with(ResponseTemplate::new(200).set_body_json(search))
        .mount(&app.server)
        .await;

    Mock::given(method("POST"))
        .and(path(PROCESS_EXITS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Some exits failed",
            "results": [
                {"folio": "100", "success": true, "message": "OK",
                 "previousPlatforms": 2, "currentPlatforms": 1},
                {"folio": 200, "success": false, "message": "Insufficient stock"}
            ]
        })))
        .expect(1)
        .mount(&app.server)
        .await;

    let mut session = app.factory.exit_session();
    session.search_by_folio("100").await.unwrap();
    session.select_platforms(100, 1).unwrap();
    session.select_part_quantity(200, "Y1", 9).unwrap();

    let outcome = session.process_selected().await.unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.pending_items, 1);
    assert_eq!(
        session.ledger().get_quantity(200, "Y1", UnitKind::Pieces),
        9
    );
    assert_eq!(session.last_error(), Some("Folio 200: Insufficient stock"));
}

#[tokio::test]
async fn server_error_keeps_selection_for_retry() {
    let app = TestApp::new().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_100))
        .respond_with(ResponseTemplate::new(200).set_body_json(folio_search_json(
            100,
            vec![entrance_json(1, 100, 2, &[("X1", 50)])],
        )))
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path(PROCESS_EXITS))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "Database unavailable"})),
        )
        .mount(&app.server)
        .await;

    let mut session = app.factory.exit_session();
    session.search_by_folio("100").await.unwrap();
    session.select_part_quantity(100, "X1", 10).unwrap();

    let err = session.process_selected().await.unwrap_err();

    assert_eq!(err.user_message(), "Database unavailable");
    assert_eq!(session.total_selected(), 10);
}

#[tokio::test]
async fn over_selection_never_reaches_the_backend() {
    let app = TestApp::new().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_100))
        .respond_with(ResponseTemplate::new(200).set_body_json(folio_search_json(
            100,
            vec![entrance_json(1, 100, 2, &[("X1", 50)])],
        )))
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path(PROCESS_EXITS))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.server)
        .await;

    let mut session = app.factory.exit_session();
    session.search_by_folio("100").await.unwrap();

    assert!(session.select_platforms(100, 3).unwrap().is_rejected());
    assert!(session.process_selected().await.is_err());
}
