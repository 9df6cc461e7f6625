use std::sync::Arc;

use palletrack::{
    client::{ApiClient, HttpWarehouseApi},
    config::AppConfig,
    ServiceFactory,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::MockServer;

/// Helper harness wiring the real HTTP client to a local mock backend.
pub struct TestApp {
    pub server: MockServer,
    pub factory: ServiceFactory,
    #[allow(dead_code)]
    pub report_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_token(None).await
    }

    pub async fn with_token(token: Option<&str>) -> Self {
        let server = MockServer::start().await;
        let report_dir = TempDir::new().expect("temp report dir");

        let mut cfg = AppConfig::new(server.uri(), token.map(str::to_string));
        cfg.request_timeout_secs = 5;
        cfg.report_dir = report_dir.path().to_string_lossy().into_owned();

        let client = ApiClient::with_client(
            &cfg.api_base_url,
            cfg.api_token().map(str::to_string),
            reqwest::Client::new(),
        )
        .expect("client for mock server");
        let factory = ServiceFactory::new(Arc::new(HttpWarehouseApi::new(client)), cfg);

        Self {
            server,
            factory,
            report_dir,
        }
    }
}

/// Entrance record as the backend serializes it.
#[allow(dead_code)]
pub fn entrance_json(id: i64, folio: i64, platforms: i64, parts: &[(&str, i64)]) -> Value {
    json!({
        "id": id,
        "folio": folio,
        "platforms": platforms,
        "entryDate": "2024-05-01T08:00:00",
        "exitDate": null,
        "partNumbers": parts
            .iter()
            .map(|(p, q)| json!({"partNumber": p, "quantity": q}))
            .collect::<Vec<_>>(),
    })
}

/// Search-by-folio response holding `entrances`.
#[allow(dead_code)]
pub fn folio_search_json(folio: i64, entrances: Vec<Value>) -> Value {
    json!({
        "folioResults": [{
            "folio": folio,
            "totalPlatforms": 0,
            "totalPieces": 0,
            "entrances": entrances,
        }],
        "accumulatedPartNumbers": [],
    })
}
