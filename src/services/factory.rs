use std::sync::Arc;

use crate::{
    client::{HttpWarehouseApi, WarehouseApi},
    config::AppConfig,
    errors::ServiceError,
    services::{entrances::EntranceService, exits::ExitSession, reports::ReportService},
};

/// Factory for creating service instances over one shared backend client
pub struct ServiceFactory {
    api: Arc<dyn WarehouseApi>,
    config: AppConfig,
}

impl ServiceFactory {
    pub fn new(api: Arc<dyn WarehouseApi>, config: AppConfig) -> Self {
        Self { api, config }
    }

    /// Builds the HTTP client described by `config`
    pub fn from_config(config: AppConfig) -> Result<Self, ServiceError> {
        let api = HttpWarehouseApi::from_config(&config)?;
        Ok(Self::new(Arc::new(api), config))
    }

    pub fn entrance_service(&self) -> EntranceService {
        EntranceService::new(self.api.clone(), self.config.rates.clone())
    }

    pub fn report_service(&self) -> ReportService {
        ReportService::new(
            self.api.clone(),
            self.config.rates.clone(),
            &self.config.report_dir,
        )
    }

    /// Starts a fresh exit workflow with an empty ledger
    pub fn exit_session(&self) -> ExitSession {
        ExitSession::new(self.api.clone())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
