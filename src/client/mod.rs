//! Access to the warehouse backend.
//!
//! Services depend on the [`WarehouseApi`] trait; [`HttpWarehouseApi`] is the
//! production implementation over [`ApiClient`].

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::ServiceError;
use crate::models::{
    DateRangeRequest, Entrance, EntranceForm, ExitItem, ExitPatch, FolioSearchResponse,
    MutationResponse, PartNumberSearchResult, ProcessExitsResponse, ReportItem,
};

pub mod endpoints;
mod rest;

pub use self::rest::{ApiClient, HttpWarehouseApi};

/// Operations the warehouse service exposes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WarehouseApi: Send + Sync {
    async fn list_entrances(&self) -> Result<Vec<Entrance>, ServiceError>;

    async fn create_entrance(&self, form: &EntranceForm)
        -> Result<MutationResponse, ServiceError>;

    async fn update_entrance(
        &self,
        id: i64,
        form: &EntranceForm,
    ) -> Result<MutationResponse, ServiceError>;

    async fn patch_entrance_exit(
        &self,
        id: i64,
        patch: &ExitPatch,
    ) -> Result<MutationResponse, ServiceError>;

    /// Irreversible.
    async fn delete_entrance(&self, id: i64) -> Result<MutationResponse, ServiceError>;

    async fn search_by_folio(&self, folio: i64) -> Result<FolioSearchResponse, ServiceError>;

    async fn search_by_part_number(
        &self,
        part_number: &str,
    ) -> Result<Vec<PartNumberSearchResult>, ServiceError>;

    async fn process_exits(
        &self,
        items: Vec<ExitItem>,
    ) -> Result<ProcessExitsResponse, ServiceError>;

    async fn list_available_reports(&self) -> Result<Vec<ReportItem>, ServiceError>;

    async fn download_monthly_report(&self, year: i32, month: u32)
        -> Result<Bytes, ServiceError>;

    async fn download_report_by_date_range(
        &self,
        range: &DateRangeRequest,
    ) -> Result<Bytes, ServiceError>;
}
