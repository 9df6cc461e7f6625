//! Palletrack Library
//!
//! Typed client and workflows for the warehouse pallet-tracking service:
//! entrance registration, folio and part-number search, partial exits with
//! local quantity reconciliation, and storage cost reports.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use client::{ApiClient, HttpWarehouseApi, WarehouseApi};
pub use config::AppConfig;
pub use errors::ServiceError;
pub use services::factory::ServiceFactory;
