use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use url::Url;
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_REPORT_DIR: &str = ".";
const CONFIG_DIR: &str = "config";

/// Fixed tariff applied to every pallet record.
#[derive(Clone, Debug, Deserialize, Validate, PartialEq)]
pub struct CostRates {
    /// Flat fee charged when the pallet enters the warehouse
    #[serde(default = "default_entrance_fee")]
    #[validate(custom = "validate_non_negative")]
    pub entrance_fee: Decimal,

    /// Flat fee charged once the pallet has left
    #[serde(default = "default_exit_fee")]
    #[validate(custom = "validate_non_negative")]
    pub exit_fee: Decimal,

    /// Storage charge per day (or part of a day) in the warehouse
    #[serde(default = "default_daily_storage")]
    #[validate(custom = "validate_non_negative")]
    pub daily_storage: Decimal,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            entrance_fee: default_entrance_fee(),
            exit_fee: default_exit_fee(),
            daily_storage: default_daily_storage(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Base URL of the warehouse REST service
    #[validate(custom = "validate_base_url")]
    pub api_base_url: String,

    /// Bearer token sent on every request when present
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-request timeout in seconds (1s - 5min)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Rows per page when listing entrances
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100))]
    pub page_size: usize,

    /// Directory where downloaded reports are written
    #[serde(default = "default_report_dir")]
    pub report_dir: String,

    /// Cost tariff
    #[serde(default)]
    #[validate]
    pub rates: CostRates,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL.to_string(), None)
    }
}

impl AppConfig {
    /// Creates a configuration pointing at `api_base_url` with default settings
    pub fn new(api_base_url: String, api_token: Option<String>) -> Self {
        Self {
            api_base_url,
            api_token,
            request_timeout_secs: default_request_timeout_secs(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            page_size: default_page_size(),
            report_dir: default_report_dir(),
            rates: CostRates::default(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Bearer token, ignoring blank values
    pub fn api_token(&self) -> Option<&str> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() && self.api_base_url.trim_start().starts_with("http://") {
            let mut err = ValidationError::new("api_base_url_insecure");
            err.message =
                Some("Production deployments must reach the warehouse service over https".into());
            errors.add("api_base_url", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_report_dir() -> String {
    DEFAULT_REPORT_DIR.to_string()
}

fn default_entrance_fee() -> Decimal {
    dec!(67.50)
}

fn default_exit_fee() -> Decimal {
    dec!(67.50)
}

fn default_daily_storage() -> Decimal {
    dec!(133)
}

fn validate_base_url(value: &str) -> Result<(), ValidationError> {
    match Url::parse(value.trim()) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => {
            let mut err = ValidationError::new("api_base_url");
            err.message = Some("Must be an absolute http(s) URL".into());
            Err(err)
        }
    }
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_non_negative(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() {
        let mut err = ValidationError::new("rate");
        err.message = Some("Rates cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("palletrack={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    // CLI output goes to stdout; keep diagnostics on stderr
    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit config directory.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("api_base_url", DEFAULT_API_BASE_URL)?
        .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(
            File::with_name(&config_dir.join("default").to_string_lossy()).required(false),
        )
        .add_source(File::with_name(&config_dir.join(&run_env).to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str, content: &str) {
        let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
        writeln!(file, "{}", content).unwrap();
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.rates.daily_storage, dec!(133));
        assert_eq!(cfg.rates.entrance_fee, dec!(67.50));
        assert_eq!(cfg.page_size, 10);
    }

    #[test]
    fn rejects_relative_base_url() {
        let cfg = AppConfig::new("/api".into(), None);
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("api_base_url"));
    }

    #[test]
    fn rejects_negative_rates() {
        let mut cfg = AppConfig::default();
        cfg.rates.exit_fee = dec!(-1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn production_requires_https() {
        let mut cfg = AppConfig::new("http://warehouse.internal".into(), None);
        cfg.environment = "production".into();
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.api_base_url = "https://warehouse.internal".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn blank_token_is_ignored() {
        let cfg = AppConfig::new(DEFAULT_API_BASE_URL.into(), Some("  ".into()));
        assert_eq!(cfg.api_token(), None);
    }

    #[test]
    fn loads_values_from_default_file() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "default.toml",
            r#"
                api_base_url = "https://warehouse.example.com"
                page_size = 25

                [rates]
                daily_storage = "150.00"
            "#,
        );

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.api_base_url, "https://warehouse.example.com");
        assert_eq!(cfg.page_size, 25);
        assert_eq!(cfg.rates.daily_storage, dec!(150.00));
        assert_eq!(cfg.rates.exit_fee, dec!(67.50));
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "default.toml",
            r#"
                api_base_url = "https://warehouse.example.com"
                request_timeout_secs = 0
            "#,
        );

        let result = load_config_from(dir.path());
        assert!(matches!(result, Err(AppConfigError::Validation(_))));
    }
}
