//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use domain::CompanyProfile;
use notifications::{PipelineConfig, SmtpConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT` (default `0.0.0.0:3000`), `RUST_LOG` (default `info`)
/// - `DATABASE_URL`: PostgreSQL; absent means the in-memory store
/// - `CART_SERVICE_URL`, `PRODUCT_SERVICE_URL`: absent means the local
///   cart and product services are called in-process
/// - `PAYMENT_SERVICE_URL`, `USER_SERVICE_URL`: absent means in-memory fakes
/// - `DOWNSTREAM_TIMEOUT_SECS` (default 30)
/// - `NOTIFICATION_QUEUE_CAPACITY` (10), `NOTIFICATION_WORKERS` (2),
///   `INVOICE_RETENTION_SECS` (20), `INVOICE_DIR` (`invoices`)
/// - `SMTP_HOST`, `SMTP_PORT` (587), `SMTP_USERNAME`, `SMTP_PASSWORD`,
///   `EMAIL_FROM`: without `SMTP_HOST` mail is only recorded in memory
/// - `COMPANY_ID`, `COMPANY_NAME`, `COMPANY_ADDRESS`, `COMPANY_EMAIL`,
///   `COMPANY_URL`: the company printed on invoices
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub cart_service_url: Option<String>,
    pub product_service_url: Option<String>,
    pub payment_service_url: Option<String>,
    pub user_service_url: Option<String>,
    pub downstream_timeout: Duration,
    pub pipeline: PipelineConfig,
    pub invoice_dir: PathBuf,
    pub smtp: Option<SmtpConfig>,
    pub company: CompanyProfile,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str, default: u64| {
            var(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let defaults = Self::default();
        let company = CompanyProfile {
            company_id: var("COMPANY_ID").unwrap_or(defaults.company.company_id),
            name: var("COMPANY_NAME").unwrap_or(defaults.company.name),
            address: var("COMPANY_ADDRESS").unwrap_or(defaults.company.address),
            email: var("COMPANY_EMAIL").unwrap_or(defaults.company.email),
            url: var("COMPANY_URL").unwrap_or(defaults.company.url),
        };

        let smtp = var("SMTP_HOST").map(|host| SmtpConfig {
            host,
            port: var("SMTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            username: var("SMTP_USERNAME").unwrap_or_default(),
            password: var("SMTP_PASSWORD").unwrap_or_default(),
            from: var("EMAIL_FROM").unwrap_or_else(|| company.email.clone()),
        });

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL"),
            cart_service_url: var("CART_SERVICE_URL"),
            product_service_url: var("PRODUCT_SERVICE_URL"),
            payment_service_url: var("PAYMENT_SERVICE_URL"),
            user_service_url: var("USER_SERVICE_URL"),
            downstream_timeout: Duration::from_secs(parsed("DOWNSTREAM_TIMEOUT_SECS", 30)),
            pipeline: PipelineConfig {
                queue_capacity: parsed("NOTIFICATION_QUEUE_CAPACITY", 10) as usize,
                workers: parsed("NOTIFICATION_WORKERS", 2) as usize,
                retention: Duration::from_secs(parsed("INVOICE_RETENTION_SECS", 20)),
            },
            invoice_dir: var("INVOICE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.invoice_dir),
            smtp,
            company,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            cart_service_url: None,
            product_service_url: None,
            payment_service_url: None,
            user_service_url: None,
            downstream_timeout: Duration::from_secs(30),
            pipeline: PipelineConfig::default(),
            invoice_dir: PathBuf::from("invoices"),
            smtp: None,
            company: CompanyProfile::default(),
        }
    }
}
