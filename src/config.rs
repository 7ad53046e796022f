use crate::error::ServiceError;
use std::{env, fmt::Display, str::FromStr};
use tracing::{info, warn};

pub const DEFAULT_BUCKET: &str = "property-images";
pub const DEFAULT_TABLE: &str = "properties";
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DEFAULT_WHATSAPP: &str = "558585572807";

/// Runtime settings, read from `TERRAVENTOS_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted backend project
    pub backend_url: String,
    /// Public (anon) API key of the project
    pub anon_key: String,
    pub bucket: String,
    pub table: String,
    /// Public site origin, used for password-reset redirects
    pub site_url: String,
    /// WhatsApp number for contact links, digits only
    pub whatsapp_phone: String,
    pub featured_limit: usize,
}

impl Config {
    /// Settings for a project at `backend_url`, everything else defaulted.
    pub fn new(backend_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            table: DEFAULT_TABLE.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            whatsapp_phone: DEFAULT_WHATSAPP.to_string(),
            featured_limit: 1,
        }
    }

    pub fn from_env() -> Result<Self, ServiceError> {
        let backend_url = required("TERRAVENTOS_URL")?;
        let anon_key = required("TERRAVENTOS_ANON_KEY")?;

        Ok(Self {
            bucket: try_load("TERRAVENTOS_BUCKET", DEFAULT_BUCKET)?,
            table: try_load("TERRAVENTOS_TABLE", DEFAULT_TABLE)?,
            site_url: try_load::<String>("TERRAVENTOS_SITE_URL", DEFAULT_SITE_URL)?
                .trim_end_matches('/')
                .to_string(),
            whatsapp_phone: try_load("TERRAVENTOS_WHATSAPP", DEFAULT_WHATSAPP)?,
            featured_limit: try_load("TERRAVENTOS_FEATURED_LIMIT", "1")?,
            ..Self::new(backend_url, anon_key)
        })
    }

    /// Settings for running without a backend project (demo mode, tests).
    pub fn offline() -> Self {
        Self::new("http://localhost:54321", "")
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required(key: &str) -> Result<String, ServiceError> {
    var(key).ok_or_else(|| {
        warn!("Environment variable {key} not found");
        ServiceError::MissingConfiguration(key.to_string())
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ServiceError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            ServiceError::MissingConfiguration(format!("{key}: {e}"))
        })
}
