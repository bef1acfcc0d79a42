use std::env;
use std::str::FromStr;

use chrono::NaiveTime;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub model_timeout_secs: u64,
    pub catalog_url: String,
    pub catalog_timeout_secs: u64,
    pub notify_url: Option<String>,
    pub notify_queue_capacity: usize,
    pub pickup_time: String,
    pub pickup_location: String,
    pub cancellation_cutoff: NaiveTime,
    pub currency: String,
    pub compose_summary: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let or_default = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let catalog_url = get("CATALOG_URL")
            .or_else(|| get("MCP_URL"))
            .ok_or(ConfigError::Missing("CATALOG_URL"))?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: or_default("HOST", "0.0.0.0"),
            port: parsed(&get, "PORT", 8080)?,
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: or_default("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_endpoint: or_default(
                "GEMINI_ENDPOINT",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            model_timeout_secs: parsed(&get, "MODEL_TIMEOUT_SECS", 15)?,
            catalog_url: catalog_url.trim_end_matches('/').to_string(),
            catalog_timeout_secs: parsed(&get, "CATALOG_TIMEOUT_SECS", 10)?,
            notify_url: get("NOTIFY_URL").map(|u| u.trim_end_matches('/').to_string()),
            notify_queue_capacity: parsed(&get, "NOTIFY_QUEUE_CAPACITY", 256)?,
            pickup_time: or_default("PICKUP_TIME", "18:00"),
            pickup_location: or_default("PICKUP_LOCATION", "F2 17"),
            cancellation_cutoff: cutoff(&get)?,
            currency: or_default("CURRENCY", "UGX"),
            compose_summary: flag(&get, "COMPOSE_SUMMARY")?,
        })
    }
}

fn parsed<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn cutoff<G: Fn(&str) -> Option<String>>(get: &G) -> Result<NaiveTime, ConfigError> {
    let name = "CANCELLATION_CUTOFF";
    let value = get(name).unwrap_or_else(|| "17:00".to_string());
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn flag<G: Fn(&str) -> Option<String>>(get: &G, name: &'static str) -> Result<bool, ConfigError> {
    match get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(value) => Err(ConfigError::Invalid { name, value }),
    }
}
