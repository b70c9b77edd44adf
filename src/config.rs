//! Configuration for campus-cache.
//!
//! Settings are layered: built-in defaults, then an optional TOML file named
//! by `CAMPUS_CACHE_CONFIG`, then environment variables. Command-line flags
//! are applied on top by the CLI.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::{Store, StoreError, DEFAULT_HISTORICAL_TTL, DEFAULT_TTL};
use crate::scrapers::{Endpoints, HttpConfig, ProgramFolder, RetryPolicy, LMS_DOMAIN, SEA_DOMAIN};
use crate::services::{parse_modules, Module, WarmupOptions, WarmupPlan};

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "CAMPUS_CACHE_CONFIG";
/// Prefix of the per-domain endpoint variables, e.g. `ENDPOINTS_SEA`.
pub const ENDPOINTS_ENV_PREFIX: &str = "ENDPOINTS_";

pub const DEFAULT_DATABASE_PATH: &str = "data/campus-cache.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database file.
    pub database_path: PathBuf,
    #[serde(with = "duration_text")]
    pub cache_ttl: Duration,
    #[serde(with = "duration_text")]
    pub historical_ttl: Duration,
    pub warmup_modules: Vec<Module>,
    #[serde(with = "duration_text")]
    pub warmup_timeout: Duration,
    pub workers: usize,
    #[serde(with = "duration_text")]
    pub request_timeout: Duration,
    /// Pause after every upstream request in milliseconds.
    pub request_delay_ms: u64,
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds; doubles per attempt.
    pub retry_delay_ms: u64,
    /// `debug|info|warn|error`, applied to this crate's log target.
    pub log_level: Option<String>,
    /// Ordered failover candidates per domain.
    pub endpoints: Endpoints,
    pub sticker_sources: Vec<String>,
    /// Program board folders as `courseID:folderID`.
    pub program_folders: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            cache_ttl: DEFAULT_TTL,
            historical_ttl: DEFAULT_HISTORICAL_TTL,
            warmup_modules: Module::DEFAULT.to_vec(),
            warmup_timeout: crate::services::warmup::DEFAULT_TIMEOUT,
            workers: crate::services::warmup::DEFAULT_WORKERS,
            request_timeout: Duration::from_secs(30),
            request_delay_ms: 0,
            max_retries: retry.max_retries,
            retry_delay_ms: retry.initial_delay.as_millis() as u64,
            log_level: None,
            endpoints: default_endpoints(),
            sticker_sources: Vec::new(),
            program_folders: Vec::new(),
        }
    }
}

/// Canonical hostnames of the two campus domains.
pub fn default_endpoints() -> Endpoints {
    Endpoints::from([
        (
            LMS_DOMAIN.to_string(),
            vec!["https://lms.ntpu.edu.tw".to_string()],
        ),
        (
            SEA_DOMAIN.to_string(),
            vec!["https://sea.cc.ntpu.edu.tw".to_string()],
        ),
    ])
}

impl Settings {
    /// Load defaults, the config file (if any) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|s| !s.is_empty())
        {
            Some(path) => {
                tracing::debug!("Loading config from {}", path);
                Self::from_toml_file(Path::new(&path))?
            }
            None => Self::default(),
        };
        settings.apply_env(std::env::vars())?;
        Ok(settings)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override fields from environment-style key/value pairs. Empty values
    /// are ignored.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim());

        if let Some(path) = get("SQLITE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(value) = get("CACHE_TTL") {
            self.cache_ttl = env_duration("CACHE_TTL", value)?;
        }
        if let Some(value) = get("HISTORICAL_TTL") {
            self.historical_ttl = env_duration("HISTORICAL_TTL", value)?;
        }
        if let Some(value) = get("WARMUP_MODULES") {
            self.warmup_modules = parse_modules(value)
                .map_err(|e| ConfigError::invalid("WARMUP_MODULES", value, e.to_string()))?;
        }
        if let Some(value) = get("WARMUP_TIMEOUT") {
            self.warmup_timeout = env_duration("WARMUP_TIMEOUT", value)?;
        }
        if let Some(value) = get("SCRAPER_WORKERS") {
            self.workers = env_number("SCRAPER_WORKERS", value)?;
        }
        if let Some(value) = get("REQUEST_TIMEOUT") {
            self.request_timeout = env_duration("REQUEST_TIMEOUT", value)?;
        }
        if let Some(value) = get("REQUEST_DELAY_MS") {
            self.request_delay_ms = env_number("REQUEST_DELAY_MS", value)?;
        }
        if let Some(value) = get("SCRAPER_MAX_RETRIES") {
            self.max_retries = env_number("SCRAPER_MAX_RETRIES", value)?;
        }
        if let Some(value) = get("SCRAPER_RETRY_DELAY_MS") {
            self.retry_delay_ms = env_number("SCRAPER_RETRY_DELAY_MS", value)?;
        }
        if let Some(value) = get("LOG_LEVEL") {
            self.log_level = Some(value.to_lowercase());
        }
        if let Some(value) = get("STICKER_SOURCES") {
            self.sticker_sources = split_list(value);
        }
        if let Some(value) = get("PROGRAM_FOLDERS") {
            self.program_folders = split_list(value);
        }

        for (key, value) in &vars {
            if let Some(domain) = key.strip_prefix(ENDPOINTS_ENV_PREFIX) {
                let candidates = split_list(value);
                if domain.is_empty() || candidates.is_empty() {
                    return Err(ConfigError::invalid(key, value, "expected a domain and URLs"));
                }
                tracing::debug!("Endpoints for {} from environment", domain.to_lowercase());
                self.endpoints.insert(domain.to_lowercase(), candidates);
            }
        }

        self.validate()
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::invalid("workers", "0", "must be at least 1"));
        }
        for (domain, candidates) in &self.endpoints {
            for candidate in candidates {
                let parsed = url::Url::parse(candidate)
                    .map_err(|e| ConfigError::invalid(domain, candidate, e.to_string()))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::invalid(domain, candidate, "not an http(s) URL"));
                }
            }
        }
        self.program_folders()?;
        Ok(())
    }

    pub fn program_folders(&self) -> Result<Vec<ProgramFolder>, ConfigError> {
        self.program_folders
            .iter()
            .map(|spec| {
                ProgramFolder::parse(spec).ok_or_else(|| {
                    ConfigError::invalid("program_folders", spec, "expected courseID:folderID")
                })
            })
            .collect()
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: self.request_timeout,
            request_delay: Duration::from_millis(self.request_delay_ms),
            retry: RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms)),
            ..HttpConfig::default()
        }
    }

    pub fn open_store(&self) -> Result<Store, StoreError> {
        Store::new(&self.database_path, self.cache_ttl, self.historical_ttl)
    }

    pub fn warmup_options(&self) -> WarmupOptions {
        WarmupOptions {
            modules: self.warmup_modules.clone(),
            workers: self.workers,
            timeout: self.warmup_timeout,
            reset: false,
        }
    }

    pub fn warmup_plan(&self, today: NaiveDate) -> WarmupPlan {
        WarmupPlan::for_date(today).with_sticker_sources(self.sticker_sources.clone())
    }
}

/// Parse `<n>s`, `<n>m`, `<n>h`, `<n>d` or a bare number of seconds.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (digits, unit) = match text.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&text[..i], c.to_ascii_lowercase()),
        _ => (text, 's'),
    };
    let n: u64 = digits.trim().parse().ok()?;
    let secs = match unit {
        's' => n,
        'm' => n.checked_mul(60)?,
        'h' => n.checked_mul(60 * 60)?,
        'd' => n.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

fn env_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| ConfigError::invalid(key, value, "expected e.g. 30s, 15m, 7d"))
}

fn env_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid(key, value, "expected a non-negative integer"))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

/// Durations in the config file: `"7d"` style strings or integer seconds.
mod duration_text {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{}s", d.as_secs()))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_duration(&text)
                .ok_or_else(|| de::Error::custom(format!("invalid duration {text:?}"))),
        }
    }
}
