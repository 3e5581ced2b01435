use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "https://search-zzvl7ri3bq-uc.a.run.app";
pub const DEFAULT_INDEX: &str = "salesarchive";
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_DELAY_SECONDS: f64 = 0.5;

const ENV_PREFIX: &str = "SALES_ARCHIVE_";

/// Runtime settings for one fetch run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of the search service; `/search` is appended.
    pub api_url: Url,
    /// Archive index passed as the `index` parameter.
    pub index: String,
    /// Bearer credential sent with every request.
    pub token: String,
    /// Spreadsheet or CSV holding the query list.
    pub input_path: PathBuf,
    /// CSV file records are accumulated into.
    pub output_path: PathBuf,
    /// Header of the input column holding query strings.
    pub query_column: String,
    pub page_size: usize,
    /// Pause between consecutive page requests.
    pub delay_seconds: f64,
    /// Extra random pause added on top of `delay_seconds`.
    pub delay_jitter_seconds: f64,
    /// Process at most this many pending queries, then stop cleanly.
    pub max_queries: Option<usize>,
    /// Extra attempts for transient transport failures. 0 disables retry.
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Config {
    /// Builds a config with defaults for everything except the credential.
    pub fn with_token(token: impl Into<String>) -> Self {
        Config {
            api_url: Url::parse(DEFAULT_API_URL).expect("default api url is valid"),
            index: DEFAULT_INDEX.to_string(),
            token: token.into(),
            input_path: PathBuf::from("input.xlsx"),
            output_path: PathBuf::from("output.csv"),
            query_column: "Queries".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            delay_seconds: DEFAULT_DELAY_SECONDS,
            delay_jitter_seconds: 0.0,
            max_queries: None,
            max_retries: 0,
            timeout_secs: 30,
        }
    }

    /// Reads `SALES_ARCHIVE_*` variables, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, with variables supplied by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let token = get("TOKEN").ok_or(ConfigError::Missing("SALES_ARCHIVE_TOKEN"))?;
        let mut config = Config::with_token(token);

        if let Some(raw) = get("API_URL") {
            config.api_url = Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                key: "SALES_ARCHIVE_API_URL",
                value: raw.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(index) = get("INDEX") {
            config.index = index;
        }
        if let Some(path) = get("INPUT") {
            config.input_path = PathBuf::from(path);
        }
        if let Some(path) = get("OUTPUT") {
            config.output_path = PathBuf::from(path);
        }
        if let Some(column) = get("QUERY_COLUMN") {
            config.query_column = column;
        }
        if let Some(raw) = get("PAGE_SIZE") {
            config.page_size = parse("SALES_ARCHIVE_PAGE_SIZE", &raw)?;
        }
        if let Some(raw) = get("DELAY_SECONDS") {
            config.delay_seconds = parse("SALES_ARCHIVE_DELAY_SECONDS", &raw)?;
        }
        if let Some(raw) = get("DELAY_JITTER_SECONDS") {
            config.delay_jitter_seconds = parse("SALES_ARCHIVE_DELAY_JITTER_SECONDS", &raw)?;
        }
        if let Some(raw) = get("MAX_QUERIES") {
            config.max_queries = Some(parse("SALES_ARCHIVE_MAX_QUERIES", &raw)?);
        }
        if let Some(raw) = get("MAX_RETRIES") {
            config.max_retries = parse("SALES_ARCHIVE_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = get("TIMEOUT_SECS") {
            config.timeout_secs = parse("SALES_ARCHIVE_TIMEOUT_SECS", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::Missing("SALES_ARCHIVE_TOKEN"));
        }
        if self.page_size == 0 {
            return Err(invalid("SALES_ARCHIVE_PAGE_SIZE", "0", "must be at least 1"));
        }
        for (key, value) in [
            ("SALES_ARCHIVE_DELAY_SECONDS", self.delay_seconds),
            ("SALES_ARCHIVE_DELAY_JITTER_SECONDS", self.delay_jitter_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(key, &value.to_string(), "must be a non-negative number"));
            }
        }
        if self.api_url.cannot_be_a_base() {
            return Err(invalid("SALES_ARCHIVE_API_URL", self.api_url.as_str(), "must be an http(s) base url"));
        }
        Ok(())
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| invalid(key, raw, &e.to_string()))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
