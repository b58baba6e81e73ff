//! Query-layer configuration.
//!
//! Precedence: CLI > environment > config file > defaults. The config file is the first of
//! `--config`, `$ESTATEQUERY_CONFIG` and `./estatequery.toml` that exists.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::DbError;
use crate::pagination::{self, PaginationDefaults};
use crate::query::TextField;

pub const CONFIG_ENV: &str = "ESTATEQUERY_CONFIG";
pub const CONFIG_FILE_NAME: &str = "estatequery.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_page: u64,
    pub default_limit: u64,
    pub max_limit: u64,
    /// Route `searchTerm` to weighted full-text search instead of substring matching.
    pub text_search: bool,
    pub text_weights: Vec<TextField>,
    /// Field holding listing coordinates; geo filtering is off when unset.
    pub geo_field: Option<String>,
    pub slow_query_ms: u64,
    pub query_log: Option<PathBuf>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page: pagination::DEFAULT_PAGE,
            default_limit: pagination::DEFAULT_LIMIT,
            max_limit: pagination::DEFAULT_MAX_LIMIT,
            text_search: false,
            text_weights: default_text_weights(),
            geo_field: None,
            slow_query_ms: 500,
            query_log: None,
        }
    }
}

fn default_text_weights() -> Vec<TextField> {
    [("title", 10), ("location.city", 5), ("location.address", 3), ("description", 1)]
        .into_iter()
        .map(|(path, weight)| TextField { path: path.to_string(), weight })
        .collect()
}

/// Values given on the command line; `None` leaves the lower layers in charge.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_limit: Option<u64>,
    pub default_limit: Option<u64>,
    pub text_search: Option<bool>,
    pub geo_field: Option<String>,
    pub slow_query_ms: Option<u64>,
    pub query_log: Option<PathBuf>,
}

impl QueryConfig {
    /// # Errors
    /// A config file that exists but cannot be read or parsed, or an explicit `cli_path` that
    /// does not exist.
    pub fn load(cli_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, DbError> {
        if let Some(p) = cli_path
            && !p.exists()
        {
            return Err(DbError::Config(format!("config file not found: {}", p.display())));
        }
        let mut cfg = match find_config_file(cli_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg.apply_overrides(overrides);
        Ok(cfg)
    }

    /// # Errors
    /// I/O failure or invalid TOML.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&s)?;
        log::debug!("loaded config from {}", path.display());
        Ok(cfg)
    }

    /// Applies `ESTATEQUERY_*` variables. Unparsable values are ignored with a warning.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env_parse::<u64>(&var, "ESTATEQUERY_MAX_LIMIT") {
            self.max_limit = v;
        }
        if let Some(v) = env_parse::<u64>(&var, "ESTATEQUERY_DEFAULT_LIMIT") {
            self.default_limit = v;
        }
        if let Some(v) = var("ESTATEQUERY_TEXT_SEARCH") {
            match parse_flag(&v) {
                Some(b) => self.text_search = b,
                None => log::warn!("ignoring ESTATEQUERY_TEXT_SEARCH={v}"),
            }
        }
        if let Some(v) = var("ESTATEQUERY_GEO_FIELD") {
            let v = v.trim();
            self.geo_field = (!v.is_empty()).then(|| v.to_string());
        }
        if let Some(v) = env_parse::<u64>(&var, "ESTATEQUERY_SLOW_QUERY_MS") {
            self.slow_query_ms = v;
        }
    }

    pub fn apply_overrides(&mut self, o: &ConfigOverrides) {
        if let Some(v) = o.max_limit {
            self.max_limit = v;
        }
        if let Some(v) = o.default_limit {
            self.default_limit = v;
        }
        if let Some(v) = o.text_search {
            self.text_search = v;
        }
        if let Some(v) = &o.geo_field {
            self.geo_field = Some(v.clone());
        }
        if let Some(v) = o.slow_query_ms {
            self.slow_query_ms = v;
        }
        if let Some(v) = &o.query_log {
            self.query_log = Some(v.clone());
        }
    }

    #[must_use]
    pub fn pagination_defaults(&self) -> PaginationDefaults {
        PaginationDefaults { page: self.default_page, limit: self.default_limit }
    }

    /// Weighted search fields, or `None` when text search is disabled.
    #[must_use]
    pub fn text_fields(&self) -> Option<Vec<TextField>> {
        (self.text_search && !self.text_weights.is_empty()).then(|| self.text_weights.clone())
    }

    /// Pushes the telemetry-related settings into the global query telemetry.
    pub fn install_telemetry(&self) {
        crate::query::telemetry::set_slow_query_ms(self.slow_query_ms);
        if let Some(p) = &self.query_log {
            crate::query::telemetry::set_query_log(p.clone(), None, None);
        }
    }
}

fn find_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    let mut paths: Vec<PathBuf> = vec![];
    if let Some(p) = cli_path {
        paths.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        paths.push(PathBuf::from(p));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE_NAME));
    }
    paths.into_iter().find(|p| p.exists())
}

fn env_parse<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    let parsed = raw.trim().parse::<T>().ok();
    if parsed.is_none() {
        log::warn!("ignoring {key}={raw}");
    }
    parsed
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
