use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::CredoError;

pub const DEFAULT_CONFIG_FILE: &str = "credoscript.json";
pub const DEFAULT_PER_PAGE: usize = 100;
pub const DEFAULT_MAX_DEPTH: u32 = 10_000;
pub const DEFAULT_BUFFER_RADIUS: f64 = 0.4;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub database: String,
    #[serde(default)]
    pub read_only: Option<bool>,
    #[serde(default)]
    pub per_page: Option<usize>,
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub buffer_radius: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub database: Utf8PathBuf,
    pub read_only: bool,
    pub per_page: usize,
    /// Deepest clade nesting the PhyloXML renderer follows.
    pub max_depth: u32,
    pub buffer_radius: f64,
}

impl ResolvedConfig {
    pub fn for_database(database: impl Into<Utf8PathBuf>) -> Self {
        Self {
            database: database.into(),
            read_only: true,
            per_page: DEFAULT_PER_PAGE,
            max_depth: DEFAULT_MAX_DEPTH,
            buffer_radius: DEFAULT_BUFFER_RADIUS,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CredoError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(CredoError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CredoError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CredoError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CredoError> {
        let database = config.database.trim();
        if database.is_empty() {
            return Err(CredoError::ConfigParse(
                "database path must not be empty".to_string(),
            ));
        }

        let per_page = config.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if per_page == 0 {
            return Err(CredoError::ConfigParse(
                "per_page must be at least 1".to_string(),
            ));
        }

        let max_depth = config.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        if max_depth == 0 {
            return Err(CredoError::ConfigParse(
                "max_depth must be at least 1".to_string(),
            ));
        }

        let buffer_radius = config.buffer_radius.unwrap_or(DEFAULT_BUFFER_RADIUS);
        if !buffer_radius.is_finite() || buffer_radius < 0.0 {
            return Err(CredoError::ConfigParse(format!(
                "buffer_radius must be a non-negative number, got {buffer_radius}"
            )));
        }

        Ok(ResolvedConfig {
            database: Utf8PathBuf::from(database),
            read_only: config.read_only.unwrap_or(true),
            per_page,
            max_depth,
            buffer_radius,
        })
    }
}
