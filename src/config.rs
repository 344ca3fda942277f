//! # Capture configuration
//!
//! [`LensConfig`] is what a client is built with: a verbosity level and a
//! list of exclusion predicates evaluated at send time.
//!
//! [`LensSettings`] is the declarative form, read from a `lens.toml` or
//! `lens.yaml` file and compiled into a `LensConfig`.
//!
//! # Example lens.toml
//!
//! ```toml
//! level = "body"
//! max_body_size = 1048576
//! exclude_urls = [
//!     "^https://telemetry\\.",
//!     "/health$",
//! ]
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{LensError, Result};
use crate::materializer::DEFAULT_MAX_BODY_SIZE;
use crate::request::HttpRequest;

/// Settings file name looked up by `LensSettings::default_path`
pub const SETTINGS_FILENAME: &str = "lens.toml";

/// How much of each call gets captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Nothing is captured
    None,
    /// Method, URL, status and timing
    Info,
    /// `Info` plus response headers
    #[default]
    Headers,
    /// `Headers` plus the decoded response body
    Body,
    /// Everything
    All,
}

impl LogLevel {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn captures_headers(&self) -> bool {
        matches!(self, Self::Headers | Self::Body | Self::All)
    }

    pub fn captures_body(&self) -> bool {
        matches!(self, Self::Body | Self::All)
    }
}

/// Predicate that, when it returns `true`, keeps a request out of the log
pub type ExcludeFn = Arc<dyn Fn(&HttpRequest) -> bool + Send + Sync>;

/// Capture configuration, supplied once when the client is built.
#[derive(Clone)]
pub struct LensConfig {
    pub level: LogLevel,
    pub max_body_size: usize,
    exclusions: Vec<ExcludeFn>,
}

impl fmt::Debug for LensConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LensConfig")
            .field("level", &self.level)
            .field("max_body_size", &self.max_body_size)
            .field("exclusions", &self.exclusions.len())
            .finish()
    }
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            exclusions: Vec::new(),
        }
    }
}

impl LensConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capture level (builder pattern)
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Exclude every request for which `predicate` returns `true`
    pub fn exclude<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HttpRequest) -> bool + Send + Sync + 'static,
    {
        self.exclusions.push(Arc::new(predicate));
        self
    }

    pub fn exclusion_count(&self) -> usize {
        self.exclusions.len()
    }

    /// Whether a request should be captured at all
    pub fn should_log(&self, request: &HttpRequest) -> bool {
        self.level.is_enabled() && !self.exclusions.iter().any(|exclude| exclude(request))
    }
}

/// File-backed settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensSettings {
    #[serde(default)]
    pub level: LogLevel,

    /// Regular expressions matched against the full request URL
    #[serde(default)]
    pub exclude_urls: Vec<String>,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

impl Default for LensSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            exclude_urls: Vec::new(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl LensSettings {
    /// Parse settings from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load settings from a `.toml`, `.yaml` or `.yml` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            other => Err(LensError::Config(format!(
                "unsupported settings file extension {:?} for {:?}",
                other, path
            ))),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LensError::Config(e.to_string()))
    }

    /// Compile into a `LensConfig`, one exclusion predicate per pattern.
    pub fn into_config(self) -> Result<LensConfig> {
        let mut config = LensConfig::new()
            .level(self.level)
            .max_body_size(self.max_body_size);

        for pattern in &self.exclude_urls {
            let regex = Regex::new(pattern)
                .map_err(|e| LensError::InvalidPattern(format!("{}: {}", pattern, e)))?;
            config = config.exclude(move |request| regex.is_match(&request.url));
        }

        Ok(config)
    }

    /// `<config dir>/lens/lens.toml`
    #[cfg(feature = "discovery")]
    pub fn default_path() -> Result<std::path::PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            LensError::Config("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("lens").join(SETTINGS_FILENAME))
    }

    /// Settings from the default path, or defaults if no file exists there
    #[cfg(feature = "discovery")]
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}
