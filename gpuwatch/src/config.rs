//! Endpoint candidates and tuning knobs.
//! Loaded from $XDG_CONFIG_HOME/gpuwatch/config.json (fallback ~/.config/gpuwatch/config.json);
//! a missing file means defaults. The client never writes it back.

use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::align::{Alignment, DEFAULT_CHART_LEN, DEFAULT_TICK_STEP_SECS};
use crate::conn::{Backoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
use crate::history::DEFAULT_HISTORY_LEN;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid endpoint '{0}': {1}")]
    InvalidEndpoint(String, String),
    #[error("no endpoint configured")]
    NoEndpoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub history_len: usize,
    pub chart_len: usize,
    pub tick_step_secs: f64,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            history_len: DEFAULT_HISTORY_LEN,
            chart_len: DEFAULT_CHART_LEN,
            tick_step_secs: DEFAULT_TICK_STEP_SECS,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            max_delay_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
        }
    }
}

impl Tuning {
    /// Replace values the engine can't work with by their defaults.
    pub fn sanitized(mut self) -> Self {
        let d = Tuning::default();
        if self.history_len == 0 {
            warn!("history_len must be > 0, using {}", d.history_len);
            self.history_len = d.history_len;
        }
        if self.chart_len == 0 {
            warn!("chart_len must be > 0, using {}", d.chart_len);
            self.chart_len = d.chart_len;
        }
        if !(self.tick_step_secs.is_finite() && self.tick_step_secs > 0.0) {
            warn!("tick_step_secs must be > 0, using {}", d.tick_step_secs);
            self.tick_step_secs = d.tick_step_secs;
        }
        if self.base_delay_ms == 0 {
            self.base_delay_ms = d.base_delay_ms;
        }
        self.max_delay_ms = self.max_delay_ms.max(self.base_delay_ms);
        self
    }

    pub fn alignment(&self) -> Alignment {
        Alignment {
            step: self.tick_step_secs,
            chart_len: self.chart_len,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// `host:port/path`, or a full ws(s)/http(s) URL.
    pub candidates: Vec<String>,
    pub selected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_url: Option<String>,
    /// Use wss:// for candidates that don't carry a scheme.
    pub secure: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            candidates: vec!["localhost:8000/ws".into()],
            selected: 0,
            override_url: None,
            secure: false,
        }
    }
}

impl EndpointConfig {
    pub fn resolve(&self) -> Result<String, ConfigError> {
        if let Some(o) = self.override_url.as_deref().filter(|o| !o.trim().is_empty()) {
            return normalize_endpoint(o, self.secure);
        }
        let c = self
            .candidates
            .get(self.selected)
            .ok_or(ConfigError::NoEndpoint)?;
        normalize_endpoint(c, self.secure)
    }

    /// Move to the next candidate (wrapping) and drop any override.
    pub fn cycle(&mut self) {
        if !self.candidates.is_empty() {
            self.selected = (self.selected + 1) % self.candidates.len();
        }
        self.override_url = None;
    }
}

/// Infer the scheme for bare `host:port/path` strings and map http(s) to ws(s).
pub fn normalize_endpoint(raw: &str, secure: bool) -> Result<String, ConfigError> {
    let raw = raw.trim();
    let full = if let Some(rest) = raw.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = raw.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if raw.starts_with("ws://") || raw.starts_with("wss://") {
        raw.to_string()
    } else {
        let scheme = if secure { "wss" } else { "ws" };
        format!("{scheme}://{raw}")
    };
    let url = Url::parse(&full)
        .map_err(|e| ConfigError::InvalidEndpoint(raw.to_string(), e.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidEndpoint(
            raw.to_string(),
            "missing host".into(),
        ));
    }
    Ok(url.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub endpoints: EndpointConfig,
    pub tuning: Tuning,
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("gpuwatch")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gpuwatch")
    }
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

pub fn load_config_from(path: &Path) -> Result<ConfigFile, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&s).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Defaults when the file is missing; a broken file is logged and ignored.
pub fn load_config() -> ConfigFile {
    let path = config_path();
    if !path.exists() {
        return ConfigFile::default();
    }
    match load_config_from(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!("{e}; using defaults");
            ConfigFile::default()
        }
    }
}
