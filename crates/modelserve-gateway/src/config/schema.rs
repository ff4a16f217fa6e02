use std::net::SocketAddr;

use serde::Deserialize;
use modelserve_core::error::{ModelServeError, Result};
use modelserve_core::inference::threshold::{DEFAULT_DRIFT_THRESHOLD, DEFAULT_SUM_THRESHOLD};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub log: LogSection,

    #[serde(default)]
    pub inference: InferenceSection,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            log: LogSection::default(),
            inference: InferenceSection::default(),
        }
    }
}

impl ServeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ModelServeError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.log.validate()?;
        self.inference.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            ModelServeError::Config(format!("server.listen must be a valid SocketAddr ({}): {e}", self.listen))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    /// Python-style level names are accepted (`INFO`, `WARNING`, `CRITICAL`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl LogSection {
    pub fn validate(&self) -> Result<()> {
        self.filter_directive().map(|_| ())
    }

    /// Map the configured level onto a `tracing` filter directive.
    pub fn filter_directive(&self) -> Result<&'static str> {
        match self.level.to_ascii_uppercase().as_str() {
            "TRACE" => Ok("trace"),
            "DEBUG" => Ok("debug"),
            "INFO" => Ok("info"),
            "WARN" | "WARNING" => Ok("warn"),
            "ERROR" | "CRITICAL" | "FATAL" => Ok("error"),
            other => Err(ModelServeError::Config(format!("log.level unknown: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InferenceSection {
    #[serde(default = "default_sum_threshold")]
    pub sum_threshold: f64,

    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            sum_threshold: default_sum_threshold(),
            drift_threshold: default_drift_threshold(),
        }
    }
}

impl InferenceSection {
    pub fn validate(&self) -> Result<()> {
        if !self.sum_threshold.is_finite() || !self.drift_threshold.is_finite() {
            return Err(ModelServeError::Config(
                "inference thresholds must be finite".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}
fn default_log_level() -> String {
    "INFO".into()
}
fn default_sum_threshold() -> f64 {
    DEFAULT_SUM_THRESHOLD
}
fn default_drift_threshold() -> f64 {
    DEFAULT_DRIFT_THRESHOLD
}
