use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pipeline::processing::clean::CleaningSettings;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

pub const ENV_INPUT: &str = "EVENT_REPORT_INPUT";
pub const ENV_OUTPUT_DIR: &str = "EVENT_REPORT_OUTPUT_DIR";
pub const ENV_BIND: &str = "EVENT_REPORT_BIND";
pub const ENV_LOG_DIR: &str = "EVENT_REPORT_LOG_DIR";
pub const ENV_METRICS_ADDR: &str = "EVENT_REPORT_METRICS_ADDR";

/// Static texts and labels of the generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub title: String,
    pub notice: String,
    pub introduction: String,
    pub currency: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: "CeylonEvent Analysis Report".to_string(),
            notice: "Notice: This CeylonEvent analysis report is for demonstration purposes only. The analysis utilizes a dummy dataset of event ticket sales.".to_string(),
            introduction: "This report provides a comprehensive analysis of event data, including key insights into event popularity, ticket sales, attendee demographics, and more.".to_string(),
            currency: "LKR".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub log_dir: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Prometheus scrape address; no exporter when unset.
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub report: ReportSettings,
    pub cleaning: CleaningSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub metrics: MetricsSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/event.csv"),
            output_dir: PathBuf::from("output"),
            report: ReportSettings::default(),
            cleaning: CleaningSettings::default(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration: `.env`, then the TOML file (an explicit path must
    /// exist, the default one may be absent), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides looked up by environment variable name.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(input) = lookup(ENV_INPUT) {
            self.input_path = PathBuf::from(input);
        }
        if let Some(output) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(output);
        }
        if let Some(log_dir) = lookup(ENV_LOG_DIR) {
            self.logging.log_dir = PathBuf::from(log_dir);
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.server.bind = parse_addr(ENV_BIND, &bind)?;
        }
        if let Some(addr) = lookup(ENV_METRICS_ADDR) {
            self.metrics.listen = Some(parse_addr(ENV_METRICS_ADDR, &addr)?);
        }
        Ok(())
    }

    /// Directory holding the published report.
    pub fn report_dir(&self) -> PathBuf {
        self.output_dir.join(crate::constants::REPORT_DIR)
    }

    pub fn report_path(&self) -> PathBuf {
        self.report_dir().join(crate::constants::REPORT_FILE)
    }
}

fn parse_addr(key: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
