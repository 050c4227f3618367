use std::path::PathBuf;

use thiserror::Error;

/// The source table could not be read or does not have the expected shape.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read input '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("malformed record at line {line}: {source}")]
    Malformed {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Structural cleaning failures. An empty result set is not one of them.
#[derive(Error, Debug, PartialEq)]
pub enum CleaningError {
    #[error("invalid cleaning settings: {0}")]
    InvalidSettings(String),
}

/// A reduction (argmax, mode, min/max) was asked of an empty series.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("insufficient data to reduce series '{series}'")]
pub struct InsufficientDataError {
    pub series: String,
}

impl InsufficientDataError {
    pub fn new(series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to write chart '{chart}': {source}")]
    Io {
        chart: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chart '{chart}' has nothing to draw")]
    EmptyChart { chart: String },
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("failed to write report document '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize insights: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Everything that can terminate `generate_report`.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Cleaning(#[from] CleaningError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("I/O error preparing output: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// Short label used for metrics and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::Input(_) => "input",
            ReportError::Cleaning(_) => "cleaning",
            ReportError::Render(_) => "render",
            ReportError::Assembly(_) => "assembly",
            ReportError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
