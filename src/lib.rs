pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::{ReportError, Result};
pub use pipeline::report::{generate_report, ReportHandle};
