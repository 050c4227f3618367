// Data pipeline: loading, processing, and report generation

pub mod loader;
pub mod processing;
pub mod report;

pub use loader::load_records;
pub use report::{analyze, generate_report, ReportGenerator, ReportHandle};
