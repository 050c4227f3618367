//! Chart and document writers fed by the finished pipeline snapshots.

pub mod charts;
pub mod document;
pub mod svg;

pub use charts::{chart_plan, ChartRenderer, ChartSpec};
pub use document::{layout, MarkdownAssembler, ReportAssembler, ReportDocument, ReportSection};
pub use svg::SvgChartRenderer;
