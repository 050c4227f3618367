use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{AppConfig, ReportSettings};
use crate::constants::CHARTS_DIR;
use crate::error::{CleaningError, InputError, Result};
use crate::pipeline::loader::read_records;
use crate::pipeline::processing::aggregate::{aggregate, AggregateBundle};
use crate::pipeline::processing::clean::{Cleaner, CleaningSettings, CleaningSummary, DefaultCleaner};
use crate::pipeline::processing::enrich::enrich;
use crate::pipeline::processing::insights::{InsightEngine, InsightFact};
use crate::render::charts::{chart_plan, ChartRenderer};
use crate::render::document::{layout, AssembledReport, MarkdownAssembler, ReportAssembler};
use crate::render::svg::SvgChartRenderer;
use crate::types::RawRecord;

/// Everything computed from one input table, before anything is written.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub summary: CleaningSummary,
    pub bundle: AggregateBundle,
    pub facts: Vec<InsightFact>,
}

/// Run clean, enrich, aggregate and insights over loaded records.
pub fn analyze(records: &[RawRecord], settings: &CleaningSettings, currency: &str) -> std::result::Result<Analysis, CleaningError> {
    let cleaner = DefaultCleaner::with_settings(settings.clone())?;
    let outcome = cleaner.clean(records);
    let enriched = enrich(&outcome.records);
    let bundle = aggregate(&enriched);
    let facts = InsightEngine::new(currency).derive(&bundle);
    Ok(Analysis {
        summary: outcome.summary,
        bundle,
        facts,
    })
}

/// Hex SHA-256 of the input bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn read_input(path: &Path) -> std::result::Result<(Vec<RawRecord>, String), InputError> {
    let bytes = fs::read(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_records(bytes.as_slice())?;
    info!(path = %path.display(), rows = records.len(), "Loaded input table");
    Ok((records, fingerprint(&bytes)))
}

/// Load and analyse the configured input without writing any files.
pub fn analyze_input(config: &AppConfig) -> Result<Analysis> {
    let (records, _) = read_input(&config.input_path)?;
    Ok(analyze(&records, &config.cleaning, &config.report.currency)?)
}

/// Where a finished report lives and what went into it.
#[derive(Debug, Clone, Serialize)]
pub struct ReportHandle {
    pub run_id: Uuid,
    pub report_path: PathBuf,
    pub insights_path: PathBuf,
    pub chart_paths: Vec<PathBuf>,
    pub generated_at: DateTime<Utc>,
    pub input_fingerprint: String,
    pub cleaning: CleaningSummary,
    pub fact_count: usize,
}

struct StagedReport {
    assembled: AssembledReport,
    charts: Vec<PathBuf>,
}

/// Runs the pipeline and hands its results to a chart renderer and a
/// document assembler.
#[derive(Debug, Clone, Default)]
pub struct ReportGenerator<R = SvgChartRenderer, A = MarkdownAssembler> {
    renderer: R,
    assembler: A,
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: ChartRenderer, A: ReportAssembler> ReportGenerator<R, A> {
    pub fn with_collaborators(renderer: R, assembler: A) -> Self {
        Self { renderer, assembler }
    }

    /// Generate a report for `config`. Output is written to a private staging
    /// directory and only replaces the published report once complete.
    #[instrument(skip(self, config), fields(input = %config.input_path.display()))]
    pub fn generate(&self, config: &AppConfig) -> Result<ReportHandle> {
        let started = Instant::now();
        let result = self.run(config);
        match &result {
            Ok(handle) => {
                let elapsed = started.elapsed().as_secs_f64();
                info!(
                    run_id = %handle.run_id,
                    report = %handle.report_path.display(),
                    facts = handle.fact_count,
                    elapsed_secs = elapsed,
                    "Report generated"
                );
                crate::observability::metrics::report::run_succeeded(elapsed);
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Report generation failed");
                crate::observability::metrics::report::run_failed(e.kind());
            }
        }
        result
    }

    fn run(&self, config: &AppConfig) -> Result<ReportHandle> {
        let run_id = Uuid::new_v4();
        let (records, input_fingerprint) = read_input(&config.input_path)?;
        let analysis = analyze(&records, &config.cleaning, &config.report.currency)?;

        fs::create_dir_all(&config.output_dir)?;
        let staging = config.output_dir.join(format!(".staging-{run_id}"));
        let staged = match self.write_staged(&staging, &analysis, &config.report) {
            Ok(staged) => staged,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        let report_dir = config.report_dir();
        if let Err(e) = publish(&staging, &report_dir, &config.output_dir, run_id) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e.into());
        }

        let relocate = |path: &Path| match path.strip_prefix(&staging) {
            Ok(relative) => report_dir.join(relative),
            Err(_) => path.to_path_buf(),
        };
        Ok(ReportHandle {
            run_id,
            report_path: relocate(&staged.assembled.report_path),
            insights_path: relocate(&staged.assembled.insights_path),
            chart_paths: staged.charts.iter().map(|p| relocate(p)).collect(),
            generated_at: Utc::now(),
            input_fingerprint,
            cleaning: analysis.summary,
            fact_count: analysis.facts.len(),
        })
    }

    fn write_staged(&self, staging: &Path, analysis: &Analysis, settings: &ReportSettings) -> Result<StagedReport> {
        let charts_dir = staging.join(CHARTS_DIR);
        fs::create_dir_all(&charts_dir)?;

        let mut links = HashMap::new();
        let mut charts = Vec::new();
        for chart in chart_plan(&analysis.bundle) {
            let path = self.renderer.render(&chart, &charts_dir)?;
            let link = path
                .strip_prefix(staging)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone());
            links.insert(chart.file_stem, link);
            charts.push(path);
        }

        let document = layout(settings, &analysis.facts, &links);
        let assembled = self.assembler.assemble(&document, &analysis.facts, staging)?;
        Ok(StagedReport { assembled, charts })
    }
}

/// Move `staging` into place at `target`, keeping the old report until the
/// new one is in.
fn publish(staging: &Path, target: &Path, output_dir: &Path, run_id: Uuid) -> std::io::Result<()> {
    if !target.exists() {
        return fs::rename(staging, target);
    }
    let previous = output_dir.join(format!(".previous-{run_id}"));
    fs::rename(target, &previous)?;
    if let Err(e) = fs::rename(staging, target) {
        let _ = fs::rename(&previous, target);
        return Err(e);
    }
    if let Err(e) = fs::remove_dir_all(&previous) {
        warn!(path = %previous.display(), error = %e, "Could not remove previous report");
    }
    Ok(())
}

/// Generate a report with the SVG renderer and the Markdown assembler.
pub fn generate_report(config: &AppConfig) -> Result<ReportHandle> {
    ReportGenerator::new().generate(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReportError, RenderError};
    use crate::render::charts::ChartSpec;

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_publish_replaces_existing_report() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("report");
        let staging = root.path().join(".staging");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("old.md"), "old").unwrap();
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("new.md"), "new").unwrap();

        publish(&staging, &target, root.path(), Uuid::new_v4()).unwrap();

        assert!(target.join("new.md").exists());
        assert!(!target.join("old.md").exists());
        assert!(!staging.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }

    struct FailingRenderer;

    impl ChartRenderer for FailingRenderer {
        fn render(&self, chart: &ChartSpec, _dir: &Path) -> std::result::Result<PathBuf, RenderError> {
            Err(RenderError::EmptyChart {
                chart: chart.file_stem.to_string(),
            })
        }
    }

    #[test]
    fn test_render_failure_leaves_no_output() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("event.csv");
        fs::write(
            &input,
            "Event Name,Event Type,Event Organizer,Event Date,Attendee Name,Attendee Age,Attendee Gender,Attendee Contact Information,Attendee Location,Ticket ID,Ticket Type,Ticket Price,Event Duration\n\
             EventA,Rock,OrgX,2024-08-01,Ann,25,Male,a@b.c,Colombo,T1,VIP,100,3\n",
        )
        .unwrap();
        let config = AppConfig {
            input_path: input,
            output_dir: root.path().join("out"),
            ..AppConfig::default()
        };

        let generator = ReportGenerator::with_collaborators(FailingRenderer, MarkdownAssembler::new());
        let err = generator.generate(&config).unwrap_err();

        assert!(matches!(err, ReportError::Render(_)));
        assert_eq!(err.kind(), "render");
        assert_eq!(fs::read_dir(&config.output_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_settings_fail_before_output() {
        let settings = CleaningSettings {
            fence_multiplier: -1.0,
            ..CleaningSettings::default()
        };
        let err = analyze(&[], &settings, "LKR").unwrap_err();
        assert!(matches!(err, CleaningError::InvalidSettings(_)));
    }
}
