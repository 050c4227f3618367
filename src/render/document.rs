use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ReportSettings;
use crate::constants::{INSIGHTS_FILE, REPORT_FILE};
use crate::error::AssemblyError;
use crate::pipeline::processing::insights::{ids, FactKind, InsightFact};
use crate::render::charts::names;

const TICKET_TYPE_TEXT: &str = "The bar chart on the left shows the distribution of ticket types for each event type. The pie chart on the right shows the overall popularity of each ticket type.";
const AGE_DISTRIBUTION_TEXT: &str = "The boxplot shows the distribution of attendee ages for each event type. You can see the age range and any potential outliers for each event type.";

/// One block of the document: heading, an optional chart and an optional
/// paragraph. Bullet lists are only used by the insights section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub heading: String,
    pub level: u8,
    pub chart: Option<PathBuf>,
    pub narrative: Option<String>,
    pub bullets: Vec<String>,
}

impl ReportSection {
    fn heading(heading: &str, level: u8) -> Self {
        Self {
            heading: heading.to_string(),
            level,
            chart: None,
            narrative: None,
            bullets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub notice: String,
    pub introduction: String,
    pub sections: Vec<ReportSection>,
}

/// Paths of an assembled report.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledReport {
    pub report_path: PathBuf,
    pub insights_path: PathBuf,
}

/// Writes a document plus its machine-readable facts into a directory.
pub trait ReportAssembler {
    fn assemble(
        &self,
        document: &ReportDocument,
        facts: &[InsightFact],
        dir: &Path,
    ) -> Result<AssembledReport, AssemblyError>;
}

/// Lay out the report sections. `charts` maps a chart file stem to the path
/// the document should reference; facts that were omitted leave their
/// section without a paragraph.
pub fn layout(settings: &ReportSettings, facts: &[InsightFact], charts: &HashMap<&str, PathBuf>) -> ReportDocument {
    let by_id: HashMap<&str, &InsightFact> = facts.iter().map(|f| (f.id.as_str(), f)).collect();
    let sentence = |id: &str| by_id.get(id).map(|f| f.sentence.clone());

    let chart_section = |heading: &str, level: u8, chart: &str, narrative: Option<String>| ReportSection {
        heading: heading.to_string(),
        level,
        chart: charts.get(chart).cloned(),
        narrative,
        bullets: Vec::new(),
    };

    let bullets = |kind: FactKind| -> Vec<String> {
        facts
            .iter()
            .filter(|f| f.kind == kind)
            .map(|f| f.sentence.clone())
            .collect()
    };

    let mut insights = ReportSection::heading("Insights", 2);
    insights.bullets = bullets(FactKind::Insight);
    let mut recommendations = ReportSection::heading("Recommendations", 2);
    recommendations.bullets = bullets(FactKind::Recommendation);

    let sections = vec![
        chart_section(
            "1. Event Performance Analysis",
            1,
            names::TOTAL_TICKET_SALES_BY_EVENT,
            sentence(ids::TOP_EVENT_BY_TICKETS),
        ),
        chart_section(
            "1.2 Tickets Sold by Event Type",
            2,
            names::TICKETS_SOLD_BY_EVENT_TYPE,
            sentence(ids::TOP_EVENT_TYPE_BY_TICKETS),
        ),
        chart_section(
            "1.3 Event Type Popularity",
            2,
            names::EVENT_TYPE_POPULARITY,
            sentence(ids::MOST_POPULAR_EVENT_TYPE_SHARE),
        ),
        chart_section(
            "1.4 Tickets Sold by Event Organizer",
            2,
            names::TICKETS_SOLD_BY_ORGANIZER,
            sentence(ids::TOP_ORGANIZER_BY_TICKETS),
        ),
        chart_section(
            "1.5 Ticket Sales Distribution by Price",
            2,
            names::TICKET_SALES_DISTRIBUTION_BY_PRICE,
            sentence(ids::TICKET_PRICE_RANGE),
        ),
        chart_section(
            "1.6 Average Ticket Price per Event",
            2,
            names::AVG_TICKET_PRICE_PER_EVENT,
            sentence(ids::HIGHEST_AVG_PRICE_EVENT),
        ),
        chart_section(
            "1.7 Ticket Type Distribution by Event Type",
            2,
            names::TICKET_TYPE_DISTRIBUTION,
            Some(TICKET_TYPE_TEXT.to_string()),
        ),
        chart_section(
            "1.8 Average Event Duration by Event Type",
            2,
            names::AVG_EVENT_DURATION,
            sentence(ids::LONGEST_AVG_DURATION_EVENT_TYPE),
        ),
        ReportSection::heading("2. Attendee Demographics Analysis", 1),
        chart_section(
            "2.1 Attendee Age Distribution by Event Type",
            2,
            names::ATTENDEE_AGE_DISTRIBUTION,
            Some(AGE_DISTRIBUTION_TEXT.to_string()),
        ),
        chart_section(
            "2.2 Gender Distribution",
            2,
            names::GENDER_DISTRIBUTION,
            sentence(ids::GENDER_SPLIT),
        ),
        ReportSection::heading("3. Insights and Recommendations", 1),
        insights,
        recommendations,
    ];

    ReportDocument {
        title: settings.title.clone(),
        notice: settings.notice.clone(),
        introduction: settings.introduction.clone(),
        sections,
    }
}

#[derive(Serialize)]
struct InsightsFile<'a> {
    title: &'a str,
    facts: &'a [InsightFact],
}

/// Markdown report with chart images linked relative to the report file.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownAssembler;

impl MarkdownAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn to_markdown(&self, document: &ReportDocument) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", document.title);
        let _ = writeln!(out, "<p style=\"color:#FF0000\">{}</p>\n", document.notice);
        let _ = writeln!(out, "{}\n", document.introduction);

        for section in &document.sections {
            let hashes = "#".repeat(usize::from(section.level) + 1);
            let _ = writeln!(out, "{} {}\n", hashes, section.heading);
            if let Some(chart) = &section.chart {
                let alt = chart
                    .file_stem()
                    .map(|s| s.to_string_lossy().replace('_', " "))
                    .unwrap_or_default();
                let _ = writeln!(out, "![{}]({})\n", alt, chart.display());
            }
            if let Some(narrative) = &section.narrative {
                let _ = writeln!(out, "{}\n", narrative);
            }
            for bullet in &section.bullets {
                let _ = writeln!(out, "- {}", bullet);
            }
            if !section.bullets.is_empty() {
                out.push('\n');
            }
        }
        out
    }
}

impl ReportAssembler for MarkdownAssembler {
    fn assemble(
        &self,
        document: &ReportDocument,
        facts: &[InsightFact],
        dir: &Path,
    ) -> Result<AssembledReport, AssemblyError> {
        let report_path = dir.join(REPORT_FILE);
        fs::write(&report_path, self.to_markdown(document)).map_err(|source| AssemblyError::Io {
            path: report_path.clone(),
            source,
        })?;

        let insights_path = dir.join(INSIGHTS_FILE);
        let json = serde_json::to_string_pretty(&InsightsFile {
            title: &document.title,
            facts,
        })?;
        fs::write(&insights_path, json).map_err(|source| AssemblyError::Io {
            path: insights_path.clone(),
            source,
        })?;

        Ok(AssembledReport {
            report_path,
            insights_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::aggregate::aggregate;
    use crate::pipeline::processing::insights::derive_insights;

    fn empty_document() -> (ReportDocument, Vec<InsightFact>) {
        let facts = derive_insights(&aggregate(&[]));
        let charts = HashMap::from([(names::GENDER_DISTRIBUTION, PathBuf::from("charts/gender_distribution.svg"))]);
        (layout(&ReportSettings::default(), &facts, &charts), facts)
    }

    #[test]
    fn test_layout_order_and_levels() {
        let (document, _) = empty_document();
        let headings: Vec<(&str, u8)> = document
            .sections
            .iter()
            .map(|s| (s.heading.as_str(), s.level))
            .collect();
        assert_eq!(headings.first(), Some(&("1. Event Performance Analysis", 1)));
        assert_eq!(headings[8], ("2. Attendee Demographics Analysis", 1));
        assert_eq!(headings.last(), Some(&("Recommendations", 2)));
        assert_eq!(document.title, "CeylonEvent Analysis Report");
    }

    #[test]
    fn test_omitted_facts_leave_sections_without_narrative() {
        let (document, _) = empty_document();
        assert!(document.sections[0].narrative.is_none());
        assert_eq!(document.sections[6].narrative.as_deref(), Some(TICKET_TYPE_TEXT));
        let insights = &document.sections[12];
        assert_eq!(insights.bullets, vec!["Total Revenue from Ticket Sales: LKR 0.00".to_string()]);
        assert!(document.sections[13].bullets.is_empty());
    }

    #[test]
    fn test_markdown_links_charts() {
        let (document, _) = empty_document();
        let markdown = MarkdownAssembler::new().to_markdown(&document);
        assert!(markdown.starts_with("# CeylonEvent Analysis Report\n"));
        assert!(markdown.contains("![gender distribution](charts/gender_distribution.svg)"));
        assert!(markdown.contains("### 1.2 Tickets Sold by Event Type"));
        assert!(markdown.contains("- Total Revenue from Ticket Sales: LKR 0.00"));
    }

    #[test]
    fn test_assemble_writes_report_and_insights() {
        let dir = tempfile::tempdir().unwrap();
        let (document, facts) = empty_document();
        let assembled = MarkdownAssembler::new()
            .assemble(&document, &facts, dir.path())
            .unwrap();
        assert!(assembled.report_path.ends_with(REPORT_FILE));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&assembled.insights_path).unwrap()).unwrap();
        assert_eq!(json["facts"][0]["id"], "total_revenue");
        assert_eq!(json["facts"][0]["values"][0][1]["type"], "amount");
    }
}
