//! The fixed chart plan: which series each chart draws, its kind, titles,
//! ordering and colours.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::RenderError;
use crate::pipeline::processing::aggregate::{AggregateBundle, AggregateSeries, BoxSummary, HistogramBin};

pub const ORANGE: &str = "#FFA500";
pub const LIGHT_BLUE: &str = "#ADD8E6";
pub const LIGHT_GREEN: &str = "#90EE90";
pub const PURPLE: &str = "#800080";
pub const PINK: &str = "#FFC0CB";
pub const DARK_CYAN: &str = "#008B8B";

/// Cycled over the bars of the ticket-count charts.
pub const BAR_CYCLE: [&str; 5] = [ORANGE, LIGHT_BLUE, LIGHT_GREEN, PURPLE, PINK];

const COOLWARM: [&str; 7] = [
    "#3B4CC0", "#6F92F3", "#AAC7FD", "#DDDDDD", "#F7B89C", "#E7745B", "#B40426",
];

const PAIRED: [&str; 12] = [
    "#A6CEE3", "#1F78B4", "#B2DF8A", "#33A02C", "#FB9A99", "#E31A1C", "#FDBF6F", "#FF7F00",
    "#CAB2D6", "#6A3D9A", "#FFFF99", "#B15928",
];

/// `n` colours spread evenly across the diverging cool-to-warm ramp.
pub fn coolwarm(n: usize) -> Vec<String> {
    match n {
        0 => Vec::new(),
        1 => vec![COOLWARM[COOLWARM.len() / 2].to_string()],
        _ => (0..n)
            .map(|i| {
                let index = (i * (COOLWARM.len() - 1) + (n - 1) / 2) / (n - 1);
                COOLWARM[index].to_string()
            })
            .collect(),
    }
}

/// First `n` colours of the paired qualitative palette, repeating if needed.
pub fn paired(n: usize) -> Vec<String> {
    PAIRED.iter().cycle().take(n).map(|c| c.to_string()).collect()
}

fn cycle(colors: &[&str], n: usize) -> Vec<String> {
    colors.iter().cycle().take(n).map(|c| c.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartData {
    Bar {
        labels: Vec<String>,
        values: Vec<f64>,
        colors: Vec<String>,
    },
    /// One bar per category and series; `stacked` piles the series.
    GroupedBar {
        categories: Vec<String>,
        series: Vec<(String, Vec<f64>)>,
        colors: Vec<String>,
        stacked: bool,
    },
    Pie {
        labels: Vec<String>,
        values: Vec<f64>,
        colors: Vec<String>,
    },
    Histogram {
        bins: Vec<HistogramBin>,
        color: String,
    },
    Box {
        labels: Vec<String>,
        summaries: Vec<BoxSummary>,
        colors: Vec<String>,
    },
}

impl ChartData {
    pub fn is_empty(&self) -> bool {
        match self {
            ChartData::Bar { labels, .. } | ChartData::Pie { labels, .. } => labels.is_empty(),
            ChartData::GroupedBar { categories, .. } => categories.is_empty(),
            ChartData::Histogram { bins, .. } => bins.is_empty(),
            ChartData::Box { labels, .. } => labels.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPanel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Degrees of x tick label rotation.
    pub label_rotation: u16,
    pub data: ChartData,
}

/// One output image, one or two panels side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub file_stem: &'static str,
    pub panels: Vec<ChartPanel>,
}

/// Writes a chart into a directory and returns the written file's path.
pub trait ChartRenderer {
    fn render(&self, chart: &ChartSpec, dir: &Path) -> Result<PathBuf, RenderError>;
}

pub mod names {
    pub const TOTAL_TICKET_SALES_BY_EVENT: &str = "total_ticket_sales_by_event";
    pub const TICKETS_SOLD_BY_EVENT_TYPE: &str = "tickets_sold_by_event_type";
    pub const EVENT_TYPE_POPULARITY: &str = "event_type_popularity";
    pub const TICKETS_SOLD_BY_ORGANIZER: &str = "tickets_sold_by_organizer";
    pub const TICKET_SALES_DISTRIBUTION_BY_PRICE: &str = "ticket_sales_distribution_by_price";
    pub const AVG_TICKET_PRICE_PER_EVENT: &str = "avg_ticket_price_per_event";
    pub const TICKET_TYPE_DISTRIBUTION: &str = "ticket_type_distribution";
    pub const AVG_EVENT_DURATION: &str = "avg_event_duration";
    pub const ATTENDEE_AGE_DISTRIBUTION: &str = "attendee_age_distribution";
    pub const GENDER_DISTRIBUTION: &str = "gender_distribution";
}

fn panel(title: &str, x_label: &str, y_label: &str, label_rotation: u16, data: ChartData) -> ChartPanel {
    ChartPanel {
        title: title.to_string(),
        x_label: x_label.to_string(),
        y_label: y_label.to_string(),
        label_rotation,
        data,
    }
}

fn bars(series: &AggregateSeries, colors: Vec<String>) -> ChartData {
    let (labels, values): (Vec<String>, Vec<f64>) = series.entries.iter().cloned().unzip();
    ChartData::Bar { labels, values, colors }
}

fn cycled_bars(series: &AggregateSeries, palette: &[&str]) -> ChartData {
    bars(series, cycle(palette, series.len()))
}

fn pie(series: &AggregateSeries, colors: Vec<String>) -> ChartData {
    let (labels, values): (Vec<String>, Vec<f64>) = series.entries.iter().cloned().unzip();
    ChartData::Pie { labels, values, colors }
}

/// The ten charts of the report, in document order.
pub fn chart_plan(bundle: &AggregateBundle) -> Vec<ChartSpec> {
    let ticket_types = &bundle.ticket_type_by_event_type;
    let ticket_type_bars = ChartData::GroupedBar {
        categories: ticket_types.rows.clone(),
        series: ticket_types
            .columns
            .iter()
            .enumerate()
            .map(|(c, name)| (name.clone(), ticket_types.counts.iter().map(|row| row[c] as f64).collect()))
            .collect(),
        colors: coolwarm(ticket_types.columns.len()),
        stacked: false,
    };

    let genders = &bundle.gender_by_event;
    let gender_bars = ChartData::GroupedBar {
        categories: genders.rows.clone(),
        series: genders
            .columns
            .iter()
            .enumerate()
            .map(|(c, name)| (name.clone(), genders.counts.iter().map(|row| row[c] as f64).collect()))
            .collect(),
        colors: cycle(&[LIGHT_BLUE, PINK], genders.columns.len()),
        stacked: true,
    };

    let ages = &bundle.age_by_event_type;
    let age_boxes = ChartData::Box {
        labels: ages.iter().map(|a| a.event_type.clone()).collect(),
        summaries: ages.iter().map(|a| a.summary.clone()).collect(),
        colors: coolwarm(ages.len()),
    };

    vec![
        ChartSpec {
            file_stem: names::TOTAL_TICKET_SALES_BY_EVENT,
            panels: vec![panel(
                "Total Ticket Sales by Event",
                "Event Name",
                "Number of Tickets Sold",
                90,
                cycled_bars(&bundle.tickets_by_event, &BAR_CYCLE),
            )],
        },
        ChartSpec {
            file_stem: names::TICKETS_SOLD_BY_EVENT_TYPE,
            panels: vec![panel(
                "Tickets Sold by Event Type",
                "Event Type",
                "Number of Tickets Sold",
                45,
                cycled_bars(&bundle.tickets_by_event_type, &BAR_CYCLE),
            )],
        },
        ChartSpec {
            file_stem: names::EVENT_TYPE_POPULARITY,
            panels: vec![panel(
                "Event Type Popularity",
                "",
                "",
                0,
                pie(&bundle.tickets_by_event_type, coolwarm(bundle.tickets_by_event_type.len())),
            )],
        },
        ChartSpec {
            file_stem: names::TICKETS_SOLD_BY_ORGANIZER,
            panels: vec![panel(
                "Total Tickets Sold by Event Organizer",
                "Event Organizer",
                "Total Number of Tickets Sold",
                45,
                cycled_bars(&bundle.tickets_by_organizer, &BAR_CYCLE),
            )],
        },
        ChartSpec {
            file_stem: names::TICKET_SALES_DISTRIBUTION_BY_PRICE,
            panels: vec![panel(
                "Ticket Sales Distribution by Price",
                "Ticket Price",
                "No Of Tickets",
                0,
                ChartData::Histogram {
                    bins: bundle.price_histogram.bins.clone(),
                    color: PURPLE.to_string(),
                },
            )],
        },
        ChartSpec {
            file_stem: names::AVG_TICKET_PRICE_PER_EVENT,
            panels: vec![panel(
                "Average Ticket Price per Event",
                "Event Name",
                "Average Ticket Price",
                90,
                cycled_bars(&bundle.avg_price_by_event, &[LIGHT_BLUE, LIGHT_GREEN]),
            )],
        },
        ChartSpec {
            file_stem: names::TICKET_TYPE_DISTRIBUTION,
            panels: vec![
                panel("Ticket Type Distribution by Event Type", "Event Type", "Ticket Count", 45, ticket_type_bars),
                panel(
                    "Ticket Type Popularity",
                    "",
                    "",
                    0,
                    pie(&bundle.tickets_by_ticket_type, paired(bundle.tickets_by_ticket_type.len())),
                ),
            ],
        },
        ChartSpec {
            file_stem: names::AVG_EVENT_DURATION,
            panels: vec![panel(
                "Average Event Duration by Event Type",
                "Event Type",
                "Average Duration (Hours)",
                45,
                cycled_bars(&bundle.avg_duration_by_event_type, &[DARK_CYAN]),
            )],
        },
        ChartSpec {
            file_stem: names::ATTENDEE_AGE_DISTRIBUTION,
            panels: vec![panel(
                "Attendee Age Distribution by Event Type",
                "Event Type",
                "Attendee Age",
                45,
                age_boxes,
            )],
        },
        ChartSpec {
            file_stem: names::GENDER_DISTRIBUTION,
            panels: vec![
                panel("Attendee Gender Distribution by Event", "Event Name", "Number of Attendees", 45, gender_bars),
                panel(
                    "Overall Attendee Gender Distribution",
                    "",
                    "",
                    0,
                    pie(&bundle.gender_counts, cycle(&[LIGHT_BLUE, PINK], bundle.gender_counts.len())),
                ),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::aggregate::aggregate;

    #[test]
    fn test_plan_has_ten_charts_in_report_order() {
        let plan = chart_plan(&aggregate(&[]));
        let stems: Vec<&str> = plan.iter().map(|c| c.file_stem).collect();
        assert_eq!(stems.len(), 10);
        assert_eq!(stems[0], names::TOTAL_TICKET_SALES_BY_EVENT);
        assert_eq!(stems[9], names::GENDER_DISTRIBUTION);
        assert_eq!(plan[6].panels.len(), 2);
        assert!(plan.iter().all(|c| c.panels.iter().all(|p| p.data.is_empty())));
    }

    #[test]
    fn test_palettes() {
        assert_eq!(coolwarm(0), Vec::<String>::new());
        assert_eq!(coolwarm(2), vec!["#3B4CC0".to_string(), "#B40426".to_string()]);
        assert_eq!(coolwarm(7).len(), 7);
        assert_eq!(paired(13)[12], "#A6CEE3");
        assert_eq!(cycle(&BAR_CYCLE, 6)[5], ORANGE);
    }
}
