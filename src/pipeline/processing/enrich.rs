use std::collections::BTreeSet;
use std::fmt;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::constants::MONTH_NAMES;
use crate::pipeline::processing::clean::CleanRecord;

/// Fixed attendee age bands. Bin edges are [0, 18, 30, 50, 70, 100]; each
/// bin is closed on the right and the lowest one also includes 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "<18")]
    Under18,
    #[serde(rename = "18-30")]
    From18To30,
    #[serde(rename = "30-50")]
    From30To50,
    #[serde(rename = "50-70")]
    From50To70,
    #[serde(rename = "70+")]
    Over70,
}

impl AgeGroup {
    pub fn from_age(age: f64) -> Self {
        match age {
            a if a <= 18.0 => AgeGroup::Under18,
            a if a <= 30.0 => AgeGroup::From18To30,
            a if a <= 50.0 => AgeGroup::From30To50,
            a if a <= 70.0 => AgeGroup::From50To70,
            _ => AgeGroup::Over70,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgeGroup::Under18 => "<18",
            AgeGroup::From18To30 => "18-30",
            AgeGroup::From30To50 => "30-50",
            AgeGroup::From50To70 => "50-70",
            AgeGroup::Over70 => "70+",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A clean record plus the columns derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub record: CleanRecord,
    pub event_year: i32,
    pub event_month: u32,
    pub age_group: AgeGroup,
}

impl EnrichedRecord {
    /// Label used when grouping activity by month.
    pub fn month_label(&self) -> String {
        month_label(self.event_month)
    }
}

/// Month name for the months in the fixed vocabulary, the bare month number
/// otherwise.
pub fn month_label(month: u32) -> String {
    MONTH_NAMES
        .iter()
        .find(|(number, _)| *number == month)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| month.to_string())
}

/// Derives computed columns for clean records.
pub trait Enricher {
    fn enrich(&self, record: &CleanRecord) -> EnrichedRecord;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEnricher;

impl DefaultEnricher {
    pub fn new() -> Self {
        Self
    }
}

impl Enricher for DefaultEnricher {
    fn enrich(&self, record: &CleanRecord) -> EnrichedRecord {
        EnrichedRecord {
            event_year: record.event_date.year(),
            event_month: record.event_date.month(),
            age_group: AgeGroup::from_age(record.attendee_age),
            record: record.clone(),
        }
    }
}

pub fn enrich(records: &[CleanRecord]) -> Vec<EnrichedRecord> {
    let enricher = DefaultEnricher::new();
    records.iter().map(|r| enricher.enrich(r)).collect()
}

/// Categorical columns that can be one-hot encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalColumn {
    EventType,
    TicketType,
}

impl CategoricalColumn {
    pub fn name(self) -> &'static str {
        match self {
            CategoricalColumn::EventType => crate::constants::EVENT_TYPE,
            CategoricalColumn::TicketType => crate::constants::TICKET_TYPE,
        }
    }

    fn value(self, record: &EnrichedRecord) -> &str {
        match self {
            CategoricalColumn::EventType => &record.record.event_type,
            CategoricalColumn::TicketType => &record.record.ticket_type,
        }
    }
}

/// Indicator columns for one categorical field, one row per record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneHotEncoding {
    pub column: String,
    /// Names of the indicator columns, `"<column>_<category>"`.
    pub indicators: Vec<String>,
    pub rows: Vec<Vec<u8>>,
}

/// One-hot encode `column`. Categories are sorted; with `drop_first` the
/// first category has no indicator and is encoded as all zeros.
pub fn one_hot(records: &[EnrichedRecord], column: CategoricalColumn, drop_first: bool) -> OneHotEncoding {
    let categories: Vec<&str> = records
        .iter()
        .map(|r| column.value(r))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .skip(usize::from(drop_first))
        .collect();

    let rows = records
        .iter()
        .map(|r| {
            let value = column.value(r);
            categories.iter().map(|c| u8::from(*c == value)).collect()
        })
        .collect();

    OneHotEncoding {
        column: column.name().to_string(),
        indicators: categories
            .iter()
            .map(|c| format!("{}_{}", column.name(), c))
            .collect(),
        rows,
    }
}
