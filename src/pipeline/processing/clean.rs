use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{DATETIME_FORMATS, DATE_FORMATS};
use crate::error::CleaningError;
use crate::pipeline::processing::stats;
use crate::types::{Gender, RawRecord};

/// A row that survived cleaning. Every field is typed and present except
/// `gender` (unmapped text) and `event_duration` (blank in the source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub event_name: String,
    pub event_type: String,
    pub event_organizer: String,
    pub event_date: NaiveDate,
    pub attendee_name: String,
    /// Within the configured age bounds.
    pub attendee_age: f64,
    pub gender: Option<Gender>,
    pub attendee_contact: String,
    pub attendee_location: String,
    pub ticket_id: String,
    pub ticket_type: String,
    /// Inside the IQR fence computed when the row was filtered.
    pub ticket_price: f64,
    pub event_duration: Option<f64>,
}

impl From<&CleanRecord> for RawRecord {
    fn from(record: &CleanRecord) -> Self {
        RawRecord {
            event_name: record.event_name.clone(),
            event_type: record.event_type.clone(),
            event_organizer: record.event_organizer.clone(),
            event_date: record.event_date.format("%Y-%m-%d").to_string(),
            attendee_name: record.attendee_name.clone(),
            attendee_age: Some(record.attendee_age.to_string()),
            attendee_gender: record.gender.map(Gender::label).unwrap_or_default().to_string(),
            attendee_contact: Some(record.attendee_contact.clone()),
            attendee_location: record.attendee_location.clone(),
            ticket_id: record.ticket_id.clone(),
            ticket_type: record.ticket_type.clone(),
            ticket_price: Some(record.ticket_price.to_string()),
            event_duration: record.event_duration,
        }
    }
}

/// Tunables for the cleaning stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningSettings {
    pub min_age: f64,
    pub max_age: f64,
    /// IQR multiplier for the ticket price fence.
    pub fence_multiplier: f64,
    /// Below this many rows the price fence is not applied.
    pub min_fence_sample: usize,
    pub contact_sentinel: String,
}

impl Default for CleaningSettings {
    fn default() -> Self {
        Self {
            min_age: 18.0,
            max_age: 100.0,
            fence_multiplier: 1.5,
            min_fence_sample: 4,
            contact_sentinel: "Unknown".to_string(),
        }
    }
}

impl CleaningSettings {
    pub fn validate(&self) -> Result<(), CleaningError> {
        if !self.fence_multiplier.is_finite() || self.fence_multiplier < 0.0 {
            return Err(CleaningError::InvalidSettings(format!(
                "fence multiplier must be a non-negative number, got {}",
                self.fence_multiplier
            )));
        }
        if !self.min_age.is_finite() || !self.max_age.is_finite() || self.min_age > self.max_age {
            return Err(CleaningError::InvalidSettings(format!(
                "age bounds [{}, {}] are not a valid range",
                self.min_age, self.max_age
            )));
        }
        Ok(())
    }
}

/// Ticket price bounds used by the outlier filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceFence {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl PriceFence {
    /// `None` when there are fewer than `min_sample` prices.
    pub fn compute(prices: &[f64], multiplier: f64, min_sample: usize) -> Option<Self> {
        if prices.is_empty() || prices.len() < min_sample {
            return None;
        }
        let sorted = stats::sorted(prices.iter().copied());
        let q1 = stats::quantile(&sorted, 0.25)?;
        let q3 = stats::quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            iqr,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.lower && price <= self.upper
    }
}

/// Row counts for one cleaning run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningSummary {
    pub rows_in: usize,
    pub ages_filled: usize,
    pub age_fill_value: Option<f64>,
    pub contacts_filled: usize,
    pub invalid_dates: usize,
    pub invalid_numbers: usize,
    pub duplicates: usize,
    pub price_outliers: usize,
    pub ages_clamped: usize,
    pub price_fence: Option<PriceFence>,
    pub rows_out: usize,
}

#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub records: Vec<CleanRecord>,
    pub summary: CleaningSummary,
}

/// Turns raw rows into clean rows.
pub trait Cleaner {
    fn clean(&self, records: &[RawRecord]) -> CleaningOutcome;
}

/// Fill, coerce, deduplicate, filter and clamp, in that order.
#[derive(Debug, Clone, Default)]
pub struct DefaultCleaner {
    settings: CleaningSettings,
}

/// Intermediate row between coercion and filtering.
#[derive(Debug, Clone)]
struct StagedRow {
    event_name: String,
    event_type: String,
    event_organizer: String,
    event_date: Option<NaiveDate>,
    attendee_name: String,
    attendee_age: Option<f64>,
    attendee_gender: String,
    gender: Option<Gender>,
    attendee_contact: String,
    attendee_location: String,
    ticket_id: String,
    ticket_type: String,
    ticket_price: Option<f64>,
    event_duration: Option<f64>,
    invalid_date: bool,
    invalid_number: bool,
}

/// Full-field identity. Floats compare by bit pattern.
#[derive(PartialEq, Eq, Hash)]
struct RowKey {
    text: [String; 9],
    event_date: Option<NaiveDate>,
    attendee_age: Option<u64>,
    ticket_price: Option<u64>,
    event_duration: Option<u64>,
}

impl StagedRow {
    fn key(&self) -> RowKey {
        RowKey {
            text: [
                self.event_name.clone(),
                self.event_type.clone(),
                self.event_organizer.clone(),
                self.attendee_name.clone(),
                self.attendee_gender.clone(),
                self.attendee_contact.clone(),
                self.attendee_location.clone(),
                self.ticket_id.clone(),
                self.ticket_type.clone(),
            ],
            event_date: self.event_date,
            attendee_age: self.attendee_age.map(f64::to_bits),
            ticket_price: self.ticket_price.map(f64::to_bits),
            event_duration: self.event_duration.map(f64::to_bits),
        }
    }

    fn into_clean(self) -> Option<CleanRecord> {
        Some(CleanRecord {
            event_name: self.event_name,
            event_type: self.event_type,
            event_organizer: self.event_organizer,
            event_date: self.event_date?,
            attendee_name: self.attendee_name,
            attendee_age: self.attendee_age?,
            gender: self.gender,
            attendee_contact: self.attendee_contact,
            attendee_location: self.attendee_location,
            ticket_id: self.ticket_id,
            ticket_type: self.ticket_type,
            ticket_price: self.ticket_price?,
            event_duration: self.event_duration,
        })
    }
}

impl CleanRecord {
    fn key(&self) -> RowKey {
        RowKey {
            text: [
                self.event_name.clone(),
                self.event_type.clone(),
                self.event_organizer.clone(),
                self.attendee_name.clone(),
                self.gender.map(Gender::label).unwrap_or_default().to_string(),
                self.attendee_contact.clone(),
                self.attendee_location.clone(),
                self.ticket_id.clone(),
                self.ticket_type.clone(),
            ],
            event_date: Some(self.event_date),
            attendee_age: Some(self.attendee_age.to_bits()),
            ticket_price: Some(self.ticket_price.to_bits()),
            event_duration: self.event_duration.map(f64::to_bits),
        }
    }
}

/// Parse a date cell, accepting plain dates and date-times.
pub fn parse_event_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Parse a numeric cell. Non-finite values count as unparseable.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl DefaultCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: CleaningSettings) -> Result<Self, CleaningError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// Mean of the ages that are present and numeric, before any filling.
    fn age_fill_value(records: &[RawRecord]) -> Option<f64> {
        let ages: Vec<f64> = records
            .iter()
            .filter_map(|r| r.attendee_age.as_deref().and_then(parse_number))
            .collect();
        stats::mean(&ages)
    }

    fn stage(&self, record: &RawRecord, age_fill: Option<f64>, summary: &mut CleaningSummary) -> StagedRow {
        let attendee_age = match record.attendee_age.as_deref() {
            Some(text) => parse_number(text),
            None => {
                if age_fill.is_some() {
                    summary.ages_filled += 1;
                }
                age_fill
            }
        };
        let attendee_contact = match &record.attendee_contact {
            Some(contact) => contact.clone(),
            None => {
                summary.contacts_filled += 1;
                self.settings.contact_sentinel.clone()
            }
        };
        let event_date = parse_event_date(&record.event_date);
        let ticket_price = record.ticket_price.as_deref().and_then(parse_number);

        StagedRow {
            event_name: record.event_name.clone(),
            event_type: record.event_type.clone(),
            event_organizer: record.event_organizer.clone(),
            invalid_date: event_date.is_none(),
            event_date,
            attendee_name: record.attendee_name.clone(),
            invalid_number: attendee_age.is_none() || ticket_price.is_none(),
            attendee_age,
            attendee_gender: record.attendee_gender.clone(),
            gender: None,
            attendee_contact,
            attendee_location: record.attendee_location.clone(),
            ticket_id: record.ticket_id.clone(),
            ticket_type: record.ticket_type.clone(),
            ticket_price,
            event_duration: record.event_duration,
        }
    }

    /// Drop rows outside the IQR fence of the surviving prices. The fence is
    /// computed once; applying it again to the result removes nothing.
    fn filter_price_outliers(&self, mut rows: Vec<CleanRecord>, summary: &mut CleaningSummary) -> Vec<CleanRecord> {
        let prices: Vec<f64> = rows.iter().map(|r| r.ticket_price).collect();
        let Some(fence) = PriceFence::compute(
            &prices,
            self.settings.fence_multiplier,
            self.settings.min_fence_sample,
        ) else {
            return rows;
        };
        summary.price_fence = Some(fence);
        let before = rows.len();
        rows.retain(|r| fence.contains(r.ticket_price));
        let removed = before - rows.len();
        if removed > 0 {
            debug!(removed, lower = fence.lower, upper = fence.upper, "Dropped ticket price outliers");
        }
        summary.price_outliers = removed;
        rows
    }
}

impl Cleaner for DefaultCleaner {
    fn clean(&self, records: &[RawRecord]) -> CleaningOutcome {
        let mut summary = CleaningSummary {
            rows_in: records.len(),
            ..Default::default()
        };

        // 1-4: fill, parse, coerce; bad rows are only marked here
        let age_fill = Self::age_fill_value(records);
        summary.age_fill_value = age_fill;
        let mut staged: Vec<StagedRow> = records
            .iter()
            .map(|r| self.stage(r, age_fill, &mut summary))
            .collect();

        // 5: exact duplicates, first occurrence wins
        let before = staged.len();
        let mut seen = HashSet::new();
        staged.retain(|row| seen.insert(row.key()));
        summary.duplicates = before - staged.len();

        // 6: gender code
        for row in &mut staged {
            row.gender = Gender::from_text(&row.attendee_gender);
        }

        // 7: drop marked rows
        let mut rows = Vec::with_capacity(staged.len());
        for row in staged {
            if row.invalid_date {
                summary.invalid_dates += 1;
            } else if row.invalid_number {
                summary.invalid_numbers += 1;
            } else if let Some(clean) = row.into_clean() {
                rows.push(clean);
            }
        }

        // 8-9: price fence, then clamp ages
        rows = self.filter_price_outliers(rows, &mut summary);
        for row in &mut rows {
            let clamped = row.attendee_age.clamp(self.settings.min_age, self.settings.max_age);
            if clamped != row.attendee_age {
                summary.ages_clamped += 1;
                row.attendee_age = clamped;
            }
        }

        // Clamping and gender mapping can make distinct rows identical.
        let before = rows.len();
        let mut seen = HashSet::new();
        rows.retain(|row| seen.insert(row.key()));
        summary.duplicates += before - rows.len();

        rows.sort_by_key(|r| r.event_date);
        summary.rows_out = rows.len();

        info!(
            rows_in = summary.rows_in,
            rows_out = summary.rows_out,
            invalid_dates = summary.invalid_dates,
            invalid_numbers = summary.invalid_numbers,
            duplicates = summary.duplicates,
            price_outliers = summary.price_outliers,
            "Cleaning finished"
        );
        let dropped = summary.rows_in - summary.rows_out;
        if dropped > 0 {
            warn!(
                dropped,
                rows_in = summary.rows_in,
                "Rows dropped during cleaning"
            );
        }
        crate::observability::metrics::cleaning::summary_recorded(&summary);

        CleaningOutcome {
            records: rows,
            summary,
        }
    }
}

/// Clean with default settings.
pub fn clean(records: &[RawRecord]) -> Vec<CleanRecord> {
    DefaultCleaner::new().clean(records).records
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn raw(
        event: &str,
        date: &str,
        age: Option<&str>,
        gender: &str,
        price: Option<&str>,
    ) -> RawRecord {
        RawRecord {
            event_name: event.to_string(),
            event_type: "Rock".to_string(),
            event_organizer: "OrgX".to_string(),
            event_date: date.to_string(),
            attendee_name: format!("{event}-{date}-{gender}"),
            attendee_age: age.map(str::to_string),
            attendee_gender: gender.to_string(),
            attendee_contact: Some("0771234567".to_string()),
            attendee_location: "Colombo".to_string(),
            ticket_id: format!("T-{event}-{date}"),
            ticket_type: "VIP".to_string(),
            ticket_price: price.map(str::to_string),
            event_duration: Some(3.0),
        }
    }

    fn scenario() -> Vec<RawRecord> {
        vec![
            raw("EventA", "2024-08-01", Some("25"), "Male", Some("100")),
            raw("EventA", "2024-08-02", Some("30"), "Female", Some("900")),
            raw("EventB", "2024-09-01", None, "Male", Some("50")),
        ]
    }

    #[test]
    fn test_missing_age_filled_with_mean_of_present_ages() {
        let outcome = DefaultCleaner::new().clean(&scenario());
        assert_eq!(outcome.summary.age_fill_value, Some(27.5));
        assert_eq!(outcome.summary.ages_filled, 1);
        let event_b = outcome.records.iter().find(|r| r.event_name == "EventB").unwrap();
        assert_eq!(event_b.attendee_age, 27.5);
    }

    #[test]
    fn test_small_sample_skips_price_fence() {
        let outcome = DefaultCleaner::new().clean(&scenario());
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.summary.price_fence, None);
        assert_eq!(outcome.summary.price_outliers, 0);
    }

    #[test]
    fn test_missing_contact_gets_sentinel() {
        let mut records = scenario();
        records[0].attendee_contact = None;
        let cleaned = clean(&records);
        assert_eq!(cleaned[0].attendee_contact, "Unknown");
    }

    #[test]
    fn test_duplicate_row_is_dropped() {
        let mut records = scenario();
        records.push(records[0].clone());
        let outcome = DefaultCleaner::new().clean(&records);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.summary.duplicates, 1);
    }

    #[test]
    fn test_unparseable_date_drops_exactly_one_row() {
        let mut records = scenario();
        records.push(raw("EventC", "someday", Some("40"), "Male", Some("75")));
        let outcome = DefaultCleaner::new().clean(&records);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.summary.invalid_dates, 1);
        assert!(outcome.records.iter().all(|r| r.event_name != "EventC"));
    }

    #[test]
    fn test_uncoercible_price_and_age_are_dropped() {
        let mut records = scenario();
        records.push(raw("EventC", "2024-08-03", Some("forty"), "Male", Some("75")));
        records.push(raw("EventD", "2024-08-04", Some("40"), "Male", Some("free")));
        records.push(raw("EventE", "2024-08-05", Some("40"), "Male", None));
        let outcome = DefaultCleaner::new().clean(&records);
        assert_eq!(outcome.summary.invalid_numbers, 3);
        assert_eq!(outcome.records.len(), 3);
    }

    #[test]
    fn test_unmapped_gender_is_absent() {
        let mut records = scenario();
        records[0].attendee_gender = "Non-binary".to_string();
        let cleaned = clean(&records);
        let first = cleaned.iter().find(|r| r.event_date == NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()).unwrap();
        assert_eq!(first.gender, None);
        assert_eq!(cleaned[1].gender, Some(Gender::Female));
    }

    #[test]
    fn test_price_outlier_is_dropped() {
        let mut records: Vec<RawRecord> = (1..=8)
            .map(|day| {
                let date = format!("2024-08-{day:02}");
                let price = (100 + day).to_string();
                raw("EventA", &date, Some("30"), "Male", Some(price.as_str()))
            })
            .collect();
        records.push(raw("EventA", "2024-08-20", Some("30"), "Male", Some("5000")));
        let outcome = DefaultCleaner::new().clean(&records);
        assert_eq!(outcome.summary.price_outliers, 1);
        assert!(outcome.records.iter().all(|r| r.ticket_price < 5000.0));
        let fence = outcome.summary.price_fence.unwrap();
        assert!(outcome.records.iter().all(|r| fence.contains(r.ticket_price)));
    }

    #[test]
    fn test_price_fence_is_applied_once() {
        let start = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        let prices: Vec<f64> = (0..40).map(|i| (100.0 * 1.12f64.powi(i)).round()).collect();
        let records: Vec<RawRecord> = prices
            .iter()
            .enumerate()
            .map(|(i, price)| {
                let date = (start + chrono::Duration::days(i as i64)).format("%Y-%m-%d").to_string();
                raw("EventA", &date, Some("30"), "Male", Some(price.to_string().as_str()))
            })
            .collect();

        let fence = PriceFence::compute(&prices, 1.5, 4).unwrap();
        let kept: Vec<f64> = prices.iter().copied().filter(|p| fence.contains(*p)).collect();
        assert_eq!(kept.len(), 37);
        // A fence recomputed on the kept prices would trim the tail again.
        let refence = PriceFence::compute(&kept, 1.5, 4).unwrap();
        assert!(kept.iter().any(|p| !refence.contains(*p)));

        let outcome = DefaultCleaner::new().clean(&records);
        assert_eq!(outcome.records.len(), 37);
        assert_eq!(outcome.summary.price_outliers, 3);
        assert_eq!(outcome.summary.price_fence, Some(fence));
    }

    #[test]
    fn test_ages_clamped_after_filtering() {
        let records = vec![
            raw("EventA", "2024-08-01", Some("12"), "Male", Some("100")),
            raw("EventA", "2024-08-02", Some("130"), "Female", Some("110")),
        ];
        let outcome = DefaultCleaner::new().clean(&records);
        assert_eq!(outcome.records[0].attendee_age, 18.0);
        assert_eq!(outcome.records[1].attendee_age, 100.0);
        assert_eq!(outcome.summary.ages_clamped, 2);
    }

    #[test]
    fn test_output_sorted_by_event_date() {
        let records = vec![
            raw("EventB", "2024-09-01", Some("40"), "Male", Some("50")),
            raw("EventA", "08/01/2024", Some("25"), "Male", Some("100")),
        ];
        let cleaned = clean(&records);
        assert_eq!(cleaned[0].event_name, "EventA");
        assert_eq!(cleaned[0].event_date, NaiveDate::from_ymd_opt(2024, 8, 1).unwrap());
    }

    #[test]
    fn test_all_rows_dropped_yields_empty_set() {
        let records = vec![raw("EventA", "never", Some("25"), "Male", Some("100"))];
        let outcome = DefaultCleaner::new().clean(&records);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.summary.rows_out, 0);
        assert!(clean(&[]).is_empty());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = CleaningSettings {
            min_age: 50.0,
            max_age: 20.0,
            ..Default::default()
        };
        assert!(matches!(
            DefaultCleaner::with_settings(settings),
            Err(CleaningError::InvalidSettings(_))
        ));
        let settings = CleaningSettings {
            fence_multiplier: f64::NAN,
            ..Default::default()
        };
        assert!(DefaultCleaner::with_settings(settings).is_err());
    }

    #[test]
    fn test_parse_event_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 8, 1);
        assert_eq!(parse_event_date("2024-08-01"), expected);
        assert_eq!(parse_event_date("2024/08/01"), expected);
        assert_eq!(parse_event_date("08/01/2024"), expected);
        assert_eq!(parse_event_date("2024-08-01 19:30:00"), expected);
        assert_eq!(parse_event_date("2024-13-01"), None);
    }

    #[test]
    fn test_parse_number_rejects_non_finite() {
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }
}
