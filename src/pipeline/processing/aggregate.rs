use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::PRICE_HISTOGRAM_BINS;
use crate::error::InsufficientDataError;
use crate::pipeline::processing::enrich::EnrichedRecord;
use crate::pipeline::processing::stats;
use crate::types::Gender;

/// A named mapping from category to value. Entry order is part of the
/// contract: it is either descending by value (ties keep first-encountered
/// order) or plain first-encountered order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSeries<K = String> {
    pub name: String,
    pub entries: Vec<(K, f64)>,
}

impl<K: PartialEq> AggregateSeries<K> {
    fn new(name: &str, entries: Vec<(K, f64)>) -> Self {
        Self {
            name: name.to_string(),
            entries,
        }
    }

    fn descending(name: &str, mut entries: Vec<(K, f64)>) -> Self {
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        Self::new(name, entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    /// Largest value; the first entry wins a tie.
    pub fn argmax(&self) -> Result<(&K, f64), InsufficientDataError> {
        self.select(|candidate, best| candidate > best)
    }

    /// Smallest value; the first entry wins a tie.
    pub fn argmin(&self) -> Result<(&K, f64), InsufficientDataError> {
        self.select(|candidate, best| candidate < best)
    }

    fn select(&self, better: impl Fn(f64, f64) -> bool) -> Result<(&K, f64), InsufficientDataError> {
        let mut iter = self.entries.iter();
        let first = iter
            .next()
            .ok_or_else(|| InsufficientDataError::new(&self.name))?;
        let (key, value) = iter.fold((&first.0, first.1), |best, (k, v)| {
            if better(*v, best.1) {
                (k, *v)
            } else {
                best
            }
        });
        Ok((key, value))
    }
}

/// Counts for every (row, column) category pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contingency {
    pub name: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `counts[row][column]`
    pub counts: Vec<Vec<u64>>,
}

impl Contingency {
    pub fn get(&self, row: &str, column: &str) -> u64 {
        let r = self.rows.iter().position(|x| x == row);
        let c = self.columns.iter().position(|x| x == column);
        match (r, c) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    pub fn row_total(&self, row: &str) -> u64 {
        self.rows
            .iter()
            .position(|x| x == row)
            .map(|r| self.counts[r].iter().sum())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

/// Equal-width bins spanning the observed range; the last bin is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub name: String,
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    pub fn build(name: &str, values: &[f64], bin_count: usize) -> Self {
        let mut bins = Vec::new();
        if let (Some(min), Some(max)) = (
            values.iter().copied().reduce(f64::min),
            values.iter().copied().reduce(f64::max),
        ) {
            let (lo, hi) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
            let bin_count = bin_count.max(1);
            let width = (hi - lo) / bin_count as f64;
            bins = (0..bin_count)
                .map(|i| HistogramBin {
                    lower: lo + width * i as f64,
                    upper: if i + 1 == bin_count { hi } else { lo + width * (i + 1) as f64 },
                    count: 0,
                })
                .collect();
            for value in values {
                let index = (((value - lo) / width).floor() as usize).min(bin_count - 1);
                bins[index].count += 1;
            }
        }
        Self {
            name: name.to_string(),
            bins,
        }
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// Box-plot statistics with whiskers at 1.5 IQR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSummary {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = stats::sorted(values.iter().copied());
        let q1 = stats::quantile(&sorted, 0.25)?;
        let median = stats::quantile(&sorted, 0.5)?;
        let q3 = stats::quantile(&sorted, 0.75)?;
        let reach = 1.5 * (q3 - q1);
        let inside = |v: &&f64| **v >= q1 - reach && **v <= q3 + reach;
        let lower_whisker = sorted.iter().find(inside).copied().unwrap_or(q1);
        let upper_whisker = sorted.iter().rev().find(inside).copied().unwrap_or(q3);
        let outliers = sorted.iter().filter(|v| !inside(v)).copied().collect();
        Some(Self {
            q1,
            median,
            q3,
            lower_whisker,
            upper_whisker,
            outliers,
        })
    }
}

/// Attendee ages for one event type, kept whole for box plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeDistribution {
    pub event_type: String,
    pub ages: Vec<f64>,
    pub summary: BoxSummary,
}

/// Every grouped statistic the charts and insights need, computed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBundle {
    pub row_count: usize,
    pub tickets_by_event: AggregateSeries,
    pub tickets_by_event_type: AggregateSeries,
    pub tickets_by_organizer: AggregateSeries,
    /// Percentage of rows per event type.
    pub event_type_share: AggregateSeries,
    pub avg_price_by_event: AggregateSeries,
    pub price_range: Option<PriceRange>,
    pub price_histogram: Histogram,
    pub ticket_type_by_event_type: Contingency,
    pub tickets_by_ticket_type: AggregateSeries,
    pub avg_duration_by_event_type: AggregateSeries,
    pub age_by_event_type: Vec<AgeDistribution>,
    /// Rows per known gender; unmapped genders are not counted.
    pub gender_counts: AggregateSeries,
    pub gender_by_event: Contingency,
    pub attendees_by_event: AggregateSeries,
    pub attendees_by_event_type: AggregateSeries,
    pub revenue_by_event: AggregateSeries,
    pub revenue_by_event_type: AggregateSeries,
    pub total_revenue: f64,
    /// Distinct events per month label, in first-encountered order.
    pub events_by_month: AggregateSeries,
    /// Distinct events per (organizer, event type).
    pub events_by_organizer_type: AggregateSeries<(String, String)>,
    pub location_counts: AggregateSeries,
    /// Distinct ticket IDs per ticket type.
    pub unique_tickets_by_ticket_type: AggregateSeries,
}

impl AggregateBundle {
    pub fn price_range(&self) -> Result<PriceRange, InsufficientDataError> {
        self.price_range
            .ok_or_else(|| InsufficientDataError::new("price_range"))
    }

    /// Most frequent attendee location; ties go to the first encountered.
    pub fn location_mode(&self) -> Result<&str, InsufficientDataError> {
        self.location_counts.argmax().map(|(k, _)| k.as_str())
    }
}

/// Group records by `key`, folding each group's records into an accumulator.
/// Groups come back in first-encountered order.
fn group_by<'a, K, A, F, G>(records: &'a [EnrichedRecord], key: F, mut fold: G) -> Vec<(K, A)>
where
    K: Eq + Hash + Clone,
    A: Default,
    F: Fn(&'a EnrichedRecord) -> Option<K>,
    G: FnMut(&mut A, &'a EnrichedRecord),
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, A)> = Vec::new();
    for record in records {
        let Some(k) = key(record) else { continue };
        let slot = match index.get(&k) {
            Some(&slot) => slot,
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, A::default()));
                groups.len() - 1
            }
        };
        fold(&mut groups[slot].1, record);
    }
    groups
}

fn count_by<'a, K>(records: &'a [EnrichedRecord], key: impl Fn(&'a EnrichedRecord) -> Option<K>) -> Vec<(K, f64)>
where
    K: Eq + Hash + Clone,
{
    group_by(records, key, |n: &mut usize, _| *n += 1)
        .into_iter()
        .map(|(k, n)| (k, n as f64))
        .collect()
}

fn sum_by<'a>(records: &'a [EnrichedRecord], key: impl Fn(&'a EnrichedRecord) -> Option<String>, value: impl Fn(&EnrichedRecord) -> f64) -> Vec<(String, f64)> {
    group_by(records, key, |sum: &mut f64, r| *sum += value(r))
}

/// Mean of the present values per group; groups with no values are left out.
fn mean_by<'a>(
    records: &'a [EnrichedRecord],
    key: impl Fn(&'a EnrichedRecord) -> Option<String>,
    value: impl Fn(&EnrichedRecord) -> Option<f64>,
) -> Vec<(String, f64)> {
    group_by(records, key, |acc: &mut (f64, usize), r| {
        if let Some(v) = value(r) {
            acc.0 += v;
            acc.1 += 1;
        }
    })
    .into_iter()
    .filter(|(_, (_, n))| *n > 0)
    .map(|(k, (sum, n))| (k, sum / n as f64))
    .collect()
}

fn distinct_by<'a, K>(
    records: &'a [EnrichedRecord],
    key: impl Fn(&'a EnrichedRecord) -> Option<K>,
    value: impl Fn(&'a EnrichedRecord) -> &'a str,
) -> Vec<(K, f64)>
where
    K: Eq + Hash + Clone,
{
    group_by(records, key, |seen: &mut HashSet<&'a str>, r| {
        seen.insert(value(r));
    })
    .into_iter()
    .map(|(k, seen)| (k, seen.len() as f64))
    .collect()
}

fn contingency<'a>(
    name: &str,
    records: &'a [EnrichedRecord],
    row: impl Fn(&'a EnrichedRecord) -> Option<String>,
    column: impl Fn(&'a EnrichedRecord) -> Option<String>,
    fixed_columns: Option<Vec<String>>,
) -> Contingency {
    let mut rows: Vec<String> = Vec::new();
    let mut columns: Vec<String> = fixed_columns.clone().unwrap_or_default();
    let mut cells: HashMap<(usize, usize), u64> = HashMap::new();
    for record in records {
        let (Some(r), Some(c)) = (row(record), column(record)) else { continue };
        let c_index = match columns.iter().position(|x| *x == c) {
            Some(i) => i,
            None if fixed_columns.is_none() => {
                columns.push(c);
                columns.len() - 1
            }
            None => continue,
        };
        let r_index = match rows.iter().position(|x| *x == r) {
            Some(i) => i,
            None => {
                rows.push(r);
                rows.len() - 1
            }
        };
        *cells.entry((r_index, c_index)).or_insert(0) += 1;
    }
    let counts = (0..rows.len())
        .map(|r| (0..columns.len()).map(|c| cells.get(&(r, c)).copied().unwrap_or(0)).collect())
        .collect();
    Contingency {
        name: name.to_string(),
        rows,
        columns,
        counts,
    }
}

fn event(r: &EnrichedRecord) -> Option<String> {
    Some(r.record.event_name.clone())
}

fn event_type(r: &EnrichedRecord) -> Option<String> {
    Some(r.record.event_type.clone())
}

/// Compute the full bundle. Each series is derived independently from the
/// same snapshot.
pub fn aggregate(records: &[EnrichedRecord]) -> AggregateBundle {
    let row_count = records.len();

    let tickets_by_event_type = count_by(records, event_type);
    let event_type_share: Vec<(String, f64)> = tickets_by_event_type
        .iter()
        .map(|(k, n)| (k.clone(), n / row_count as f64 * 100.0))
        .collect();

    let prices: Vec<f64> = records.iter().map(|r| r.record.ticket_price).collect();
    let price_range = match (
        prices.iter().copied().reduce(f64::min),
        prices.iter().copied().reduce(f64::max),
    ) {
        (Some(min), Some(max)) => Some(PriceRange { min, max }),
        _ => None,
    };

    let age_by_event_type = group_by(records, event_type, |ages: &mut Vec<f64>, r| {
        ages.push(r.record.attendee_age)
    })
    .into_iter()
    .filter_map(|(event_type, ages)| {
        BoxSummary::from_values(&ages).map(|summary| AgeDistribution {
            event_type,
            ages,
            summary,
        })
    })
    .collect();

    let bundle = AggregateBundle {
        row_count,
        tickets_by_event: AggregateSeries::descending("tickets_by_event", count_by(records, event)),
        tickets_by_event_type: AggregateSeries::descending("tickets_by_event_type", tickets_by_event_type),
        tickets_by_organizer: AggregateSeries::descending(
            "tickets_by_organizer",
            count_by(records, |r| Some(r.record.event_organizer.clone())),
        ),
        event_type_share: AggregateSeries::descending("event_type_share", event_type_share),
        avg_price_by_event: AggregateSeries::descending(
            "avg_price_by_event",
            mean_by(records, event, |r| Some(r.record.ticket_price)),
        ),
        price_range,
        price_histogram: Histogram::build("ticket_price", &prices, PRICE_HISTOGRAM_BINS),
        ticket_type_by_event_type: contingency(
            "ticket_type_by_event_type",
            records,
            event_type,
            |r| Some(r.record.ticket_type.clone()),
            None,
        ),
        tickets_by_ticket_type: AggregateSeries::descending(
            "tickets_by_ticket_type",
            count_by(records, |r| Some(r.record.ticket_type.clone())),
        ),
        avg_duration_by_event_type: AggregateSeries::descending(
            "avg_duration_by_event_type",
            mean_by(records, event_type, |r| r.record.event_duration),
        ),
        age_by_event_type,
        gender_counts: AggregateSeries::descending(
            "gender_counts",
            count_by(records, |r| r.record.gender.map(|g| g.label().to_string())),
        ),
        gender_by_event: contingency(
            "gender_by_event",
            records,
            event,
            |r| r.record.gender.map(|g| g.label().to_string()),
            Some(vec![Gender::Male.label().to_string(), Gender::Female.label().to_string()]),
        ),
        attendees_by_event: AggregateSeries::descending(
            "attendees_by_event",
            distinct_by(records, event, |r| r.record.attendee_name.as_str()),
        ),
        attendees_by_event_type: AggregateSeries::descending(
            "attendees_by_event_type",
            distinct_by(records, event_type, |r| r.record.attendee_name.as_str()),
        ),
        revenue_by_event: AggregateSeries::descending(
            "revenue_by_event",
            sum_by(records, event, |r| r.record.ticket_price),
        ),
        revenue_by_event_type: AggregateSeries::descending(
            "revenue_by_event_type",
            sum_by(records, event_type, |r| r.record.ticket_price),
        ),
        total_revenue: prices.iter().sum(),
        events_by_month: AggregateSeries::new(
            "events_by_month",
            distinct_by(records, |r| Some(r.month_label()), |r| r.record.event_name.as_str()),
        ),
        events_by_organizer_type: AggregateSeries::descending(
            "events_by_organizer_type",
            distinct_by(
                records,
                |r| Some((r.record.event_organizer.clone(), r.record.event_type.clone())),
                |r| r.record.event_name.as_str(),
            ),
        ),
        location_counts: AggregateSeries::descending(
            "location_counts",
            count_by(records, |r| Some(r.record.attendee_location.clone())),
        ),
        unique_tickets_by_ticket_type: AggregateSeries::descending(
            "unique_tickets_by_ticket_type",
            distinct_by(
                records,
                |r| Some(r.record.ticket_type.clone()),
                |r| r.record.ticket_id.as_str(),
            ),
        ),
    };

    info!(
        rows = row_count,
        events = bundle.tickets_by_event.len(),
        event_types = bundle.tickets_by_event_type.len(),
        total_revenue = bundle.total_revenue,
        "Aggregation finished"
    );
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::clean::CleanRecord;
    use crate::pipeline::processing::enrich::enrich;
    use chrono::NaiveDate;

    fn record(event: &str, kind: &str, organizer: &str, day: (u32, u32), price: f64, gender: Option<Gender>) -> CleanRecord {
        CleanRecord {
            event_name: event.to_string(),
            event_type: kind.to_string(),
            event_organizer: organizer.to_string(),
            event_date: NaiveDate::from_ymd_opt(2024, day.0, day.1).unwrap(),
            attendee_name: format!("attendee-{}-{}", day.0, day.1),
            attendee_age: 30.0,
            gender,
            attendee_contact: "Unknown".to_string(),
            attendee_location: if day.0 == 8 { "Colombo" } else { "Kandy" }.to_string(),
            ticket_id: format!("T{}{}", day.0, day.1),
            ticket_type: "General".to_string(),
            ticket_price: price,
            event_duration: Some(if kind == "Rock" { 4.0 } else { 2.0 }),
        }
    }

    fn sample() -> Vec<EnrichedRecord> {
        enrich(&[
            record("EventA", "Rock", "OrgX", (8, 1), 100.0, Some(Gender::Male)),
            record("EventA", "Rock", "OrgX", (8, 2), 900.0, Some(Gender::Female)),
            record("EventB", "Jazz", "OrgY", (9, 1), 50.0, None),
        ])
    }

    #[test]
    fn test_ticket_counts_and_revenue() {
        let bundle = aggregate(&sample());
        assert_eq!(bundle.tickets_by_event.get(&"EventA".to_string()), Some(2.0));
        assert_eq!(bundle.tickets_by_event.get(&"EventB".to_string()), Some(1.0));
        assert_eq!(bundle.tickets_by_event.argmax().unwrap().0, "EventA");
        assert_eq!(bundle.total_revenue, 1050.0);
        assert_eq!(bundle.revenue_by_event_type.get(&"Rock".to_string()), Some(1000.0));
        assert_eq!(bundle.avg_price_by_event.entries[0], ("EventA".to_string(), 500.0));
        assert_eq!(bundle.price_range().unwrap(), PriceRange { min: 50.0, max: 900.0 });
    }

    #[test]
    fn test_gender_counts_skip_unknown() {
        let bundle = aggregate(&sample());
        assert_eq!(bundle.gender_counts.total(), 2.0);
        assert_eq!(bundle.gender_by_event.get("EventA", "Male"), 1);
        assert_eq!(bundle.gender_by_event.get("EventA", "Female"), 1);
        assert_eq!(bundle.gender_by_event.row_total("EventB"), 0);
    }

    #[test]
    fn test_ties_go_to_first_encountered_key() {
        let records = enrich(&[
            record("Zeta", "Rock", "OrgX", (8, 1), 10.0, None),
            record("Alpha", "Jazz", "OrgY", (8, 2), 10.0, None),
        ]);
        let bundle = aggregate(&records);
        assert_eq!(bundle.tickets_by_event.argmax().unwrap().0, "Zeta");
        assert_eq!(bundle.tickets_by_event.argmin().unwrap().0, "Zeta");
        assert_eq!(bundle.location_mode().unwrap(), "Colombo");
    }

    #[test]
    fn test_month_and_organizer_groupings() {
        let bundle = aggregate(&sample());
        assert_eq!(bundle.events_by_month.entries, vec![
            ("August".to_string(), 1.0),
            ("September".to_string(), 1.0),
        ]);
        let (pair, count) = bundle.events_by_organizer_type.argmax().unwrap();
        assert_eq!(pair, &("OrgX".to_string(), "Rock".to_string()));
        assert_eq!(count, 1.0);
    }

    #[test]
    fn test_event_type_share_is_percentage_of_rows() {
        let bundle = aggregate(&sample());
        let share = bundle.event_type_share.get(&"Rock".to_string()).unwrap();
        assert!((share - 200.0 / 3.0).abs() < 1e-9);
        assert!((bundle.event_type_share.total() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_and_distinct_counts() {
        let bundle = aggregate(&sample());
        assert_eq!(bundle.avg_duration_by_event_type.entries[0], ("Rock".to_string(), 4.0));
        assert_eq!(bundle.attendees_by_event.get(&"EventA".to_string()), Some(2.0));
        assert_eq!(bundle.unique_tickets_by_ticket_type.get(&"General".to_string()), Some(3.0));
        assert_eq!(bundle.ticket_type_by_event_type.get("Rock", "General"), 2);
    }

    #[test]
    fn test_empty_input_reductions_fail() {
        let bundle = aggregate(&[]);
        assert_eq!(bundle.row_count, 0);
        assert_eq!(bundle.total_revenue, 0.0);
        assert!(bundle.tickets_by_event.argmax().is_err());
        assert!(bundle.price_range().is_err());
        assert!(bundle.location_mode().is_err());
        assert!(bundle.price_histogram.bins.is_empty());
        assert!(bundle.age_by_event_type.is_empty());
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let records = sample();
        assert_eq!(aggregate(&records), aggregate(&records));
    }

    #[test]
    fn test_histogram_covers_every_value() {
        let histogram = Histogram::build("p", &[1.0, 2.0, 3.0, 10.0], 20);
        assert_eq!(histogram.bins.len(), 20);
        assert_eq!(histogram.total(), 4);
        assert_eq!(histogram.bins[19].count, 1);

        let flat = Histogram::build("p", &[5.0, 5.0], 4);
        assert_eq!(flat.total(), 2);
        assert_eq!(flat.bins[0].lower, 4.5);
    }

    #[test]
    fn test_box_summary_flags_outliers() {
        let summary = BoxSummary::from_values(&[20.0, 21.0, 22.0, 23.0, 24.0, 90.0]).unwrap();
        assert_eq!(summary.outliers, vec![90.0]);
        assert_eq!(summary.upper_whisker, 24.0);
        assert_eq!(summary.lower_whisker, 20.0);
    }
}
