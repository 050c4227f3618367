use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InsufficientDataError;
use crate::pipeline::processing::aggregate::AggregateBundle;
use crate::types::Gender;

/// Stable identifiers for every fact the engine can emit.
pub mod ids {
    pub const TOP_EVENT_BY_TICKETS: &str = "top_event_by_tickets";
    pub const TOP_EVENT_TYPE_BY_TICKETS: &str = "top_event_type_by_tickets";
    pub const MOST_POPULAR_EVENT_TYPE_SHARE: &str = "most_popular_event_type_share";
    pub const TOP_ORGANIZER_BY_TICKETS: &str = "top_organizer_by_tickets";
    pub const TICKET_PRICE_RANGE: &str = "ticket_price_range";
    pub const HIGHEST_AVG_PRICE_EVENT: &str = "highest_avg_price_event";
    pub const LONGEST_AVG_DURATION_EVENT_TYPE: &str = "longest_avg_duration_event_type";
    pub const GENDER_SPLIT: &str = "gender_split";
    pub const TOTAL_REVENUE: &str = "total_revenue";
    pub const POPULAR_EVENT_TYPE: &str = "popular_event_type";
    pub const POPULAR_EVENT_TYPE_ATTENDEES: &str = "popular_event_type_attendees";
    pub const POPULAR_EVENT_TYPE_REVENUE: &str = "popular_event_type_revenue";
    pub const POPULAR_EVENT: &str = "popular_event";
    pub const POPULAR_EVENT_ATTENDEES: &str = "popular_event_attendees";
    pub const POPULAR_EVENT_REVENUE: &str = "popular_event_revenue";
    pub const MOST_ACTIVE_MONTH: &str = "most_active_month";
    pub const TOP_ORGANIZER_FOR_EVENT_TYPE: &str = "top_organizer_for_event_type";
    pub const MOST_ACTIVE_LOCATION: &str = "most_active_location";
    pub const TOP_TICKET_TYPE: &str = "top_ticket_type";
    pub const RECOMMEND_PROMOTE_EVENT_TYPE: &str = "recommend_promote_event_type";
    pub const RECOMMEND_PARTNER_ORGANIZER: &str = "recommend_partner_organizer";
    pub const RECOMMEND_TICKET_VARIETY: &str = "recommend_ticket_variety";
    pub const RECOMMEND_TARGET_LOCATION: &str = "recommend_target_location";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    /// Paragraph text under a chart.
    Narrative,
    /// Bullet in the insights list.
    Insight,
    Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FactValue {
    Text(String),
    Count(u64),
    Number(f64),
    Percent(f64),
    Amount(f64),
}

/// One citable statistic: its identifier, the sentence quoting it, and the
/// values the sentence was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightFact {
    pub id: String,
    pub kind: FactKind,
    pub sentence: String,
    pub values: Vec<(String, FactValue)>,
}

impl InsightFact {
    fn new(id: &str, kind: FactKind, sentence: String) -> Self {
        Self {
            id: id.to_string(),
            kind,
            sentence,
            values: Vec::new(),
        }
    }

    fn with(mut self, name: &str, value: FactValue) -> Self {
        self.values.push((name.to_string(), value));
        self
    }

    pub fn value(&self, name: &str) -> Option<&FactValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.value(name)? {
            FactValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.value(name)? {
            FactValue::Count(n) => Some(*n as f64),
            FactValue::Number(v) | FactValue::Percent(v) | FactValue::Amount(v) => Some(*v),
            FactValue::Text(_) => None,
        }
    }
}

type FactResult = Result<InsightFact, InsufficientDataError>;

/// Selects superlatives from an aggregate bundle and phrases them.
#[derive(Debug, Clone)]
pub struct InsightEngine {
    currency: String,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new("LKR")
    }
}

fn text(value: &str) -> FactValue {
    FactValue::Text(value.to_string())
}

fn count(value: f64) -> FactValue {
    FactValue::Count(value.round() as u64)
}

impl InsightEngine {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    fn money(&self, amount: f64) -> String {
        format!("{} {:.2}", self.currency, amount)
    }

    /// All facts that can be computed, in report order. Facts whose data is
    /// missing are left out.
    pub fn derive(&self, bundle: &AggregateBundle) -> Vec<InsightFact> {
        let candidates: Vec<(&str, FactResult)> = vec![
            (ids::TOP_EVENT_BY_TICKETS, self.top_event_by_tickets(bundle)),
            (ids::TOP_EVENT_TYPE_BY_TICKETS, self.top_event_type_by_tickets(bundle)),
            (ids::MOST_POPULAR_EVENT_TYPE_SHARE, self.most_popular_event_type_share(bundle)),
            (ids::TOP_ORGANIZER_BY_TICKETS, self.top_organizer_by_tickets(bundle)),
            (ids::TICKET_PRICE_RANGE, self.ticket_price_range(bundle)),
            (ids::HIGHEST_AVG_PRICE_EVENT, self.highest_avg_price_event(bundle)),
            (ids::LONGEST_AVG_DURATION_EVENT_TYPE, self.longest_avg_duration(bundle)),
            (ids::GENDER_SPLIT, self.gender_split(bundle)),
            (ids::TOTAL_REVENUE, Ok(self.total_revenue(bundle))),
            (ids::POPULAR_EVENT_TYPE, self.popular_event_type(bundle)),
            (ids::POPULAR_EVENT_TYPE_ATTENDEES, self.popular_event_type_attendees(bundle)),
            (ids::POPULAR_EVENT_TYPE_REVENUE, self.popular_event_type_revenue(bundle)),
            (ids::POPULAR_EVENT, self.popular_event(bundle)),
            (ids::POPULAR_EVENT_ATTENDEES, self.popular_event_attendees(bundle)),
            (ids::POPULAR_EVENT_REVENUE, self.popular_event_revenue(bundle)),
            (ids::MOST_ACTIVE_MONTH, self.most_active_month(bundle)),
            (ids::TOP_ORGANIZER_FOR_EVENT_TYPE, self.top_organizer_for_event_type(bundle)),
            (ids::MOST_ACTIVE_LOCATION, self.most_active_location(bundle)),
            (ids::TOP_TICKET_TYPE, self.top_ticket_type(bundle)),
            (ids::RECOMMEND_PROMOTE_EVENT_TYPE, self.recommend_promote_event_type(bundle)),
            (ids::RECOMMEND_PARTNER_ORGANIZER, self.recommend_partner_organizer(bundle)),
            (ids::RECOMMEND_TICKET_VARIETY, self.recommend_ticket_variety(bundle)),
            (ids::RECOMMEND_TARGET_LOCATION, self.recommend_target_location(bundle)),
        ];

        let mut facts = Vec::with_capacity(candidates.len());
        for (id, candidate) in candidates {
            match candidate {
                Ok(fact) => facts.push(fact),
                Err(e) => {
                    debug!(insight = id, error = %e, "Omitting insight");
                    crate::observability::metrics::insights::omitted(id);
                }
            }
        }
        crate::observability::metrics::insights::emitted(facts.len());
        facts
    }

    fn top_event_by_tickets(&self, bundle: &AggregateBundle) -> FactResult {
        let (event, tickets) = bundle.tickets_by_event.argmax()?;
        Ok(InsightFact::new(
            ids::TOP_EVENT_BY_TICKETS,
            FactKind::Narrative,
            format!(
                "This bar chart depicts the total number of tickets sold for each event. The event with the highest number of tickets sold is {} with {} tickets sold, indicating its significant popularity.",
                event, tickets as u64
            ),
        )
        .with("event", text(event))
        .with("tickets", count(tickets)))
    }

    fn top_event_type_by_tickets(&self, bundle: &AggregateBundle) -> FactResult {
        let (event_type, tickets) = bundle.tickets_by_event_type.argmax()?;
        Ok(InsightFact::new(
            ids::TOP_EVENT_TYPE_BY_TICKETS,
            FactKind::Narrative,
            format!(
                "The bar chart presents the number of tickets sold for each event type. {} has the highest number of tickets sold, indicating its strong popularity among attendees.",
                event_type
            ),
        )
        .with("event_type", text(event_type))
        .with("tickets", count(tickets)))
    }

    fn most_popular_event_type_share(&self, bundle: &AggregateBundle) -> FactResult {
        let (event_type, share) = bundle.event_type_share.argmax()?;
        Ok(InsightFact::new(
            ids::MOST_POPULAR_EVENT_TYPE_SHARE,
            FactKind::Narrative,
            format!(
                "The pie chart shows the distribution of event types. {} is the most popular, accounting for {:.1}% of events.",
                event_type, share
            ),
        )
        .with("event_type", text(event_type))
        .with("percent", FactValue::Percent(share)))
    }

    fn top_organizer_by_tickets(&self, bundle: &AggregateBundle) -> FactResult {
        let (organizer, tickets) = bundle.tickets_by_organizer.argmax()?;
        Ok(InsightFact::new(
            ids::TOP_ORGANIZER_BY_TICKETS,
            FactKind::Narrative,
            format!(
                "The bar chart depicts the total number of tickets sold by each event organizer. {} has sold the highest number of tickets.",
                organizer
            ),
        )
        .with("organizer", text(organizer))
        .with("tickets", count(tickets)))
    }

    fn ticket_price_range(&self, bundle: &AggregateBundle) -> FactResult {
        let range = bundle.price_range()?;
        Ok(InsightFact::new(
            ids::TICKET_PRICE_RANGE,
            FactKind::Narrative,
            format!(
                "The histogram displays the distribution of ticket prices. The majority of tickets are priced between {} to {}. This suggests that the event organizers cater to a broad price range to attract diverse audiences.",
                self.money(range.min),
                self.money(range.max)
            ),
        )
        .with("min_price", FactValue::Amount(range.min))
        .with("max_price", FactValue::Amount(range.max)))
    }

    fn highest_avg_price_event(&self, bundle: &AggregateBundle) -> FactResult {
        let (event, price) = bundle.avg_price_by_event.argmax()?;
        Ok(InsightFact::new(
            ids::HIGHEST_AVG_PRICE_EVENT,
            FactKind::Narrative,
            format!(
                "The bar chart shows the average ticket price for each event. {} has the highest average ticket price of {}.",
                event,
                self.money(price)
            ),
        )
        .with("event", text(event))
        .with("avg_price", FactValue::Amount(price)))
    }

    fn longest_avg_duration(&self, bundle: &AggregateBundle) -> FactResult {
        let (event_type, hours) = bundle.avg_duration_by_event_type.argmax()?;
        Ok(InsightFact::new(
            ids::LONGEST_AVG_DURATION_EVENT_TYPE,
            FactKind::Narrative,
            format!(
                "The bar chart shows the average duration of events for each event type. {} has the longest average duration of {:.1} hours.",
                event_type, hours
            ),
        )
        .with("event_type", text(event_type))
        .with("hours", FactValue::Number(hours)))
    }

    /// Shares are over rows with a known gender.
    fn gender_split(&self, bundle: &AggregateBundle) -> FactResult {
        let known = bundle.gender_counts.total();
        if known == 0.0 {
            return Err(InsufficientDataError::new(&bundle.gender_counts.name));
        }
        let share = |gender: Gender| {
            bundle
                .gender_counts
                .get(&gender.label().to_string())
                .unwrap_or(0.0)
                / known
                * 100.0
        };
        let male = share(Gender::Male);
        let female = share(Gender::Female);
        Ok(InsightFact::new(
            ids::GENDER_SPLIT,
            FactKind::Narrative,
            format!(
                "The pie chart shows the overall gender distribution of attendees. {:.1}% are male, while {:.1}% are female. The stacked bar chart provides a breakdown of gender distribution across different events, allowing for a more detailed analysis of audience composition.",
                male, female
            ),
        )
        .with("male_percent", FactValue::Percent(male))
        .with("female_percent", FactValue::Percent(female))
        .with("known_gender_rows", count(known)))
    }

    fn total_revenue(&self, bundle: &AggregateBundle) -> InsightFact {
        InsightFact::new(
            ids::TOTAL_REVENUE,
            FactKind::Insight,
            format!("Total Revenue from Ticket Sales: {}", self.money(bundle.total_revenue)),
        )
        .with("revenue", FactValue::Amount(bundle.total_revenue))
    }

    fn popular_event_type(&self, bundle: &AggregateBundle) -> FactResult {
        let (event_type, _) = bundle.attendees_by_event_type.argmax()?;
        Ok(InsightFact::new(
            ids::POPULAR_EVENT_TYPE,
            FactKind::Insight,
            format!("Most Popular Event Type: {}", event_type),
        )
        .with("event_type", text(event_type)))
    }

    fn popular_event_type_attendees(&self, bundle: &AggregateBundle) -> FactResult {
        let (event_type, attendees) = bundle.attendees_by_event_type.argmax()?;
        Ok(InsightFact::new(
            ids::POPULAR_EVENT_TYPE_ATTENDEES,
            FactKind::Insight,
            format!("Total Attendees for Most Popular Event Type: {}", attendees as u64),
        )
        .with("event_type", text(event_type))
        .with("attendees", count(attendees)))
    }

    /// Revenue of the type chosen by attendee count, not the top-revenue type.
    fn popular_event_type_revenue(&self, bundle: &AggregateBundle) -> FactResult {
        let (event_type, _) = bundle.attendees_by_event_type.argmax()?;
        let revenue = bundle
            .revenue_by_event_type
            .get(event_type)
            .ok_or_else(|| InsufficientDataError::new(&bundle.revenue_by_event_type.name))?;
        Ok(InsightFact::new(
            ids::POPULAR_EVENT_TYPE_REVENUE,
            FactKind::Insight,
            format!("Total Revenue for Most Popular Event Type: {}", self.money(revenue)),
        )
        .with("event_type", text(event_type))
        .with("revenue", FactValue::Amount(revenue)))
    }

    fn popular_event(&self, bundle: &AggregateBundle) -> FactResult {
        let (event, _) = bundle.attendees_by_event.argmax()?;
        Ok(InsightFact::new(
            ids::POPULAR_EVENT,
            FactKind::Insight,
            format!("Most Popular Event: {}", event),
        )
        .with("event", text(event)))
    }

    fn popular_event_attendees(&self, bundle: &AggregateBundle) -> FactResult {
        let (event, attendees) = bundle.attendees_by_event.argmax()?;
        Ok(InsightFact::new(
            ids::POPULAR_EVENT_ATTENDEES,
            FactKind::Insight,
            format!("Total Attendees for Most Popular Event: {}", attendees as u64),
        )
        .with("event", text(event))
        .with("attendees", count(attendees)))
    }

    fn popular_event_revenue(&self, bundle: &AggregateBundle) -> FactResult {
        let (event, _) = bundle.attendees_by_event.argmax()?;
        let revenue = bundle
            .revenue_by_event
            .get(event)
            .ok_or_else(|| InsufficientDataError::new(&bundle.revenue_by_event.name))?;
        Ok(InsightFact::new(
            ids::POPULAR_EVENT_REVENUE,
            FactKind::Insight,
            format!("Total Revenue for Most Popular Event: {}", self.money(revenue)),
        )
        .with("event", text(event))
        .with("revenue", FactValue::Amount(revenue)))
    }

    fn most_active_month(&self, bundle: &AggregateBundle) -> FactResult {
        let (month, events) = bundle.events_by_month.argmax()?;
        Ok(InsightFact::new(
            ids::MOST_ACTIVE_MONTH,
            FactKind::Insight,
            format!("Most Active Month for Events: {} with {} events", month, events as u64),
        )
        .with("month", text(month))
        .with("events", count(events)))
    }

    fn top_organizer_for_event_type(&self, bundle: &AggregateBundle) -> FactResult {
        let ((organizer, event_type), events) = bundle.events_by_organizer_type.argmax()?;
        Ok(InsightFact::new(
            ids::TOP_ORGANIZER_FOR_EVENT_TYPE,
            FactKind::Insight,
            format!(
                "Event Organizer with the Most Events in the {} category: {}",
                event_type, organizer
            ),
        )
        .with("organizer", text(organizer))
        .with("event_type", text(event_type))
        .with("events", count(events)))
    }

    fn most_active_location(&self, bundle: &AggregateBundle) -> FactResult {
        let location = bundle.location_mode()?;
        Ok(InsightFact::new(
            ids::MOST_ACTIVE_LOCATION,
            FactKind::Insight,
            format!("Most Active Location for Attendees: {}", location),
        )
        .with("location", text(location)))
    }

    fn top_ticket_type(&self, bundle: &AggregateBundle) -> FactResult {
        let (ticket_type, tickets) = bundle.unique_tickets_by_ticket_type.argmax()?;
        Ok(InsightFact::new(
            ids::TOP_TICKET_TYPE,
            FactKind::Insight,
            format!(
                "Ticket Type with the Most Sold Tickets: {} with {} tickets sold",
                ticket_type, tickets as u64
            ),
        )
        .with("ticket_type", text(ticket_type))
        .with("tickets", count(tickets)))
    }

    fn recommend_promote_event_type(&self, bundle: &AggregateBundle) -> FactResult {
        let (event_type, _) = bundle.attendees_by_event_type.argmax()?;
        Ok(InsightFact::new(
            ids::RECOMMEND_PROMOTE_EVENT_TYPE,
            FactKind::Recommendation,
            format!(
                "Focus on promoting events in the {} category, as this event type has been the most popular in terms of attendees and revenue.",
                event_type
            ),
        )
        .with("event_type", text(event_type)))
    }

    fn recommend_partner_organizer(&self, bundle: &AggregateBundle) -> FactResult {
        let ((organizer, event_type), _) = bundle.events_by_organizer_type.argmax()?;
        Ok(InsightFact::new(
            ids::RECOMMEND_PARTNER_ORGANIZER,
            FactKind::Recommendation,
            format!(
                "Partner with {} to organize more events in the {} category, as they have consistently attracted a large audience.",
                organizer, event_type
            ),
        )
        .with("organizer", text(organizer))
        .with("event_type", text(event_type)))
    }

    fn recommend_ticket_variety(&self, bundle: &AggregateBundle) -> FactResult {
        let (ticket_type, _) = bundle.unique_tickets_by_ticket_type.argmax()?;
        Ok(InsightFact::new(
            ids::RECOMMEND_TICKET_VARIETY,
            FactKind::Recommendation,
            format!(
                "Consider offering different ticket types to cater to a wider range of attendee preferences. The {} ticket type has been the most popular, but diversifying options can potentially increase sales.",
                ticket_type
            ),
        )
        .with("ticket_type", text(ticket_type)))
    }

    fn recommend_target_location(&self, bundle: &AggregateBundle) -> FactResult {
        let location = bundle.location_mode()?;
        Ok(InsightFact::new(
            ids::RECOMMEND_TARGET_LOCATION,
            FactKind::Recommendation,
            format!(
                "Implement strategies to attract attendees from {}. This location has consistently yielded the most attendees, suggesting a strong potential market.",
                location
            ),
        )
        .with("location", text(location)))
    }
}

/// Derive insights with the default currency label.
pub fn derive_insights(bundle: &AggregateBundle) -> Vec<InsightFact> {
    InsightEngine::default().derive(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::aggregate::aggregate;
    use crate::pipeline::processing::clean::CleanRecord;
    use crate::pipeline::processing::enrich::enrich;
    use chrono::NaiveDate;

    fn record(event: &str, kind: &str, day: u32, price: f64, gender: Option<Gender>) -> CleanRecord {
        CleanRecord {
            event_name: event.to_string(),
            event_type: kind.to_string(),
            event_organizer: if kind == "Rock" { "OrgX" } else { "OrgY" }.to_string(),
            event_date: NaiveDate::from_ymd_opt(2024, 8, day).unwrap(),
            attendee_name: format!("attendee-{day}"),
            attendee_age: 30.0,
            gender,
            attendee_contact: "Unknown".to_string(),
            attendee_location: "Galle".to_string(),
            ticket_id: format!("T{day}"),
            ticket_type: "Early Bird".to_string(),
            ticket_price: price,
            event_duration: None,
        }
    }

    fn facts() -> Vec<InsightFact> {
        let records = enrich(&[
            record("EventA", "Rock", 1, 100.0, Some(Gender::Male)),
            record("EventA", "Rock", 2, 900.0, Some(Gender::Female)),
            record("EventB", "Jazz", 3, 50.0, None),
        ]);
        derive_insights(&aggregate(&records))
    }

    fn find<'a>(facts: &'a [InsightFact], id: &str) -> Option<&'a InsightFact> {
        facts.iter().find(|f| f.id == id)
    }

    #[test]
    fn test_top_event_fact_carries_values() {
        let facts = facts();
        let top = find(&facts, ids::TOP_EVENT_BY_TICKETS).unwrap();
        assert_eq!(top.kind, FactKind::Narrative);
        assert_eq!(top.text("event"), Some("EventA"));
        assert_eq!(top.number("tickets"), Some(2.0));
        assert!(top.sentence.contains("EventA with 2 tickets sold"));
    }

    #[test]
    fn test_gender_split_uses_known_gender_rows() {
        let facts = facts();
        let split = find(&facts, ids::GENDER_SPLIT).unwrap();
        assert_eq!(split.number("male_percent"), Some(50.0));
        assert_eq!(split.number("female_percent"), Some(50.0));
        assert_eq!(split.number("known_gender_rows"), Some(2.0));
    }

    #[test]
    fn test_popular_type_revenue_belongs_to_that_type() {
        let facts = facts();
        let revenue = find(&facts, ids::POPULAR_EVENT_TYPE_REVENUE).unwrap();
        assert_eq!(revenue.text("event_type"), Some("Rock"));
        assert_eq!(revenue.number("revenue"), Some(1000.0));
        assert_eq!(revenue.sentence, "Total Revenue for Most Popular Event Type: LKR 1000.00");
    }

    #[test]
    fn test_recommendations_reuse_selected_facts() {
        let facts = facts();
        let partner = find(&facts, ids::RECOMMEND_PARTNER_ORGANIZER).unwrap();
        assert_eq!(partner.kind, FactKind::Recommendation);
        assert_eq!(partner.text("organizer"), Some("OrgX"));
        let location = find(&facts, ids::RECOMMEND_TARGET_LOCATION).unwrap();
        assert_eq!(location.text("location"), Some("Galle"));
    }

    #[test]
    fn test_missing_durations_omit_duration_fact() {
        let facts = facts();
        assert!(find(&facts, ids::LONGEST_AVG_DURATION_EVENT_TYPE).is_none());
        assert!(find(&facts, ids::TOP_EVENT_BY_TICKETS).is_some());
    }

    #[test]
    fn test_empty_bundle_omits_everything_but_total_revenue() {
        let facts = derive_insights(&aggregate(&[]));
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].id, ids::TOTAL_REVENUE);
        assert_eq!(facts[0].number("revenue"), Some(0.0));
    }

    #[test]
    fn test_currency_label_is_configurable() {
        let records = enrich(&[record("EventA", "Rock", 1, 12.5, None)]);
        let facts = InsightEngine::new("USD").derive(&aggregate(&records));
        let total = find(&facts, ids::TOTAL_REVENUE).unwrap();
        assert_eq!(total.sentence, "Total Revenue from Ticket Sales: USD 12.50");
        assert!(find(&facts, ids::GENDER_SPLIT).is_none());
    }
}
