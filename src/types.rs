use serde::{Deserialize, Serialize};

/// One row of the source table exactly as loaded.
///
/// Age and price stay textual here: cleaning decides what is numeric, and
/// rows whose values cannot be coerced are dropped there rather than failing
/// the load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Event Name")]
    pub event_name: String,
    #[serde(rename = "Event Type")]
    pub event_type: String,
    #[serde(rename = "Event Organizer")]
    pub event_organizer: String,
    #[serde(rename = "Event Date")]
    pub event_date: String,
    #[serde(rename = "Attendee Name")]
    pub attendee_name: String,
    #[serde(rename = "Attendee Age")]
    pub attendee_age: Option<String>,
    #[serde(rename = "Attendee Gender")]
    pub attendee_gender: String,
    #[serde(rename = "Attendee Contact Information")]
    pub attendee_contact: Option<String>,
    #[serde(rename = "Attendee Location")]
    pub attendee_location: String,
    #[serde(rename = "Ticket ID")]
    pub ticket_id: String,
    #[serde(rename = "Ticket Type")]
    pub ticket_type: String,
    #[serde(rename = "Ticket Price")]
    pub ticket_price: Option<String>,
    /// Hours. Blank or non-numeric cells load as `None`.
    #[serde(rename = "Event Duration", deserialize_with = "csv::invalid_option")]
    pub event_duration: Option<f64>,
}

/// Binary gender code. Only the fixed vocabulary maps; everything else is
/// carried as `None` through every later stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim() {
            crate::constants::GENDER_MALE => Some(Gender::Male),
            crate::constants::GENDER_FEMALE => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => crate::constants::GENDER_MALE,
            Gender::Female => crate::constants::GENDER_FEMALE,
        }
    }
}
