/// Column headers the input table must carry, in their canonical order.
pub const EVENT_NAME: &str = "Event Name";
pub const EVENT_TYPE: &str = "Event Type";
pub const EVENT_ORGANIZER: &str = "Event Organizer";
pub const EVENT_DATE: &str = "Event Date";
pub const ATTENDEE_NAME: &str = "Attendee Name";
pub const ATTENDEE_AGE: &str = "Attendee Age";
pub const ATTENDEE_GENDER: &str = "Attendee Gender";
pub const ATTENDEE_CONTACT: &str = "Attendee Contact Information";
pub const ATTENDEE_LOCATION: &str = "Attendee Location";
pub const TICKET_ID: &str = "Ticket ID";
pub const TICKET_TYPE: &str = "Ticket Type";
pub const TICKET_PRICE: &str = "Ticket Price";
pub const EVENT_DURATION: &str = "Event Duration";

pub const REQUIRED_COLUMNS: [&str; 13] = [
    EVENT_NAME,
    EVENT_TYPE,
    EVENT_ORGANIZER,
    EVENT_DATE,
    ATTENDEE_NAME,
    ATTENDEE_AGE,
    ATTENDEE_GENDER,
    ATTENDEE_CONTACT,
    ATTENDEE_LOCATION,
    TICKET_ID,
    TICKET_TYPE,
    TICKET_PRICE,
    EVENT_DURATION,
];

/// Gender vocabulary; anything else maps to an absent code.
pub const GENDER_MALE: &str = "Male";
pub const GENDER_FEMALE: &str = "Female";

/// Month numbers with a name in the monthly-activity grouping. Other months
/// keep their numeric label.
pub const MONTH_NAMES: [(u32, &str); 2] = [(8, "August"), (9, "September")];

/// Date layouts accepted for `Event Date`, tried in order.
pub const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y"];
pub const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

pub const PRICE_HISTOGRAM_BINS: usize = 20;

pub const REPORT_DIR: &str = "report";
pub const CHARTS_DIR: &str = "charts";
pub const REPORT_FILE: &str = "event_data_analysis_report.md";
pub const INSIGHTS_FILE: &str = "insights.json";
