use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use tracing::{debug, info};

use crate::constants::REQUIRED_COLUMNS;
use crate::error::InputError;
use crate::types::RawRecord;

/// Load every row of the table at `path`.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>, InputError> {
    let file = File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_records(file)?;
    info!(path = %path.display(), rows = records.len(), "Loaded input table");
    Ok(records)
}

/// Parse records from any reader. The header row is mandatory and must name
/// every required column; extra columns are ignored.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<RawRecord>, InputError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(InputError::MissingColumns(missing));
    }

    let mut records = Vec::new();
    for row in rdr.deserialize::<RawRecord>() {
        match row {
            Ok(record) => records.push(record),
            Err(source) => {
                let line = source.position().map(|p| p.line()).unwrap_or(0);
                return Err(InputError::Malformed { line, source });
            }
        }
    }
    debug!(rows = records.len(), "Parsed raw records");
    crate::observability::metrics::loader::rows_loaded(records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Event Name,Event Type,Event Organizer,Event Date,Attendee Name,Attendee Age,Attendee Gender,Attendee Contact Information,Attendee Location,Ticket ID,Ticket Type,Ticket Price,Event Duration";

    #[test]
    fn test_reads_nullable_fields_as_none() {
        let csv = format!(
            "{HEADER}\nEventA,Rock,OrgX,2024-08-01,Ann,,Female,,Colombo,T1,VIP,,3\n"
        );
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.event_name, "EventA");
        assert_eq!(record.attendee_age, None);
        assert_eq!(record.attendee_contact, None);
        assert_eq!(record.ticket_price, None);
        assert_eq!(record.event_duration, Some(3.0));
    }

    #[test]
    fn test_keeps_uncoercible_text_for_cleaning() {
        let csv = format!(
            "{HEADER}\nEventA,Rock,OrgX,not a date,Ann,abc,Female,077,Colombo,T1,VIP,free,long\n"
        );
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records[0].attendee_age.as_deref(), Some("abc"));
        assert_eq!(records[0].ticket_price.as_deref(), Some("free"));
        assert_eq!(records[0].event_date, "not a date");
        assert_eq!(records[0].event_duration, None);
    }

    #[test]
    fn test_missing_columns_are_reported() {
        let csv = "Event Name,Event Type\nEventA,Rock\n";
        let err = read_records(csv.as_bytes()).unwrap_err();
        match err {
            InputError::MissingColumns(columns) => {
                assert_eq!(columns.len(), 11);
                assert!(columns.contains(&"Ticket Price".to_string()));
                assert!(!columns.contains(&"Event Name".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let csv = format!(
            "{HEADER},Notes\nEventA,Rock,OrgX,2024-08-01,Ann,30,Female,077,Colombo,T1,VIP,100,3,hello\n"
        );
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ticket_price.as_deref(), Some("100"));
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let csv = format!("{HEADER}\nEventA,Rock\n");
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, InputError::Malformed { .. }));
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = load_records(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, InputError::Io { .. }));
    }
}
