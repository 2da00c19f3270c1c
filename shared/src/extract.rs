//! Field extraction from Monday.com event envelopes.
//!
//! The envelope has changed shape over time, so every field is looked up
//! through an ordered list of JSON pointers and the first usable value wins.
//! Assigned people are found the same way, with one named strategy per
//! known payload shape.

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::debug;

use crate::{Error, Result};

/// Summary used when the item has no name.
pub const DEFAULT_EVENT_NAME: &str = "Monday.com Event";
/// Time of day used when the date column carries no time.
pub const DEFAULT_EVENT_TIME: &str = "12:00:00";

const NAME_POINTERS: &[&str] = &["/pulseName"];
const DATE_POINTERS: &[&str] = &["/value/date", "/column_values/date"];
const TIME_POINTERS: &[&str] = &["/value/time", "/column_values/time"];
const LOCATION_POINTERS: &[&str] = &["/value/location", "/value/address"];

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// A person assigned to the item, as found in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonRef {
    /// Monday.com user id; needs resolving
    Id(String),
    /// Email given directly in the payload
    Email(String),
}

/// Strategy for one payload shape. `None` means the shape is absent.
pub type PersonStrategy = fn(&Value) -> Option<Vec<PersonRef>>;

/// Person-list shapes, tried in order.
pub const PERSON_STRATEGIES: &[(&str, PersonStrategy)] = &[
    ("value.personsAndTeams", persons_and_teams),
    ("value.persons", value_persons),
    ("column_values.person", column_values_person),
];

/// Everything the handler needs from one event envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEvent {
    pub name: String,
    pub start: NaiveDateTime,
    pub persons: Vec<PersonRef>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// Extract the calendar-relevant fields from the `event` object of a notification.
///
/// Fails only when the date is missing or the date/time cannot be read.
pub fn extract_event(event: &Value) -> Result<ExtractedEvent> {
    let name = first_string(event, NAME_POINTERS).unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string());

    let date = first_string(event, DATE_POINTERS)
        .ok_or_else(|| Error::Validation("Missing date in event value".to_string()))?;

    let time = first_string(event, TIME_POINTERS).unwrap_or_else(|| DEFAULT_EVENT_TIME.to_string());

    let start = parse_start(&date, &time)?;

    Ok(ExtractedEvent {
        name,
        start,
        persons: extract_persons(event),
        location: first_string(event, LOCATION_POINTERS),
        description: describe_item(event),
    })
}

/// Combine a date and a time of day into a local timestamp (no zone).
pub fn parse_start(date: &str, time: &str) -> Result<NaiveDateTime> {
    let timestamp = format!("{}T{}", date, time);

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&timestamp, format).ok())
        .ok_or_else(|| Error::Validation(format!("Invalid date/time '{}'", timestamp)))
}

/// Run the person strategies in order; the first shape present wins.
pub fn extract_persons(event: &Value) -> Vec<PersonRef> {
    for (name, strategy) in PERSON_STRATEGIES {
        if let Some(persons) = strategy(event) {
            debug!("Assigned persons found via {} ({} entries)", name, persons.len());
            return persons;
        }
    }
    Vec::new()
}

fn persons_and_teams(event: &Value) -> Option<Vec<PersonRef>> {
    let entries = event.pointer("/value/personsAndTeams")?.as_array()?;
    Some(
        entries
            .iter()
            .filter(|entry| entry.get("kind").and_then(Value::as_str) != Some("team"))
            .filter_map(person_ref)
            .collect(),
    )
}

fn value_persons(event: &Value) -> Option<Vec<PersonRef>> {
    let entries = event.pointer("/value/persons")?.as_array()?;
    Some(entries.iter().filter_map(person_ref).collect())
}

fn column_values_person(event: &Value) -> Option<Vec<PersonRef>> {
    let entries = event.pointer("/column_values/person")?.as_array()?;
    Some(entries.iter().filter_map(person_ref).collect())
}

/// An entry with an email is used as-is; otherwise its id must be resolved.
fn person_ref(entry: &Value) -> Option<PersonRef> {
    if let Some(email) = non_blank(entry.get("email")) {
        return Some(PersonRef::Email(email));
    }
    non_blank(entry.get("id")).map(PersonRef::Id)
}

fn describe_item(event: &Value) -> Option<String> {
    let pulse_id = non_blank(event.get("pulseId"))?;
    Some(match non_blank(event.get("boardId")) {
        Some(board_id) => format!("Created from Monday.com item {} on board {}", pulse_id, board_id),
        None => format!("Created from Monday.com item {}", pulse_id),
    })
}

fn first_string(event: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .find_map(|pointer| non_blank(event.pointer(pointer)))
}

/// Strings are trimmed; numbers are rendered (Monday.com ids come as both).
fn non_blank(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
