//! Google Calendar event building and submission.

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Config, SendUpdates};
use crate::google_auth::GoogleAuth;
use crate::{Error, Result};

/// Every event lasts exactly this long.
pub const EVENT_DURATION_HOURS: i64 = 1;

const EVENT_TIME_ZONE: &str = "UTC";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A normalized event ready to be mapped onto the Calendar schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub summary: String,
    /// Start time, interpreted as UTC
    pub start: NaiveDateTime,
    pub attendees: Vec<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// Google Calendar `events.insert` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventRequest {
    pub summary: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub attendees: Vec<EventAttendee>,
    pub reminders: Reminders,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    pub time_zone: String,
}

impl EventDateTime {
    fn utc(at: NaiveDateTime) -> Self {
        Self {
            date_time: at.format(TIMESTAMP_FORMAT).to_string(),
            time_zone: EVENT_TIME_ZONE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventAttendee {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
}

impl CalendarEventRequest {
    /// Fails when the end time falls outside the representable range.
    pub fn from_event(event: &NewEvent) -> Result<Self> {
        let end = event
            .start
            .checked_add_signed(Duration::hours(EVENT_DURATION_HOURS))
            .ok_or_else(|| Error::Validation("Event end time out of range".to_string()))?;

        let attendees = event
            .attendees
            .iter()
            .map(|email| email.trim())
            .filter(|email| !email.is_empty())
            .map(|email| EventAttendee {
                email: email.to_string(),
            })
            .collect();

        Ok(Self {
            summary: event.summary.clone(),
            start: EventDateTime::utc(event.start),
            end: EventDateTime::utc(end),
            attendees,
            reminders: Reminders { use_default: true },
            location: event.location.clone(),
            description: event.description.clone(),
        })
    }
}

/// Reference to an event the calendar accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertResponse {
    id: Option<String>,
    html_link: Option<String>,
}

/// Calendar backend that accepts new events.
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// `Ok(None)` when the provider answered without an event reference.
    async fn insert_event(&self, request: &CalendarEventRequest) -> Result<Option<CreatedEvent>>;
}

/// Build the Calendar request for `event` and submit it once.
pub async fn create_event<C>(calendar: &C, event: &NewEvent) -> Result<Option<CreatedEvent>>
where
    C: CalendarService + ?Sized,
{
    let request = CalendarEventRequest::from_event(event)?;

    info!(
        "Creating calendar event '{}' at {} with {} attendee(s)",
        request.summary,
        request.start.date_time,
        request.attendees.len()
    );

    calendar.insert_event(&request).await
}

/// Client for the Google Calendar events API.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_url: String,
    calendar_id: String,
    send_updates: Option<SendUpdates>,
    auth: GoogleAuth,
}

impl GoogleCalendarClient {
    pub fn new(
        http_client: reqwest::Client,
        api_url: String,
        calendar_id: String,
        auth: GoogleAuth,
    ) -> Self {
        Self {
            http_client,
            api_url,
            calendar_id,
            send_updates: None,
            auth,
        }
    }

    pub fn from_config(http_client: reqwest::Client, config: &Config, auth: GoogleAuth) -> Self {
        Self {
            send_updates: config.send_updates,
            ..Self::new(
                http_client,
                config.calendar_api_url.clone(),
                config.calendar_id.clone(),
                auth,
            )
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_url.trim_end_matches('/'),
            urlencoding::encode(&self.calendar_id)
        )
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarClient {
    async fn insert_event(&self, request: &CalendarEventRequest) -> Result<Option<CreatedEvent>> {
        let access_token = self.auth.access_token(&self.http_client).await?;

        let mut builder = self
            .http_client
            .post(self.events_url())
            .bearer_auth(access_token)
            .json(request);

        if let Some(send_updates) = self.send_updates {
            builder = builder.query(&[("sendUpdates", send_updates.as_str())]);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Calendar API error: {} {}",
                status, error_text
            )));
        }

        let created: InsertResponse = response.json().await?;

        match created.id.filter(|id| !id.is_empty()) {
            Some(id) => {
                info!("Calendar event {} created", id);
                Ok(Some(CreatedEvent {
                    id,
                    html_link: created.html_link,
                }))
            }
            None => {
                warn!("Calendar API accepted the insert but returned no event id");
                Ok(None)
            }
        }
    }
}
