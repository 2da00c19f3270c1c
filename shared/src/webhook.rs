//! Monday.com notification pipeline.
//!
//! One delivery is handled start to finish: decode, answer the challenge
//! handshake, verify the signature, extract fields, resolve attendees one at
//! a time, create the calendar event, and map the outcome to a reply.

use serde_json::Value;
use tracing::{error, info, warn};

use crate::auth::verify_monday_signature;
use crate::calendar::{create_event, CalendarService, CreatedEvent, NewEvent};
use crate::extract::{extract_event, PersonRef};
use crate::models::{InboundNotification, WebhookReply};
use crate::monday::UserResolver;
use crate::Result;

/// Handles webhook deliveries against a user resolver and a calendar.
pub struct WebhookProcessor<R, C> {
    resolver: R,
    calendar: C,
    signing_secret: Option<String>,
}

impl<R, C> WebhookProcessor<R, C>
where
    R: UserResolver,
    C: CalendarService,
{
    pub fn new(resolver: R, calendar: C) -> Self {
        Self {
            resolver,
            calendar,
            signing_secret: None,
        }
    }

    /// Require event deliveries to carry a JWT signed with `secret`.
    pub fn with_signing_secret(mut self, secret: Option<String>) -> Self {
        self.signing_secret = secret;
        self
    }

    /// Handle one webhook delivery.
    pub async fn handle(&self, body: &[u8], authorization: Option<&str>) -> WebhookReply {
        let event = match InboundNotification::from_body(body) {
            Ok(InboundNotification::Challenge(token)) => {
                info!("Answering Monday.com challenge");
                return WebhookReply::challenge(token);
            }
            Ok(InboundNotification::Event(event)) => event,
            Err(e) => {
                warn!("Rejected webhook body: {}", e);
                return WebhookReply::error(e.status_code(), e.to_string());
            }
        };

        if let Some(secret) = &self.signing_secret {
            if let Err(e) = verify_monday_signature(authorization, secret) {
                warn!("Rejected webhook delivery: {}", e);
                return WebhookReply::error(401, "Invalid webhook signature");
            }
        }

        match self.process_event(&event).await {
            Ok(Some(created)) => WebhookReply::created(&created),
            Ok(None) => {
                error!("Calendar event was not created");
                WebhookReply::error(500, "Failed to create calendar event")
            }
            // Failures past validation reach the sender as client errors with the raw message.
            Err(e) => {
                error!("Failed to process Monday.com event: {}", e);
                WebhookReply::error(400, e.to_string())
            }
        }
    }

    async fn process_event(&self, event: &Value) -> Result<Option<CreatedEvent>> {
        let extracted = extract_event(event)?;

        info!(
            "Processing Monday.com item '{}' starting {} with {} assigned person(s)",
            extracted.name,
            extracted.start,
            extracted.persons.len()
        );

        let attendees = self.resolve_attendees(&extracted.persons).await?;

        let new_event = NewEvent {
            summary: extracted.name,
            start: extracted.start,
            attendees,
            location: extracted.location,
            description: extracted.description,
        };

        create_event(&self.calendar, &new_event).await
    }

    /// Resolve every person sequentially. Unresolvable ids are dropped; duplicates collapse.
    async fn resolve_attendees(&self, persons: &[PersonRef]) -> Result<Vec<String>> {
        let mut emails: Vec<String> = Vec::with_capacity(persons.len());

        for person in persons {
            let email = match person {
                PersonRef::Email(email) => Some(email.clone()),
                PersonRef::Id(user_id) => {
                    let resolved = self.resolver.resolve_email(user_id).await?;
                    if resolved.is_none() {
                        warn!("No email found for Monday.com user {}; skipping attendee", user_id);
                    }
                    resolved
                }
            };

            if let Some(email) = email {
                if !emails.iter().any(|known| known.eq_ignore_ascii_case(&email)) {
                    emails.push(email);
                }
            }
        }

        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarEventRequest;
    use crate::models::ReplyBody;
    use crate::Error;
    use async_trait::async_trait;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::{Arc, Mutex};

    const KICKOFF: &str = r#"{"event":{"pulseName":"Kickoff","value":{"date":"2025-04-01","time":"09:00:00","personsAndTeams":[{"id":"42"}]}}}"#;

    /// Resolver backed by a fixed directory that records every lookup.
    #[derive(Clone, Default)]
    struct FakeResolver {
        directory: HashMap<String, String>,
        fail: bool,
        lookups: Arc<Mutex<Vec<String>>>,
    }

    impl FakeResolver {
        fn with(entries: &[(&str, &str)]) -> Self {
            Self {
                directory: entries
                    .iter()
                    .map(|(id, email)| (id.to_string(), email.to_string()))
                    .collect(),
                ..Default::default()
            }
        }

        fn lookups(&self) -> Vec<String> {
            self.lookups.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UserResolver for FakeResolver {
        async fn resolve_email(&self, user_id: &str) -> Result<Option<String>> {
            self.lookups.lock().unwrap().push(user_id.to_string());
            if self.fail {
                return Err(Error::Upstream("identity API unreachable".to_string()));
            }
            Ok(self.directory.get(user_id).cloned())
        }
    }

    #[derive(Clone, Copy, Default, PartialEq)]
    enum CalendarBehavior {
        #[default]
        Create,
        NoResult,
        Fail,
    }

    /// Calendar that records every submitted request.
    #[derive(Clone, Default)]
    struct FakeCalendar {
        behavior: CalendarBehavior,
        submitted: Arc<Mutex<Vec<CalendarEventRequest>>>,
    }

    impl FakeCalendar {
        fn submitted(&self) -> Vec<CalendarEventRequest> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CalendarService for FakeCalendar {
        async fn insert_event(&self, request: &CalendarEventRequest) -> Result<Option<CreatedEvent>> {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(request.clone());
            match self.behavior {
                CalendarBehavior::Create => Ok(Some(CreatedEvent {
                    id: format!("evt{}", submitted.len()),
                    html_link: Some(format!("https://calendar.example/evt{}", submitted.len())),
                })),
                CalendarBehavior::NoResult => Ok(None),
                CalendarBehavior::Fail => Err(Error::Upstream("Calendar API error: 403".to_string())),
            }
        }
    }

    fn processor(
        resolver: &FakeResolver,
        calendar: &FakeCalendar,
    ) -> WebhookProcessor<FakeResolver, FakeCalendar> {
        WebhookProcessor::new(resolver.clone(), calendar.clone())
    }

    fn body_json(reply: &WebhookReply) -> Value {
        serde_json::to_value(&reply.body).unwrap()
    }

    fn attendee_set(request: &CalendarEventRequest) -> BTreeSet<String> {
        request.attendees.iter().map(|a| a.email.clone()).collect()
    }

    #[tokio::test]
    async fn test_challenge_echoed_without_outbound_calls() {
        let resolver = FakeResolver::default();
        let calendar = FakeCalendar::default();

        for token in [json!("3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"), json!(42), json!({ "nested": true })] {
            let body = serde_json::to_vec(&json!({ "challenge": token })).unwrap();
            let reply = processor(&resolver, &calendar).handle(&body, None).await;

            assert_eq!(reply.status_code, 200);
            assert_eq!(body_json(&reply), json!({ "challenge": token }));
        }

        assert!(resolver.lookups().is_empty());
        assert!(calendar.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_challenge_skips_signature_check() {
        let resolver = FakeResolver::default();
        let calendar = FakeCalendar::default();
        let processor =
            processor(&resolver, &calendar).with_signing_secret(Some("s3cret".to_string()));

        let reply = processor.handle(br#"{"challenge":"abc"}"#, None).await;
        assert_eq!(reply.status_code, 200);
    }

    #[tokio::test]
    async fn test_missing_date_rejected_without_outbound_calls() {
        let resolver = FakeResolver::with(&[("42", "a@x.com")]);
        let calendar = FakeCalendar::default();

        let reply = processor(&resolver, &calendar)
            .handle(
                br#"{"event":{"pulseName":"Kickoff","value":{"personsAndTeams":[{"id":"42"}]}}}"#,
                None,
            )
            .await;

        assert_eq!(reply.status_code, 400);
        let body = body_json(&reply);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("Missing date"));
        assert!(resolver.lookups().is_empty());
        assert!(calendar.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_malformed_bodies_rejected() {
        let resolver = FakeResolver::default();
        let calendar = FakeCalendar::default();

        for body in [&b""[..], &b"not json"[..], &b"{}"[..]] {
            let reply = processor(&resolver, &calendar).handle(body, None).await;
            assert_eq!(reply.status_code, 400);
            assert_eq!(body_json(&reply)["status"], "error");
        }

        assert!(resolver.lookups().is_empty());
        assert!(calendar.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_kickoff_end_to_end() {
        let resolver = FakeResolver::with(&[("42", "a@x.com")]);
        let calendar = FakeCalendar::default();

        let reply = processor(&resolver, &calendar)
            .handle(KICKOFF.as_bytes(), None)
            .await;

        assert_eq!(reply.status_code, 200);
        assert_eq!(
            body_json(&reply),
            json!({
                "status": "ok",
                "message": "Event added to Google Calendar",
                "event_id": "evt1",
                "event_link": "https://calendar.example/evt1"
            })
        );

        let submitted = calendar.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].summary, "Kickoff");
        assert_eq!(submitted[0].start.date_time, "2025-04-01T09:00:00");
        assert_eq!(submitted[0].end.date_time, "2025-04-01T10:00:00");
        assert_eq!(attendee_set(&submitted[0]), BTreeSet::from(["a@x.com".to_string()]));
        assert_eq!(resolver.lookups(), vec!["42".to_string()]);
    }

    #[tokio::test]
    async fn test_unresolved_attendee_still_creates_event() {
        let resolver = FakeResolver::default();
        let calendar = FakeCalendar::default();

        let reply = processor(&resolver, &calendar)
            .handle(KICKOFF.as_bytes(), None)
            .await;

        assert_eq!(reply.status_code, 200);
        let submitted = calendar.submitted();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].attendees.is_empty());
    }

    #[tokio::test]
    async fn test_resolver_called_once_per_identifier() {
        let resolver = FakeResolver::with(&[("1", "one@x.com"), ("3", "three@x.com")]);
        let calendar = FakeCalendar::default();

        let body = json!({
            "event": {
                "pulseName": "Standup",
                "value": {
                    "date": "2025-03-16",
                    "personsAndTeams": [{ "id": 1 }, { "id": "2" }, { "id": 3 }]
                }
            }
        });

        let reply = processor(&resolver, &calendar)
            .handle(&serde_json::to_vec(&body).unwrap(), None)
            .await;

        assert_eq!(reply.status_code, 200);
        assert_eq!(
            resolver.lookups(),
            vec!["1".to_string(), "2".to_string(), "3".to_string()]
        );

        let submitted = calendar.submitted();
        assert_eq!(
            attendee_set(&submitted[0]),
            BTreeSet::from(["one@x.com".to_string(), "three@x.com".to_string()])
        );
        assert_eq!(submitted[0].start.date_time, "2025-03-16T12:00:00");
    }

    #[tokio::test]
    async fn test_email_entries_skip_resolver() {
        let resolver = FakeResolver::default();
        let calendar = FakeCalendar::default();

        let body = json!({
            "event": {
                "pulseName": "Review",
                "column_values": { "date": "2025-05-02", "person": [{ "email": "c@x.com" }] }
            }
        });

        let reply = processor(&resolver, &calendar)
            .handle(&serde_json::to_vec(&body).unwrap(), None)
            .await;

        assert_eq!(reply.status_code, 200);
        assert!(resolver.lookups().is_empty());
        assert_eq!(
            attendee_set(&calendar.submitted()[0]),
            BTreeSet::from(["c@x.com".to_string()])
        );
    }

    #[tokio::test]
    async fn test_duplicate_delivery_creates_two_events() {
        let resolver = FakeResolver::with(&[("42", "a@x.com")]);
        let calendar = FakeCalendar::default();
        let processor = processor(&resolver, &calendar);

        let first = processor.handle(KICKOFF.as_bytes(), None).await;
        let second = processor.handle(KICKOFF.as_bytes(), None).await;

        assert_eq!(first.status_code, 200);
        assert_eq!(second.status_code, 200);
        assert_ne!(body_json(&first)["event_id"], body_json(&second)["event_id"]);

        let submitted = calendar.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0], submitted[1]);
    }

    #[tokio::test]
    async fn test_resolver_failure_is_client_error_with_message() {
        let resolver = FakeResolver {
            fail: true,
            ..FakeResolver::with(&[("42", "a@x.com")])
        };
        let calendar = FakeCalendar::default();

        let reply = processor(&resolver, &calendar)
            .handle(KICKOFF.as_bytes(), None)
            .await;

        assert_eq!(reply.status_code, 400);
        assert!(body_json(&reply)["message"]
            .as_str()
            .unwrap()
            .contains("identity API unreachable"));
        assert!(calendar.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_calendar_failure_is_client_error() {
        let resolver = FakeResolver::with(&[("42", "a@x.com")]);
        let calendar = FakeCalendar {
            behavior: CalendarBehavior::Fail,
            ..Default::default()
        };

        let reply = processor(&resolver, &calendar)
            .handle(KICKOFF.as_bytes(), None)
            .await;

        assert_eq!(reply.status_code, 400);
        assert!(body_json(&reply)["message"].as_str().unwrap().contains("403"));
    }

    #[tokio::test]
    async fn test_end_time_overflow_is_client_error() {
        let resolver = FakeResolver::default();
        let calendar = FakeCalendar::default();

        let reply = processor(&resolver, &calendar)
            .handle(
                br#"{"event":{"value":{"date":"+262142-12-31","time":"23:30:00"}}}"#,
                None,
            )
            .await;

        assert_eq!(reply.status_code, 400);
        let body = body_json(&reply);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("out of range"));
        assert!(calendar.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_calendar_without_result_is_server_error() {
        let resolver = FakeResolver::with(&[("42", "a@x.com")]);
        let calendar = FakeCalendar {
            behavior: CalendarBehavior::NoResult,
            ..Default::default()
        };

        let reply = processor(&resolver, &calendar)
            .handle(KICKOFF.as_bytes(), None)
            .await;

        assert_eq!(reply.status_code, 500);
        assert_eq!(
            body_json(&reply),
            json!({ "status": "error", "message": "Failed to create calendar event" })
        );
    }

    #[tokio::test]
    async fn test_signature_required_when_secret_configured() {
        let resolver = FakeResolver::with(&[("42", "a@x.com")]);
        let calendar = FakeCalendar::default();
        let processor =
            processor(&resolver, &calendar).with_signing_secret(Some("s3cret".to_string()));

        let reply = processor.handle(KICKOFF.as_bytes(), None).await;
        assert_eq!(reply.status_code, 401);
        assert!(matches!(reply.body, ReplyBody::Status(_)));
        assert!(resolver.lookups().is_empty());
        assert!(calendar.submitted().is_empty());

        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({ "accountId": 1, "userId": 2 }),
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();

        let reply = processor.handle(KICKOFF.as_bytes(), Some(&token)).await;
        assert_eq!(reply.status_code, 200);
        assert_eq!(calendar.submitted().len(), 1);
    }
}
