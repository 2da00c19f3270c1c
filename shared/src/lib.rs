//! Shared library for the Monday.com to Google Calendar webhook Lambda.
//!
//! This crate provides configuration, error types, the Monday.com and Google
//! Calendar clients, and the notification pipeline the Lambda runs.

pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod extract;
pub mod google_auth;
pub mod http;
pub mod models;
pub mod monday;
pub mod secrets;
pub mod webhook;

pub use auth::{verify_monday_signature, MondayClaims};
pub use calendar::{CalendarEventRequest, CalendarService, CreatedEvent, GoogleCalendarClient, NewEvent};
pub use config::Config;
pub use error::{Error, Result};
pub use extract::{extract_event, ExtractedEvent, PersonRef};
pub use google_auth::GoogleAuth;
pub use models::{InboundNotification, WebhookReply};
pub use monday::{MondayClient, UserResolver};
pub use webhook::WebhookProcessor;
