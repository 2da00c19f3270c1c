//! Configuration management for the webhook Lambda.

use std::env;
use std::path::PathBuf;

use crate::{Error, Result};

/// Monday.com GraphQL endpoint.
pub const DEFAULT_MONDAY_API_URL: &str = "https://api.monday.com/v2";
/// Google Calendar v3 REST base URL.
pub const DEFAULT_CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";
/// Route the Monday.com webhook is registered against.
pub const DEFAULT_WEBHOOK_PATH: &str = "/monday-webhook";

/// Where the Google credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleCredentialSource {
    /// Service-account key JSON stored in AWS Secrets Manager
    SecretArn(String),
    /// Service-account key JSON passed directly in the environment
    InlineJson(String),
    /// Service-account key file on disk
    File(PathBuf),
    /// Pre-issued OAuth access token
    AccessToken(String),
}

/// Value of the Calendar API `sendUpdates` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendUpdates {
    All,
    ExternalOnly,
    None,
}

impl SendUpdates {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendUpdates::All => "all",
            SendUpdates::ExternalOnly => "externalOnly",
            SendUpdates::None => "none",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "all" => Ok(SendUpdates::All),
            "externalOnly" => Ok(SendUpdates::ExternalOnly),
            "none" => Ok(SendUpdates::None),
            other => Err(Error::Config(format!(
                "GOOGLE_CALENDAR_SEND_UPDATES must be one of all, externalOnly, none (got '{}')",
                other
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Monday.com API token
    pub monday_api_token: String,
    /// Monday.com GraphQL endpoint
    pub monday_api_url: String,
    /// Optional `API-Version` header for Monday.com
    pub monday_api_version: Option<String>,
    /// Signing secret used to verify webhook JWTs
    pub monday_signing_secret: Option<String>,
    /// Target calendar
    pub calendar_id: String,
    /// Google Calendar API base URL
    pub calendar_api_url: String,
    pub send_updates: Option<SendUpdates>,
    /// User to impersonate with domain-wide delegation
    pub impersonate_user: Option<String>,
    pub google_credentials: GoogleCredentialSource,
    /// Route the webhook is served on
    pub webhook_path: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let monday_api_token = get("MONDAY_API_TOKEN")
            .ok_or_else(|| Error::Config("MONDAY_API_TOKEN not set".to_string()))?;

        let google_credentials = if let Some(arn) = get("GOOGLE_SERVICE_ACCOUNT_SECRET_ARN") {
            GoogleCredentialSource::SecretArn(arn)
        } else if let Some(json) = get("GOOGLE_SERVICE_ACCOUNT_JSON") {
            GoogleCredentialSource::InlineJson(json)
        } else if let Some(path) = get("GOOGLE_SERVICE_ACCOUNT_FILE") {
            GoogleCredentialSource::File(PathBuf::from(path))
        } else if let Some(token) = get("GOOGLE_ACCESS_TOKEN") {
            GoogleCredentialSource::AccessToken(token)
        } else {
            return Err(Error::Config(
                "No Google credentials configured (set GOOGLE_SERVICE_ACCOUNT_SECRET_ARN, \
                 GOOGLE_SERVICE_ACCOUNT_JSON, GOOGLE_SERVICE_ACCOUNT_FILE or GOOGLE_ACCESS_TOKEN)"
                    .to_string(),
            ));
        };

        let send_updates = get("GOOGLE_CALENDAR_SEND_UPDATES")
            .map(|value| SendUpdates::parse(&value))
            .transpose()?;

        let webhook_path = match get("WEBHOOK_PATH") {
            Some(path) => normalize_webhook_path(&path)?,
            None => DEFAULT_WEBHOOK_PATH.to_string(),
        };

        Ok(Self {
            monday_api_token,
            monday_api_url: get("MONDAY_API_URL")
                .unwrap_or_else(|| DEFAULT_MONDAY_API_URL.to_string()),
            monday_api_version: get("MONDAY_API_VERSION"),
            monday_signing_secret: get("MONDAY_SIGNING_SECRET"),
            calendar_id: get("GOOGLE_CALENDAR_ID").unwrap_or_else(|| "primary".to_string()),
            calendar_api_url: get("GOOGLE_CALENDAR_API_URL")
                .unwrap_or_else(|| DEFAULT_CALENDAR_API_URL.to_string()),
            send_updates,
            impersonate_user: get("GOOGLE_IMPERSONATE_USER"),
            google_credentials,
            webhook_path,
        })
    }
}

/// Leading slash added, trailing slashes dropped. The root path would match every request.
fn normalize_webhook_path(path: &str) -> Result<String> {
    let route = path.trim_matches('/');
    if route.is_empty() {
        return Err(Error::Config(format!(
            "WEBHOOK_PATH must name a route, got {:?}",
            path
        )));
    }
    Ok(format!("/{}", route))
}
