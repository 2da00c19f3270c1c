//! Monday.com GraphQL client used to resolve user ids to email addresses.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::Result;

const USER_EMAIL_QUERY: &str = "query ($ids: [ID!]) { users(ids: $ids) { id email } }";

/// Resolves an opaque Monday.com user id to an email address.
#[async_trait]
pub trait UserResolver: Send + Sync {
    /// `Ok(None)` when the user has no usable email; `Err` only on transport failure.
    async fn resolve_email(&self, user_id: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UsersData {
    #[serde(default)]
    users: Vec<MondayUser>,
}

#[derive(Debug, Deserialize)]
struct MondayUser {
    email: Option<String>,
}

/// Client for the Monday.com users API.
#[derive(Debug, Clone)]
pub struct MondayClient {
    http_client: reqwest::Client,
    api_url: String,
    api_token: String,
    api_version: Option<String>,
}

impl MondayClient {
    pub fn new(http_client: reqwest::Client, api_url: String, api_token: String) -> Self {
        Self {
            http_client,
            api_url,
            api_token,
            api_version: None,
        }
    }

    pub fn from_config(http_client: reqwest::Client, config: &Config) -> Self {
        Self {
            api_version: config.monday_api_version.clone(),
            ..Self::new(
                http_client,
                config.monday_api_url.clone(),
                config.monday_api_token.clone(),
            )
        }
    }
}

#[async_trait]
impl UserResolver for MondayClient {
    async fn resolve_email(&self, user_id: &str) -> Result<Option<String>> {
        let payload = serde_json::json!({
            "query": USER_EMAIL_QUERY,
            "variables": { "ids": [user_id] },
        });

        let mut request = self
            .http_client
            .post(&self.api_url)
            .header("Authorization", &self.api_token)
            .json(&payload);

        if let Some(version) = &self.api_version {
            request = request.header("API-Version", version);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Monday user lookup for {} failed: {} - {}", user_id, status, body);
            return Ok(None);
        }

        let body: GraphQlResponse<UsersData> = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Unreadable Monday user lookup response for {}: {}", user_id, e);
                return Ok(None);
            }
        };

        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            warn!("Monday user lookup for {} returned errors: {}", user_id, messages.join("; "));
            return Ok(None);
        }

        let email = first_email(body.data);
        debug!("Monday user {} resolved to {:?}", user_id, email);
        Ok(email)
    }
}

fn first_email(data: Option<UsersData>) -> Option<String> {
    data?
        .users
        .into_iter()
        .filter_map(|user| user.email)
        .map(|email| email.trim().to_string())
        .find(|email| !email.is_empty())
}
