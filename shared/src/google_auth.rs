//! Google service-account authentication for the Calendar API.
//!
//! A service-account key is turned into a short-lived bearer token with the
//! OAuth2 JWT-bearer grant: an RS256 assertion signed with the key's private
//! key is posted to the key's `token_uri`.

use std::fmt;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Config, GoogleCredentialSource};
use crate::secrets::{get_secret, secrets_client};
use crate::{Error, Result};

/// Scope needed to insert events.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The parts of a Google service-account key file we use.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid service account key: {}", e)))
    }
}

/// Claims of the signed assertion sent to the token endpoint.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Credentials used to authorize Calendar API calls.
#[derive(Clone)]
pub enum GoogleAuth {
    ServiceAccount {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
        /// Impersonated user (domain-wide delegation)
        subject: Option<String>,
    },
    AccessToken(String),
}

impl fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoogleAuth::ServiceAccount { key, subject, .. } => f
                .debug_struct("ServiceAccount")
                .field("key", key)
                .field("subject", subject)
                .finish_non_exhaustive(),
            GoogleAuth::AccessToken(_) => f.write_str("AccessToken(..)"),
        }
    }
}

impl GoogleAuth {
    /// Build credentials from a parsed service-account key.
    ///
    /// The private key is parsed here so a broken key fails at startup, not on the first webhook.
    pub fn service_account(key: ServiceAccountKey, subject: Option<String>) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid service account private key: {}", e)))?;

        Ok(GoogleAuth::ServiceAccount {
            key,
            signing_key,
            subject,
        })
    }

    /// Load credentials from whichever source the configuration names.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let key_json = match &config.google_credentials {
            GoogleCredentialSource::AccessToken(token) => {
                info!("Using static Google access token");
                return Ok(GoogleAuth::AccessToken(token.clone()));
            }
            GoogleCredentialSource::SecretArn(arn) => {
                info!("Loading service account key from Secrets Manager");
                let client = secrets_client().await;
                get_secret(&client, arn).await?
            }
            GoogleCredentialSource::InlineJson(json) => json.clone(),
            GoogleCredentialSource::File(path) => {
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::Config(format!(
                        "Failed to read service account file {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        };

        let key = ServiceAccountKey::from_json(&key_json)?;
        info!("Using service account {}", key.client_email);
        Self::service_account(key, config.impersonate_user.clone())
    }

    /// Get a bearer token for one Calendar API call.
    pub async fn access_token(&self, http_client: &reqwest::Client) -> Result<String> {
        match self {
            GoogleAuth::AccessToken(token) => Ok(token.clone()),
            GoogleAuth::ServiceAccount {
                key,
                signing_key,
                subject,
            } => {
                let assertion =
                    sign_assertion(key, signing_key, subject.as_deref(), Utc::now().timestamp())?;
                exchange_assertion(http_client, &key.token_uri, &assertion).await
            }
        }
    }
}

fn assertion_claims<'a>(
    key: &'a ServiceAccountKey,
    subject: Option<&'a str>,
    now: i64,
) -> AssertionClaims<'a> {
    AssertionClaims {
        iss: &key.client_email,
        scope: CALENDAR_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
        sub: subject,
    }
}

fn sign_assertion(
    key: &ServiceAccountKey,
    signing_key: &EncodingKey,
    subject: Option<&str>,
    now: i64,
) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    encode(&header, &assertion_claims(key, subject, now), signing_key)
        .map_err(|e| Error::Internal(format!("Failed to sign service account assertion: {}", e)))
}

/// Trade a signed assertion for an access token.
async fn exchange_assertion(
    http_client: &reqwest::Client,
    token_uri: &str,
    assertion: &str,
) -> Result<String> {
    let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)];

    let response = http_client.post(token_uri).form(&params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(Error::Upstream(format!(
            "Token exchange failed: {} {}",
            status, error_text
        )));
    }

    let token: TokenResponse = response.json().await?;
    Ok(token.access_token)
}
