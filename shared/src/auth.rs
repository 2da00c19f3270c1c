//! Monday.com webhook signature verification.
//!
//! Monday.com signs app webhooks with an HS256 JWT carried in the
//! `Authorization` header, keyed by the app's signing secret.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Claims Monday.com puts in the webhook JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MondayClaims {
    #[serde(rename = "accountId", default)]
    pub account_id: Option<serde_json::Value>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Verify the `Authorization` header of a webhook delivery.
pub fn verify_monday_signature(authorization: Option<&str>, signing_secret: &str) -> Result<MondayClaims> {
    let token = authorization
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Auth("Missing Authorization header".to_string()))?;

    // Skip "Bearer " prefix if present
    let token = token.strip_prefix("Bearer ").unwrap_or(token);

    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_aud = false;

    let key = DecodingKey::from_secret(signing_secret.as_bytes());

    let token_data = decode::<MondayClaims>(token, &key, &validation)
        .map_err(|e| Error::Auth(format!("Failed to verify webhook token: {}", e)))?;

    Ok(token_data.claims)
}
