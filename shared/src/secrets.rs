//! AWS Secrets Manager integration.

use aws_sdk_secretsmanager::Client as SecretsClient;

use crate::{Error, Result};

/// Build a Secrets Manager client from the Lambda's default AWS configuration.
pub async fn secrets_client() -> SecretsClient {
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    SecretsClient::new(&config)
}

/// Get a secret's string value from Secrets Manager.
///
/// Called once at cold start; the result lives in the immutable process configuration.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

    let secret_string = response
        .secret_string()
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))?;

    if secret_string.trim().is_empty() {
        return Err(Error::Aws(format!("Secret {} is empty", secret_arn)));
    }

    Ok(secret_string.to_string())
}
