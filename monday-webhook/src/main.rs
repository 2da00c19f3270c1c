//! Monday.com Webhook Lambda - Turns Monday.com item notifications into Google Calendar events.
//!
//! Answers Monday.com's challenge handshake, then for every "pulse changed"
//! notification resolves the assigned people to emails and creates a one-hour
//! calendar event inviting them.

use lambda_http::http::{header::AUTHORIZATION, Method};
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{body_bytes, error_response, reply_response};
use shared::{
    CalendarService, Config, GoogleAuth, GoogleCalendarClient, MondayClient, UserResolver,
    WebhookProcessor,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state
struct AppState<R, C> {
    processor: WebhookProcessor<R, C>,
    webhook_path: String,
}

impl AppState<MondayClient, GoogleCalendarClient> {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let http_client = reqwest::Client::new();

        let auth = GoogleAuth::from_config(&config).await?;

        let processor = WebhookProcessor::new(
            MondayClient::from_config(http_client.clone(), &config),
            GoogleCalendarClient::from_config(http_client, &config, auth),
        )
        .with_signing_secret(config.monday_signing_secret.clone());

        if config.monday_signing_secret.is_none() {
            warn!("MONDAY_SIGNING_SECRET not set; webhook signatures are not verified");
        }

        info!(
            "Webhook ready on {} for calendar {}",
            config.webhook_path, config.calendar_id
        );

        Ok(Self {
            processor,
            webhook_path: config.webhook_path,
        })
    }
}

/// API Gateway may prefix the stage name, so only the tail of the path has to match,
/// and only on a segment boundary.
fn matches_route(path: &str, webhook_path: &str) -> bool {
    let route = webhook_path.trim_matches('/');
    if route.is_empty() {
        return false;
    }
    let path = path.trim_end_matches('/');
    path == route || path.ends_with(&format!("/{}", route))
}

async fn handler<R, C>(state: Arc<AppState<R, C>>, event: Request) -> Result<Response<Body>, Error>
where
    R: UserResolver,
    C: CalendarService,
{
    if !matches_route(event.uri().path(), &state.webhook_path) {
        return error_response(404, "Not found");
    }

    if event.method() != Method::POST {
        return error_response(405, "Method not allowed");
    }

    let authorization = event
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let reply = state
        .processor
        .handle(body_bytes(event.body()), authorization)
        .await;

    info!("Webhook answered with status {}", reply.status_code);
    reply_response(&reply)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
