//! HTTP helpers for the Lambda entry point.

use lambda_http::{Body, Response};
use serde::Serialize;

use crate::models::WebhookReply;

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    let response = Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))
        .map_err(Box::new)?;

    Ok(response)
}

/// Create an error response in the webhook's `{"status":"error","message":...}` shape.
pub fn error_response(status: u16, message: impl Into<String>) -> Result<Response<Body>, lambda_http::Error> {
    reply_response(&WebhookReply::error(status, message))
}

/// Turn a webhook reply into an HTTP response.
pub fn reply_response(reply: &WebhookReply) -> Result<Response<Body>, lambda_http::Error> {
    json_response(reply.status_code, &reply.body)
}

/// Raw bytes of a request body; `Body::Empty` yields an empty slice.
pub fn body_bytes(body: &Body) -> &[u8] {
    body.as_ref()
}
