//! Blocking HTTP helpers shared by the remote collaborators.

use crate::error::{KiraError, Result};
use reqwest::blocking::{Client, Response};
use std::time::Duration;

/// Build a client with a per-request timeout.
pub fn client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Pass successful responses through; turn anything else into
/// `KiraError::ServiceStatus` carrying the body.
pub fn ensure_success(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(KiraError::ServiceStatus {
        service: service.to_string(),
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

/// Read a JSON body into a loose value.
pub fn json_body(service: &str, response: Response) -> Result<serde_json::Value> {
    let text = ensure_success(service, response)?.text()?;
    serde_json::from_str(&text)
        .map_err(|e| KiraError::malformed(service, format!("invalid JSON: {}", e)))
}

/// Required string field of a JSON object.
pub fn string_field<'a>(service: &str, value: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| KiraError::malformed(service, format!("missing string field '{}'", field)))
}
