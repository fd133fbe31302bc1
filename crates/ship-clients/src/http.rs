//! Shared HTTP plumbing for collaborator clients

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use ship_core::{ShipError, ShipResult};
use std::time::Duration;
use tracing::debug;

/// Longest response body excerpt carried into an error message
const MAX_ERROR_BODY: usize = 256;

/// Build the HTTP client shared by every collaborator
pub fn create_http_client(timeout: Duration) -> ShipResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ShipError::config(format!("Failed to create HTTP client: {}", e)))
}

/// JSON-over-HTTP client bound to one collaborator's base URL
///
/// Every failure, including non-2xx responses and undecodable bodies, comes
/// back as [`ShipError::Collaborator`] naming the service.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    service: &'static str,
    base_url: String,
    client: reqwest::Client,
}

impl ServiceClient {
    pub fn new(service: &'static str, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            service,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> ShipResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.send(self.client.post(self.url(path)).json(body)).await?;
        self.decode(response).await
    }

    /// POST a JSON body, ignoring the response body
    pub async fn post_ack<B>(&self, path: &str, body: &B) -> ShipResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.client.post(self.url(path)).json(body)).await?;
        Ok(())
    }

    /// POST without a body and decode the JSON response
    pub async fn post_empty<R>(&self, path: &str) -> ShipResult<R>
    where
        R: DeserializeOwned,
    {
        let response = self.send(self.client.post(self.url(path))).await?;
        self.decode(response).await
    }

    pub async fn get_json<R>(&self, path: &str, query: &[(&str, &str)]) -> ShipResult<R>
    where
        R: DeserializeOwned,
    {
        let response = self.send(self.client.get(self.url(path)).query(query)).await?;
        self.decode(response).await
    }

    async fn send(&self, request: RequestBuilder) -> ShipResult<Response> {
        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            ShipError::collaborator(self.service, message)
        })?;

        let status = response.status();
        debug!("{} responded {} for {}", self.service, status, response.url().path());

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ShipError::collaborator(
            self.service,
            format!("HTTP {}: {}", status.as_u16(), error_detail(&body)),
        ))
    }

    async fn decode<R: DeserializeOwned>(&self, response: Response) -> ShipResult<R> {
        response.json::<R>().await.map_err(|e| {
            ShipError::collaborator(self.service, format!("invalid response body: {}", e))
        })
    }
}

/// Pull a human-readable message out of an error body
fn error_detail(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let message = json
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| json.get("error").and_then(|e| e.as_str()));
        if let Some(message) = message {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response".to_string();
    }
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
