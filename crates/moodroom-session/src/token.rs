//! Access-token acquisition.
//!
//! The application server mints a short-lived token for a room/participant
//! pair: `POST {server}token` with `{"roomName", "participantName"}`, answered
//! by `{"token": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use moodroom_core::{Endpoints, TokenError};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self, room_name: &str, participant_name: &str) -> Result<String, TokenError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    room_name: &'a str,
    participant_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

// MARK: - TokenClient

/// HTTP client for the application server's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    client: reqwest::Client,
    token_url: String,
}

impl TokenClient {
    pub fn new(endpoints: &Endpoints) -> Result<Self, TokenError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TokenError::Request { reason: format!("failed to create HTTP client: {e}") })?;
        Ok(Self {
            client,
            token_url: endpoints.token_url(),
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl TokenSource for TokenClient {
    async fn fetch(&self, room_name: &str, participant_name: &str) -> Result<String, TokenError> {
        debug!("Requesting token for '{}' in '{}' from {}", participant_name, room_name, self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&TokenRequest { room_name, participant_name })
            .send()
            .await
            .map_err(|e| TokenError::Request { reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Failed to get token: {}", body);
            return Err(TokenError::Status { status: status.as_u16(), body });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| TokenError::Decode { reason: e.to_string() })?;
        parsed.token.ok_or(TokenError::MissingToken)
    }
}

// MARK: - LiteralToken

/// A token obtained out of band.
#[derive(Debug, Clone)]
pub struct LiteralToken(pub String);

#[async_trait]
impl TokenSource for LiteralToken {
    async fn fetch(&self, _room_name: &str, _participant_name: &str) -> Result<String, TokenError> {
        Ok(self.0.clone())
    }
}
