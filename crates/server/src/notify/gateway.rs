//! WhatsApp gateway client.
//!
//! Thin JSON client for the hosted gateway that relays messages to
//! customers' WhatsApp numbers.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;

use green_grocer_core::Phone;

use crate::config::WhatsAppConfig;

/// Outbound request timeout.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when talking to the WhatsApp gateway.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("Gateway error: {status} - {message}")]
    Gateway { status: u16, message: String },

    /// Client could not be constructed.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// WhatsApp gateway client.
#[derive(Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    gateway_url: String,
}

impl WhatsAppClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Config` if the token cannot form a valid
    /// header. Returns `NotifyError::Http` if the HTTP client fails to
    /// build.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, NotifyError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_token.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| NotifyError::Config(format!("Invalid API token format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(SEND_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send one text message to a phone number.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Gateway` for non-success responses and
    /// `NotifyError::Http` for transport failures.
    pub async fn send_message(&self, to: &Phone, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/messages", self.gateway_url);

        let body = serde_json::json!({
            "to": to,
            "type": "text",
            "text": { "body": text },
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
