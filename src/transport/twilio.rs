//! Twilio Programmable Messaging transport.
//!
//! Sends one form-encoded `POST` per alert to
//! `{api_base}/2010-04-01/Accounts/{sid}/Messages.json` with HTTP basic
//! auth. Redirects are never followed.

use std::time::Duration;

use reqwest::redirect;
use serde::Deserialize;
use tracing::debug;

use super::{DispatchReceipt, Result, Transport, TransportType};
use crate::error::{ConfigError, TransportError};
use crate::event::RecipientId;

/// Production Twilio API origin.
pub const DEFAULT_API_BASE: &str = "https://api.twilio.com";

/// Maximum number of response-body characters kept in an error.
const MAX_ERROR_BODY: usize = 512;

/// Credentials and endpoint for the Twilio transport.
#[derive(Clone)]
pub struct TwilioConfig {
    /// Account SID (also the basic-auth user).
    pub account_sid: String,
    /// Auth token (basic-auth password).
    pub auth_token: String,
    /// Sending number.
    pub from: String,
    /// API origin, overridable for testing.
    pub api_base: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

// Keep the auth token out of logs.
impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("from", &self.from)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Success payload; only the message SID is read.
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

/// Twilio-backed [`Transport`].
#[derive(Debug)]
pub struct TwilioTransport {
    client: reqwest::Client,
    config: TwilioConfig,
    endpoint: String,
}

impl TwilioTransport {
    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredentials`] when the SID, token or
    /// sending number is blank, and [`ConfigError::InvalidValue`] if the
    /// HTTP client cannot be constructed.
    pub fn new(config: TwilioConfig) -> std::result::Result<Self, ConfigError> {
        for (field, value) in [
            ("account_sid", &config.account_sid),
            ("auth_token", &config.auth_token),
            ("from", &config.from),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingCredentials { field });
            }
        }

        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "transport".to_string(),
                value: e.to_string(),
                expected: "a buildable HTTP client".to_string(),
            })?;

        let endpoint = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.api_base.trim_end_matches('/'),
            config.account_sid
        );

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    /// The resolved Messages endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Transport for TwilioTransport {
    async fn send(&self, address: &RecipientId, body: &str) -> Result<DispatchReceipt> {
        let form = [
            ("To", address.as_str()),
            ("From", self.config.from.as_str()),
            ("Body", body),
        ];

        debug!(recipient = %address, "sending alert via twilio");

        let request = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form);

        let response = tokio::time::timeout(self.config.timeout, request.send())
            .await
            .map_err(|_| TransportError::Timeout(self.config.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.config.timeout)
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        let text = tokio::time::timeout(self.config.timeout, response.text())
            .await
            .map_err(|_| TransportError::Timeout(self.config.timeout))?
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let resource: MessageResource = serde_json::from_str(&text)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        Ok(DispatchReceipt {
            diagnostic: resource.sid,
        })
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Twilio
    }
}
