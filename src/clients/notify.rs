//! Client for the SMS notification service that delivers one-time codes.
//!
//! Resend suppression is the session's job (the "code already sent" flag);
//! this client sends whenever asked.

use reqwest::Client;
use serde_json::json;
use tracing::{Instrument, info_span};

use super::{ClientError, endpoint_url, http_client};

#[derive(Clone, Debug)]
pub struct NotifyClient {
    client: Client,
    base_url: String,
}

impl NotifyClient {
    /// # Errors
    /// Returns an error if the base URL is invalid or the underlying HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, user_agent: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(user_agent)?,
            base_url: endpoint_url(base_url, "")?,
        })
    }

    /// Send a one-time passcode to a telephone number.
    ///
    /// # Errors
    /// Returns `ClientError::Status` for non-success statuses.
    pub async fn send_otp_sms(&self, to: &str, code: &str) -> Result<(), ClientError> {
        let url = format!("{}/v1/sms", self.base_url);
        let span = info_span!(
            "notify.send_otp_sms",
            http.method = "POST",
            url = %url
        );
        async {
            let response = self
                .client
                .post(&url)
                .json(&json!({ "to": to, "code": code }))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ClientError::Status(response.status()));
            }
            Ok(())
        }
        .instrument(span)
        .await
    }
}
