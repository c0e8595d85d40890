//! Client for the payment connector (the gateway-facing service that
//! processes charges and refunds).

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Instrument, info_span};

use super::{endpoint_url, http_client};

/// Body of a refund submission. Both amounts are whole pence; the
/// availability figure echoes the value the user last saw so the connector
/// can reject a stale snapshot.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RefundRequest {
    pub amount: i64,
    pub refund_amount_available: i64,
}

/// A `202 Accepted` refund response.
#[derive(Clone, Debug, Deserialize)]
pub struct RefundAccepted {
    #[serde(default)]
    pub refund_id: Option<String>,
}

/// A charge as the connector reports it, trimmed to what the portal
/// renders.
#[derive(Clone, Debug, Deserialize)]
pub struct Charge {
    pub charge_id: String,
    pub amount: i64,
    #[serde(default)]
    pub refund_summary: RefundSummary,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RefundSummary {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount_available: i64,
    #[serde(default)]
    pub amount_submitted: i64,
}

/// Connector refund rejection reasons the portal recognizes.
pub const REASON_AMOUNT_NOT_AVAILABLE: &str = "amount_not_available";
pub const REASON_AMOUNT_MIN_VALIDATION: &str = "amount_min_validation";
pub const REASON_FULL: &str = "full";

#[derive(Debug, Error)]
pub enum RefundError {
    /// 400 with an optional machine-readable reason code.
    #[error("refund rejected by connector")]
    Rejected { reason: Option<String> },
    /// 412: the refund-availability snapshot was stale; the request was
    /// almost certainly submitted already.
    #[error("refund precondition failed")]
    Conflict,
    /// Any other non-success status.
    #[error("connector returned status {0}")]
    Unavailable(StatusCode),
    #[error("connector request failed")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone, Debug)]
pub struct ConnectorClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RefundRejection {
    #[serde(default)]
    reason: Option<String>,
}

impl ConnectorClient {
    /// # Errors
    /// Returns an error if the base URL is invalid or the underlying HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, user_agent: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(user_agent)?,
            base_url: endpoint_url(base_url, "")?,
        })
    }

    /// Fetch a charge, including its refund availability snapshot.
    ///
    /// # Errors
    /// Returns `RefundError::Unavailable` carrying the remote status for
    /// any non-success response, including 404 for an unknown charge.
    pub async fn get_charge(
        &self,
        account_id: &str,
        charge_id: &str,
    ) -> Result<Charge, RefundError> {
        let url = format!(
            "{}/v1/api/accounts/{account_id}/charges/{charge_id}",
            self.base_url
        );
        let span = info_span!("connector.get_charge", http.method = "GET", url = %url);
        async {
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(RefundError::Unavailable(response.status()));
            }
            Ok(response.json().await?)
        }
        .instrument(span)
        .await
    }

    /// Submit a refund for a charge. Exactly one outbound call; the
    /// authoritative availability check happens on the connector side.
    ///
    /// # Errors
    /// See [`RefundError`] for the status mapping.
    pub async fn submit_refund(
        &self,
        account_id: &str,
        charge_id: &str,
        request: RefundRequest,
    ) -> Result<RefundAccepted, RefundError> {
        let url = format!(
            "{}/v1/api/accounts/{account_id}/charges/{charge_id}/refunds",
            self.base_url
        );
        let span = info_span!(
            "connector.submit_refund",
            http.method = "POST",
            url = %url,
            amount = request.amount
        );
        async {
            let response = self.client.post(&url).json(&request).send().await?;

            match response.status() {
                StatusCode::ACCEPTED => Ok(response.json().await.unwrap_or(RefundAccepted {
                    refund_id: None,
                })),
                StatusCode::BAD_REQUEST => {
                    let rejection: RefundRejection = response
                        .json()
                        .await
                        .unwrap_or(RefundRejection { reason: None });
                    Err(RefundError::Rejected {
                        reason: rejection.reason,
                    })
                }
                StatusCode::PRECONDITION_FAILED => Err(RefundError::Conflict),
                status => Err(RefundError::Unavailable(status)),
            }
        }
        .instrument(span)
        .await
    }
}
