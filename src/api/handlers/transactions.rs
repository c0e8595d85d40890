//! Transaction detail and refund submission.
//!
//! The refund form carries the availability figure the user last saw;
//! it is echoed to the connector unchanged so the authoritative check
//! happens there, never locally.

use axum::{
    Extension, Form, Json,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::api::paths;
use crate::clients::connector::{
    ConnectorClient, REASON_AMOUNT_MIN_VALIDATION, REASON_AMOUNT_NOT_AVAILABLE, REASON_FULL,
    RefundError, RefundRequest,
};
use crate::currency;

use super::auth::{
    Principal, csrf_guard, form_token,
    session::{SessionId, SessionStore},
};
use super::{found, html_page, message_response, server_error, wants_json};

pub(crate) const REFUND_INVALID_AMOUNT_MESSAGE: &str =
    "Can't do refund: amount must be pounds (10) or pounds and pence (10.10)";
pub(crate) const REFUND_NOT_AVAILABLE_MESSAGE: &str =
    "Can't do refund: The requested amount is bigger than the amount available for refund";
pub(crate) const REFUND_MIN_AMOUNT_MESSAGE: &str =
    "Can't do refund: The requested amount is less than the minimum accepted for issuing a refund for this charge";
pub(crate) const REFUND_FULL_MESSAGE: &str =
    "Can't do refund: This charge has been already fully refunded";
pub(crate) const REFUND_FAILED_MESSAGE: &str = "Can't process refund";
pub(crate) const REFUND_RESUBMITTED_MESSAGE: &str =
    "Refund failed. This refund request has already been submitted.";

#[derive(Debug, Deserialize)]
pub struct RefundForm {
    #[serde(rename = "refund-amount", default)]
    pub refund_amount: String,
    #[serde(rename = "refund-amount-available-in-pence", default)]
    pub refund_amount_available_in_pence: String,
    #[serde(rename = "csrfToken", default)]
    pub csrf_token: Option<String>,
}

/// Charge detail page with the refund form.
pub async fn show(
    Path(charge_id): Path<String>,
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(connector): Extension<ConnectorClient>,
    Extension(Principal(user)): Extension<Principal>,
) -> Response {
    let Some(account_id) = user.gateway_account_id.as_deref() else {
        error!("user {} has no gateway account", user.external_id);
        return server_error(&headers);
    };

    let charge = match connector.get_charge(account_id, &charge_id).await {
        Ok(charge) => charge,
        Err(RefundError::Unavailable(StatusCode::NOT_FOUND)) => {
            return message_response(&headers, StatusCode::NOT_FOUND, "Transaction not found");
        }
        Err(err) => {
            error!("failed to fetch charge {charge_id}: {err}");
            return server_error(&headers);
        }
    };

    let Some(mut session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    let token = match form_token(&store, &sid.0, &mut session).await {
        Ok(token) => token,
        Err(err) => {
            error!("failed to issue refund form token: {err}");
            return server_error(&headers);
        }
    };

    if wants_json(&headers) {
        return Json(json!({
            "charge_id": charge.charge_id,
            "amount": charge.amount,
            "refund_amount_available": charge.refund_summary.amount_available,
            "csrfToken": token,
        }))
        .into_response();
    }

    let body = format!(
        r#"<h1>Transaction {charge_id}</h1>
<form id="refundForm" method="post" action="{action}">
  <label for="refund-amount">Refund amount</label>
  <input id="refund-amount" name="refund-amount" type="text">
  <input name="refund-amount-available-in-pence" type="hidden" value="{available}">
  <input name="csrfToken" type="hidden" value="{token}">
  <button id="refundButton" type="submit">Confirm refund</button>
</form>"#,
        action = paths::transaction_refund(&charge_id),
        available = charge.refund_summary.amount_available,
    );
    html_page(&format!("Transaction {charge_id}"), &body).into_response()
}

/// Refund submission. Parses the entered amount into pence, echoes the
/// availability snapshot, and maps the connector's answer to the fixed
/// user-facing messages.
pub async fn submit_refund(
    Path(charge_id): Path<String>,
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(connector): Extension<ConnectorClient>,
    Extension(Principal(user)): Extension<Principal>,
    Form(form): Form<RefundForm>,
) -> Response {
    let Some(session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    if let Err(response) = csrf_guard(&headers, &session, form.csrf_token.as_deref()) {
        return response;
    }

    let Ok(amount) = currency::parse_pounds_to_pence(form.refund_amount.trim()) else {
        return message_response(&headers, StatusCode::OK, REFUND_INVALID_AMOUNT_MESSAGE);
    };
    let Ok(refund_amount_available) =
        currency::parse_pence(form.refund_amount_available_in_pence.trim())
    else {
        return message_response(&headers, StatusCode::OK, REFUND_FAILED_MESSAGE);
    };
    let Some(account_id) = user.gateway_account_id.as_deref() else {
        error!("user {} has no gateway account", user.external_id);
        return server_error(&headers);
    };

    let request = RefundRequest {
        amount,
        refund_amount_available,
    };

    match connector
        .submit_refund(account_id, &charge_id, request)
        .await
    {
        Ok(_) => found(&paths::transaction_detail(&charge_id)),
        Err(RefundError::Rejected { reason }) => {
            let message = match reason.as_deref() {
                Some(REASON_AMOUNT_NOT_AVAILABLE) => REFUND_NOT_AVAILABLE_MESSAGE,
                Some(REASON_AMOUNT_MIN_VALIDATION) => REFUND_MIN_AMOUNT_MESSAGE,
                Some(REASON_FULL) => REFUND_FULL_MESSAGE,
                _ => REFUND_FAILED_MESSAGE,
            };
            message_response(&headers, StatusCode::OK, message)
        }
        Err(RefundError::Conflict) => {
            message_response(&headers, StatusCode::OK, REFUND_RESUBMITTED_MESSAGE)
        }
        Err(err) => {
            error!("refund submission for {charge_id} failed: {err}");
            message_response(&headers, StatusCode::OK, REFUND_FAILED_MESSAGE)
        }
    }
}
