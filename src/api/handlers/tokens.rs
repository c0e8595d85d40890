//! Developer API token pages.
//!
//! Keys are minted locally and shown exactly once; the portal keeps no
//! copy of the plaintext after the response is rendered.

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

use super::auth::{
    Principal, csrf_guard, form_token, generate_token,
    session::{SessionId, SessionStore},
};
use super::{html_page, message_response, server_error, wants_json};

const ACCOUNT_NOT_FOUND_MESSAGE: &str = "Account not found";
const DESCRIPTION_MAX_LENGTH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct GenerateTokenForm {
    #[serde(rename = "accountId", default)]
    pub account_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "csrfToken", default)]
    pub csrf_token: Option<String>,
}

fn owns_account(user: &crate::clients::adminusers::User, account_id: &str) -> bool {
    user.gateway_account_id.as_deref() == Some(account_id)
}

/// Token landing page for a gateway account.
pub async fn index(
    Path(account_id): Path<String>,
    headers: HeaderMap,
    Extension(Principal(user)): Extension<Principal>,
) -> Response {
    if !owns_account(&user, &account_id) {
        return message_response(&headers, StatusCode::NOT_FOUND, ACCOUNT_NOT_FOUND_MESSAGE);
    }

    if wants_json(&headers) {
        return Json(json!({ "account_id": account_id })).into_response();
    }

    let body = format!(
        r#"<h1>Generate developer tokens for account '{account_id}'</h1>
<a id="generateLink" href="{generate}">Generate a new key</a>
<input id="generateButton" type="button" value="Generate a new key">"#,
        generate = paths::token_generate_form(&account_id),
    );
    html_page("Developer tokens", &body).into_response()
}

/// Form for describing and generating a new key.
pub async fn new_form(
    Path(account_id): Path<String>,
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(Principal(user)): Extension<Principal>,
) -> Response {
    if !owns_account(&user, &account_id) {
        return message_response(&headers, StatusCode::NOT_FOUND, ACCOUNT_NOT_FOUND_MESSAGE);
    }

    let Some(mut session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    let token = match form_token(&store, &sid.0, &mut session).await {
        Ok(token) => token,
        Err(err) => {
            error!("failed to issue token form token: {err}");
            return server_error(&headers);
        }
    };

    if wants_json(&headers) {
        return Json(json!({ "account_id": account_id, "csrfToken": token })).into_response();
    }

    let body = format!(
        r#"<h1>Generate developer tokens for account '{account_id}'</h1>
<form id="generateForm" method="post" action="{action}">
  <label for="description">Description</label>
  <input id="description" name="description" type="text" maxlength="{max}">
  <input name="accountId" type="hidden" value="{account_id}">
  <input name="csrfToken" type="hidden" value="{token}">
  <input id="generateButton" type="submit" value="Generate key">
</form>
<a id="cancelLink" href="{cancel}">Cancel</a>"#,
        action = paths::TOKEN_GENERATE,
        max = DESCRIPTION_MAX_LENGTH,
        cancel = paths::token_index(&account_id),
    );
    html_page("Generate a key", &body).into_response()
}

/// Mint a key and show it, once.
pub async fn generate(
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(Principal(user)): Extension<Principal>,
    Form(form): Form<GenerateTokenForm>,
) -> Response {
    let Some(session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    if let Err(response) = csrf_guard(&headers, &session, form.csrf_token.as_deref()) {
        return response;
    }
    if !owns_account(&user, &form.account_id) {
        return message_response(&headers, StatusCode::NOT_FOUND, ACCOUNT_NOT_FOUND_MESSAGE);
    }

    let description: String = form.description.chars().take(DESCRIPTION_MAX_LENGTH).collect();

    let token = match generate_token() {
        Ok(token) => token,
        Err(err) => {
            error!("failed to generate developer token: {err}");
            return server_error(&headers);
        }
    };

    if wants_json(&headers) {
        return Json(json!({
            "account_id": form.account_id,
            "description": description,
            "token": token,
        }))
        .into_response();
    }

    let body = format!(
        r#"<h1>New key generated for account '{account_id}'</h1>
<h2>Please copy this key now as it won't be shown again</h2>
<p id="token">{token}</p>
<p id="description">{description}</p>
<a id="finishLink" href="{finish}">Finish</a>"#,
        account_id = form.account_id,
        finish = paths::token_index(&form.account_id),
    );
    html_page("New key generated", &body).into_response()
}
