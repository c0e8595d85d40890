//! Request handlers for the portal.
//!
//! Every handler negotiates its body on the `Accept` header: API-style
//! callers get JSON, browsers get a minimal HTML page. Redirects and
//! status codes are identical either way.

pub mod auth;
pub mod health;
pub mod team_members;
pub mod tokens;
pub mod transactions;

use axum::{
    Extension, Json,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{ACCEPT, LOCATION},
    },
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use auth::Principal;

/// The one message a caller sees when a state-changing request arrives
/// without a usable CSRF token.
pub(crate) const PLATFORM_PROBLEM_MESSAGE: &str = "There is a problem with the payments platform";

pub(crate) fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| {
            accept.split(',').any(|part| {
                let mime = part.split(';').next().unwrap_or("").trim();
                mime == "application/json"
            })
        })
}

/// A `{"message": ...}` body or its HTML equivalent.
pub(crate) fn message_response(headers: &HeaderMap, status: StatusCode, message: &str) -> Response {
    if wants_json(headers) {
        (status, Json(json!({ "message": message }))).into_response()
    } else {
        let body = format!(r#"<p id="message">{message}</p>"#);
        (status, html_page(message, &body)).into_response()
    }
}

/// CSRF failure response: deliberately a plain 200 with the generic
/// platform message, never a 403 that would leak the mechanism.
pub(crate) fn platform_problem(headers: &HeaderMap) -> Response {
    message_response(headers, StatusCode::OK, PLATFORM_PROBLEM_MESSAGE)
}

/// 302 Found. Every navigation redirect in the portal uses this status,
/// on the gate, after login steps, and after form submissions alike.
pub(crate) fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = StatusCode::FOUND.into_response();
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(err) => {
            error!("invalid redirect target {location}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub(crate) fn server_error(headers: &HeaderMap) -> Response {
    message_response(
        headers,
        StatusCode::INTERNAL_SERVER_ERROR,
        PLATFORM_PROBLEM_MESSAGE,
    )
}

pub(crate) fn html_page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n{body}\n</body>\n</html>\n"
    ))
}

/// Landing page behind the gate.
pub async fn root(headers: HeaderMap, Extension(Principal(user)): Extension<Principal>) -> Response {
    if wants_json(&headers) {
        return Json(json!({
            "username": user.username,
            "email": user.email,
        }))
        .into_response();
    }
    let body = format!(
        r#"<h1>Dashboard</h1>
<p id="signed-in-as">Signed in as {username}</p>"#,
        username = user.username
    );
    html_page("Dashboard", &body).into_response()
}
