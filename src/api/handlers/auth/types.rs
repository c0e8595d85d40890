//! Form payloads for the login flow.
//!
//! Every field defaults so that a missing or partial body still reaches
//! the handler; the CSRF check must run before any field validation.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "csrfToken", default)]
    pub csrf_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OtpForm {
    #[serde(default)]
    pub code: String,
    #[serde(rename = "csrfToken", default)]
    pub csrf_token: Option<String>,
}

/// For POSTs that carry nothing but the CSRF token.
#[derive(Debug, Deserialize)]
pub struct CsrfForm {
    #[serde(rename = "csrfToken", default)]
    pub csrf_token: Option<String>,
}
