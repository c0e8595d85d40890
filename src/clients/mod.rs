//! HTTP clients for the remote services the portal fronts.
//!
//! The portal owns no data of record: identities live in the admin-users
//! API, charges and refunds in the payment connector, and one-time codes go
//! out through the notification service. Each client is a thin capability
//! set over `reqwest` with a span per outbound call.

pub mod adminusers;
pub mod connector;
pub mod notify;

use anyhow::{Result, anyhow};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Error shared by the admin-users and notification clients.
///
/// Callers branch on the remote status code (404 "user gone", 412
/// "minimum admin count" and so on), so it is kept as data rather than
/// flattened into a message.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("remote service returned status {0}")]
    Status(StatusCode),
    #[error("request failed")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// Remote status code, when the service answered at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(status) => Some(*status),
            Self::Transport(err) => err.status(),
        }
    }
}

pub(crate) fn http_client(user_agent: &str) -> Result<Client> {
    Ok(Client::builder().user_agent(user_agent).build()?)
}

/// Join a base URL and a path into a full endpoint URL.
///
/// # Errors
/// Returns an error if `base` cannot be parsed, has no host, or uses an
/// unsupported scheme.
pub fn endpoint_url(base: &str, path: &str) -> Result<String> {
    let url = Url::parse(base)?;

    let scheme = url.scheme();

    let host = url
        .host()
        .ok_or_else(|| anyhow!("Error parsing URL: no host specified"))?
        .to_owned();

    let port = match url.port() {
        Some(p) => p,
        None => match scheme {
            "http" => 80,
            "https" => 443,
            _ => return Err(anyhow!("Error parsing URL: unsupported scheme {scheme}")),
        },
    };

    let endpoint_url = format!("{scheme}://{host}:{port}{path}");

    debug!("endpoint URL: {}", endpoint_url);

    Ok(endpoint_url)
}
