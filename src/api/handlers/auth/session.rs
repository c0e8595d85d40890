//! Per-visitor session state and the cookie-backed session middleware.
//!
//! The session is an explicit context object with a fixed schema rather
//! than ambient state: authenticated identity, second-factor flag,
//! "code already sent" flag, CSRF secret, and the last requested URL.
//! Records live in an in-process store keyed by an opaque cookie token.

use axum::{
    extract::Request,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{InvalidHeaderValue, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::error;

use crate::api::PortalConfig;
use crate::clients::adminusers::User;

const SESSION_COOKIE_NAME: &str = "selfservice_session";

/// Where the caller sits in the login flow, derived per request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthnState {
    NoIdentity,
    IdentityNoSecondFactor,
    FullyAuthenticated,
}

/// Per-visitor session record.
#[derive(Clone, Debug, Default)]
pub struct Session {
    /// Identity established by a successful password login.
    pub identity: Option<User>,
    /// Whether the second factor has been completed this session.
    pub second_factor: bool,
    /// Whether a one-time code has already been sent this session.
    pub sent_code: bool,
    /// Secret backing CSRF tokens for rendered forms.
    pub csrf_secret: Option<String>,
    /// URL the caller asked for before being redirected to log in.
    pub last_url: Option<String>,
}

impl Session {
    #[must_use]
    pub fn state(&self) -> AuthnState {
        match (&self.identity, self.second_factor) {
            (None, _) => AuthnState::NoIdentity,
            (Some(_), false) => AuthnState::IdentityNoSecondFactor,
            (Some(_), true) => AuthnState::FullyAuthenticated,
        }
    }
}

/// In-process session store. Consistency across requests is this mutex;
/// nothing else in the portal is shared mutable state.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh empty session and return its cookie token.
    ///
    /// # Errors
    /// Returns an error if random token generation fails.
    pub async fn create(&self) -> anyhow::Result<String> {
        let token = super::generate_token()?;
        self.sessions
            .lock()
            .await
            .insert(token.clone(), Session::default());
        Ok(token)
    }

    pub async fn get(&self, token: &str) -> Option<Session> {
        self.sessions.lock().await.get(token).cloned()
    }

    /// Insert or replace a session. Also how tests seed login state.
    pub async fn put(&self, token: &str, session: Session) {
        self.sessions
            .lock()
            .await
            .insert(token.to_string(), session);
    }

    pub async fn remove(&self, token: &str) {
        self.sessions.lock().await.remove(token);
    }
}

/// Cookie token of the current request's session, for handler use.
#[derive(Clone, Debug)]
pub struct SessionId(pub String);

/// Ensure every request has a live session: reuse the cookie's session
/// when the store still knows it, otherwise mint a new one and set the
/// cookie on the way out. Expired cookies just get a fresh session.
pub async fn middleware(mut request: Request, next: Next) -> Response {
    let Some(store) = request.extensions().get::<Arc<SessionStore>>().cloned() else {
        error!("session store extension missing");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let cookie_secure = request
        .extensions()
        .get::<PortalConfig>()
        .is_some_and(PortalConfig::cookie_secure);

    let presented = extract_session_token(request.headers());
    let (token, created) = match presented {
        Some(token) if store.get(&token).await.is_some() => (token, false),
        _ => match store.create().await {
            Ok(token) => (token, true),
            Err(err) => {
                error!("failed to create session: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
    };

    request.extensions_mut().insert(SessionId(token.clone()));

    let mut response = next.run(request).await;

    if created {
        if let Ok(cookie) = session_cookie(&token, cookie_secure) {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
    }
    response
}

/// Build the `HttpOnly` session cookie.
pub(crate) fn session_cookie(
    token: &str,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}
