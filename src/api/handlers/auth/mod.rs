//! Login flow: password step, SMS one-time code step, and the gate that
//! protects everything else.

pub mod csrf;
pub mod otp;
pub mod session;
pub mod types;

use anyhow::{Result, anyhow};
use axum::{
    Extension, Form, Json,
    extract::Request,
    http::{HeaderMap, Method, StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::{PortalConfig, paths};
use crate::clients::adminusers::{AdminUsersClient, User};
use crate::clients::notify::NotifyClient;

use super::{found, html_page, message_response, platform_problem, server_error, wants_json};
use session::{AuthnState, Session, SessionId, SessionStore};
use types::{CsrfForm, LoginForm, OtpForm};

pub(crate) const INVALID_LOGIN_MESSAGE: &str = "Invalid username or password";
pub(crate) const INVALID_CODE_MESSAGE: &str = "Invalid verification code";
const CODE_DELIVERY_PROBLEM: &str = "There is a problem sending your verification code";

/// The fully authenticated user, inserted by the gate for handlers
/// behind it.
#[derive(Clone, Debug)]
pub struct Principal(pub User);

/// Opaque URL-safe token, also used for developer API keys.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub(crate) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Authentication gate for the protected routes.
///
/// No identity redirects to the password step, a missing second factor
/// redirects to the code step; either way the requested URL is recorded
/// so login can resume there. Fully authenticated requests pass through
/// with a [`Principal`] extension attached.
pub async fn gate(mut request: Request, next: Next) -> Response {
    let Some(store) = request.extensions().get::<Arc<SessionStore>>().cloned() else {
        error!("session store extension missing");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let Some(sid) = request.extensions().get::<SessionId>().cloned() else {
        error!("session id extension missing");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let Some(mut session) = store.get(&sid.0).await else {
        return found(paths::LOGIN);
    };

    // Owned before any await; the request body stays out of the future.
    let destination = requested_url(&request);

    match session.state() {
        AuthnState::NoIdentity => {
            record_last_url(&store, &sid.0, &mut session, destination).await;
            found(paths::LOGIN)
        }
        AuthnState::IdentityNoSecondFactor => {
            record_last_url(&store, &sid.0, &mut session, destination).await;
            found(paths::OTP_LOGIN)
        }
        AuthnState::FullyAuthenticated => {
            if let Some(user) = session.identity {
                request.extensions_mut().insert(Principal(user));
            }
            next.run(request).await
        }
    }
}

/// The URL to resume after login, for navigable requests only.
fn requested_url(request: &Request) -> Option<String> {
    if request.method() != Method::GET {
        return None;
    }
    Some(
        request
            .uri()
            .path_and_query()
            .map_or_else(|| request.uri().path().to_string(), ToString::to_string),
    )
}

/// Remember where the caller was headed.
async fn record_last_url(store: &SessionStore, sid: &str, session: &mut Session, url: Option<String>) {
    let Some(url) = url else { return };
    session.last_url = Some(url);
    store.put(sid, session.clone()).await;
}

/// Fail-safe CSRF check for every state-changing handler.
///
/// A session without a secret is treated exactly like a bad token: the
/// caller gets the platform-problem message and the handler never runs
/// its collaborators.
pub(crate) fn csrf_guard(
    headers: &HeaderMap,
    session: &Session,
    submitted: Option<&str>,
) -> Result<(), Response> {
    let Some(secret) = session.csrf_secret.as_deref() else {
        return Err(platform_problem(headers));
    };
    match submitted {
        Some(token) if csrf::verify_token(secret, token) => Ok(()),
        _ => Err(platform_problem(headers)),
    }
}

/// Make sure the session has a CSRF secret and issue a token for a form.
pub(crate) async fn form_token(
    store: &SessionStore,
    sid: &str,
    session: &mut Session,
) -> Result<String> {
    if session.csrf_secret.is_none() {
        session.csrf_secret = Some(csrf::generate_secret()?);
        store.put(sid, session.clone()).await;
    }
    let secret = session
        .csrf_secret
        .as_deref()
        .ok_or_else(|| anyhow!("session lost its CSRF secret"))?;
    csrf::issue_token(secret)
}

pub async fn login_form(
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
) -> Response {
    let Some(mut session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    let token = match form_token(&store, &sid.0, &mut session).await {
        Ok(token) => token,
        Err(err) => {
            error!("failed to issue login form token: {err}");
            return server_error(&headers);
        }
    };

    if wants_json(&headers) {
        return Json(json!({ "csrfToken": token })).into_response();
    }

    let body = format!(
        r#"<form id="loginForm" method="post" action="{login}">
  <label for="username">Email address</label>
  <input id="username" name="username" type="text" autofocus>
  <label for="password">Password</label>
  <input id="password" name="password" type="password">
  <input name="csrfToken" type="hidden" value="{token}">
  <button id="loginButton" type="submit">Sign in</button>
</form>"#,
        login = paths::LOGIN
    );
    html_page("Sign in", &body).into_response()
}

pub async fn submit_login(
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(adminusers): Extension<AdminUsersClient>,
    Form(form): Form<LoginForm>,
) -> Response {
    let Some(session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    if let Err(response) = csrf_guard(&headers, &session, form.csrf_token.as_deref()) {
        return response;
    }

    match adminusers.authenticate(&form.username, &form.password).await {
        Ok(user) => {
            let secret = match csrf::generate_secret() {
                Ok(secret) => secret,
                Err(err) => {
                    error!("failed to rotate CSRF secret: {err}");
                    return server_error(&headers);
                }
            };
            // Fresh session on privilege change; only the intended
            // destination survives.
            let fresh = Session {
                identity: Some(user),
                second_factor: false,
                sent_code: false,
                csrf_secret: Some(secret),
                last_url: session.last_url,
            };
            store.put(&sid.0, fresh).await;
            found(paths::OTP_LOGIN)
        }
        Err(err) if err.status() == Some(StatusCode::UNAUTHORIZED) => {
            message_response(&headers, StatusCode::UNAUTHORIZED, INVALID_LOGIN_MESSAGE)
        }
        Err(err) => {
            error!("authentication call failed: {err}");
            server_error(&headers)
        }
    }
}

pub async fn otp_login_form(
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(notify): Extension<NotifyClient>,
) -> Response {
    let Some(mut session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    let Some(user) = session.identity.clone() else {
        return found(paths::LOGIN);
    };

    if !session.sent_code {
        if let Err(err) = send_code(&notify, &user).await {
            error!("failed to send verification code: {err}");
            return message_response(
                &headers,
                StatusCode::INTERNAL_SERVER_ERROR,
                CODE_DELIVERY_PROBLEM,
            );
        }
        session.sent_code = true;
        store.put(&sid.0, session.clone()).await;
    }

    let token = match form_token(&store, &sid.0, &mut session).await {
        Ok(token) => token,
        Err(err) => {
            error!("failed to issue verification form token: {err}");
            return server_error(&headers);
        }
    };

    if wants_json(&headers) {
        return Json(json!({ "csrfToken": token })).into_response();
    }

    let body = format!(
        r#"<p>We have sent a verification code to your phone.</p>
<form id="otpForm" method="post" action="{otp_login}">
  <label for="code">Verification code</label>
  <input id="code" name="code" type="text" inputmode="numeric" autofocus>
  <input name="csrfToken" type="hidden" value="{token}">
  <button id="otpButton" type="submit">Continue</button>
</form>
<form id="otpResendForm" method="post" action="{resend}">
  <input name="csrfToken" type="hidden" value="{token}">
  <button id="otpResendButton" type="submit">Send the code again</button>
</form>"#,
        otp_login = paths::OTP_LOGIN,
        resend = paths::OTP_SEND_AGAIN
    );
    html_page("Check your phone", &body).into_response()
}

pub async fn submit_otp(
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(adminusers): Extension<AdminUsersClient>,
    Form(form): Form<OtpForm>,
) -> Response {
    let Some(mut session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    if let Err(response) = csrf_guard(&headers, &session, form.csrf_token.as_deref()) {
        return response;
    }
    let Some(user) = session.identity.clone() else {
        return found(paths::LOGIN);
    };
    let Some(otp_key) = user.otp_key.as_deref() else {
        error!("user {} has no OTP key", user.external_id);
        return server_error(&headers);
    };

    if !otp::verify_code(otp_key, &user.username, form.code.trim()) {
        return message_response(&headers, StatusCode::UNAUTHORIZED, INVALID_CODE_MESSAGE);
    }

    session.second_factor = true;
    let destination = session
        .last_url
        .take()
        .unwrap_or_else(|| paths::ROOT.to_string());
    store.put(&sid.0, session).await;

    // Reset the lockout counter out of band; login must not wait on it.
    let client = adminusers.clone();
    let username = user.username.clone();
    tokio::spawn(async move {
        if let Err(err) = client.record_login_success(&username).await {
            warn!("failed to reset login attempts for {username}: {err}");
        }
    });

    found(&destination)
}

pub async fn resend_otp(
    headers: HeaderMap,
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(notify): Extension<NotifyClient>,
    Form(form): Form<CsrfForm>,
) -> Response {
    let Some(mut session) = store.get(&sid.0).await else {
        return server_error(&headers);
    };
    if let Err(response) = csrf_guard(&headers, &session, form.csrf_token.as_deref()) {
        return response;
    }
    let Some(user) = session.identity.clone() else {
        return found(paths::LOGIN);
    };

    if let Err(err) = send_code(&notify, &user).await {
        error!("failed to resend verification code: {err}");
        return message_response(
            &headers,
            StatusCode::INTERNAL_SERVER_ERROR,
            CODE_DELIVERY_PROBLEM,
        );
    }
    session.sent_code = true;
    store.put(&sid.0, session).await;

    found(paths::OTP_LOGIN)
}

pub async fn logout(
    Extension(store): Extension<Arc<SessionStore>>,
    Extension(sid): Extension<SessionId>,
    Extension(config): Extension<PortalConfig>,
) -> Response {
    store.remove(&sid.0).await;

    let mut response = found(paths::LOGIN);
    if let Ok(cookie) = session::clear_session_cookie(config.cookie_secure()) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

async fn send_code(notify: &NotifyClient, user: &User) -> Result<()> {
    let otp_key = user
        .otp_key
        .as_deref()
        .ok_or_else(|| anyhow!("user {} has no OTP key", user.external_id))?;
    let phone = user
        .telephone_number
        .as_deref()
        .ok_or_else(|| anyhow!("user {} has no telephone number", user.external_id))?;
    let code = otp::current_code(otp_key, &user.username)?;
    notify.send_otp_sms(phone, &code).await?;
    Ok(())
}
