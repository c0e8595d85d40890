//! Shared fixtures: a portal wired to mock remote services, and helpers
//! for seeding sessions at any point of the login flow.

// Not every suite uses every helper.
#![allow(dead_code)]

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{
        Request, Response,
        header::{ACCEPT, CONTENT_TYPE, COOKIE},
    },
};
use std::sync::Arc;
use wiremock::MockServer;

use selfservice::api::handlers::auth::{
    csrf,
    session::{Session, SessionStore},
};
use selfservice::api::{self, PortalConfig};
use selfservice::clients::adminusers::{AdminUsersClient, Role, ServiceRef, User};
use selfservice::clients::connector::ConnectorClient;
use selfservice::clients::notify::NotifyClient;

pub const USER_EXTERNAL_ID: &str = "7d19aff33f8948deb97ed16b2912dcd3";
pub const SERVICE_EXTERNAL_ID: &str = "s1234567890";
pub const GATEWAY_ACCOUNT_ID: &str = "182364";
pub const OTP_KEY: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";
pub const USERNAME: &str = "existing-user";
pub const TELEPHONE_NUMBER: &str = "+447700900000";

pub struct TestPortal {
    pub app: Router,
    pub sessions: Arc<SessionStore>,
    pub adminusers: MockServer,
    pub connector: MockServer,
    pub notify: MockServer,
}

pub async fn portal() -> Result<TestPortal> {
    let adminusers = MockServer::start().await;
    let connector = MockServer::start().await;
    let notify = MockServer::start().await;

    let sessions = Arc::new(SessionStore::new());
    let app = api::app(
        PortalConfig::new("http://localhost:8080"),
        sessions.clone(),
        AdminUsersClient::new(&adminusers.uri(), "selfservice/test")?,
        ConnectorClient::new(&connector.uri(), "selfservice/test")?,
        NotifyClient::new(&notify.uri(), "selfservice/test")?,
    );

    Ok(TestPortal {
        app,
        sessions,
        adminusers,
        connector,
        notify,
    })
}

pub fn user() -> User {
    User {
        external_id: USER_EXTERNAL_ID.to_string(),
        username: USERNAME.to_string(),
        email: format!("{USERNAME}@example.com"),
        telephone_number: Some(TELEPHONE_NUMBER.to_string()),
        otp_key: Some(OTP_KEY.to_string()),
        gateway_account_id: Some(GATEWAY_ACCOUNT_ID.to_string()),
        services: vec![ServiceRef {
            external_id: SERVICE_EXTERNAL_ID.to_string(),
            name: "Test service".to_string(),
        }],
        permissions: Vec::new(),
        role: Some(Role {
            name: "admin".to_string(),
            description: None,
        }),
    }
}

pub fn member(external_id: &str, username: &str, role: &str) -> serde_json::Value {
    serde_json::json!({
        "external_id": external_id,
        "username": username,
        "email": format!("{username}@example.com"),
        "services": [{"external_id": SERVICE_EXTERNAL_ID, "name": "Test service"}],
        "role": {"name": role, "description": role},
    })
}

/// A session that has completed both login steps. Returns the cookie
/// token and a valid CSRF token for form posts.
pub async fn seed_logged_in(sessions: &SessionStore, identity: User) -> Result<(String, String)> {
    seed(sessions, identity, true).await
}

/// A session that passed the password step but not the code step.
pub async fn seed_awaiting_otp(
    sessions: &SessionStore,
    identity: User,
) -> Result<(String, String)> {
    seed(sessions, identity, false).await
}

async fn seed(
    sessions: &SessionStore,
    identity: User,
    second_factor: bool,
) -> Result<(String, String)> {
    let cookie = sessions.create().await?;
    let secret = csrf::generate_secret()?;
    let csrf_token = csrf::issue_token(&secret)?;
    sessions
        .put(
            &cookie,
            Session {
                identity: Some(identity),
                second_factor,
                sent_code: true,
                csrf_secret: Some(secret),
                last_url: None,
            },
        )
        .await;
    Ok((cookie, csrf_token))
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .header(ACCEPT, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, format!("selfservice_session={cookie}"));
    }
    builder.body(Body::empty()).expect("request should build")
}

pub fn get_html(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header(ACCEPT, "text/html");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, format!("selfservice_session={cookie}"));
    }
    builder.body(Body::empty()).expect("request should build")
}

pub fn post_form(uri: &str, cookie: Option<&str>, form: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, format!("selfservice_session={cookie}"));
    }
    builder
        .body(Body::from(form.to_string()))
        .expect("request should build")
}

pub fn post_form_html(uri: &str, cookie: Option<&str>, form: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(ACCEPT, "text/html")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, format!("selfservice_session={cookie}"));
    }
    builder
        .body(Body::from(form.to_string()))
        .expect("request should build")
}

pub async fn json_body(response: Response<Body>) -> Result<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub async fn text_body(response: Response<Body>) -> Result<String> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .and_then(|cookie| cookie.strip_prefix("selfservice_session="))
        .and_then(|rest| rest.split(';').next())
        .map(ToString::to_string)
}
