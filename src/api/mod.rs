//! HTTP surface of the portal: router, shared layers, and the server
//! entry point.

pub mod handlers;
pub mod paths;

use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;

use crate::clients::{
    adminusers::AdminUsersClient, connector::ConnectorClient, notify::NotifyClient,
};
use handlers::auth::session::SessionStore;

/// Static portal settings, shared through request extensions.
#[derive(Clone, Debug)]
pub struct PortalConfig {
    base_url: String,
}

impl PortalConfig {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Session cookies carry `Secure` when the portal is served over TLS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Build the application router. Tests drive this directly with
/// `tower::ServiceExt::oneshot`; the server wraps it in [`new`].
#[must_use]
pub fn app(
    config: PortalConfig,
    sessions: Arc<SessionStore>,
    adminusers: AdminUsersClient,
    connector: ConnectorClient,
    notify: NotifyClient,
) -> Router {
    let protected = Router::new()
        .route(paths::ROOT, get(handlers::root))
        .route(paths::MY_PROFILE, get(handlers::team_members::my_profile))
        .route(
            "/service/:service_external_id/team-members",
            get(handlers::team_members::index),
        )
        .route(
            "/service/:service_external_id/team-members/:user_external_id",
            get(handlers::team_members::show),
        )
        .route(
            "/service/:service_external_id/team-members/:user_external_id/delete",
            post(handlers::team_members::remove),
        )
        .route(
            "/service/:service_external_id/team-members/:user_external_id/permissions",
            post(handlers::team_members::update_permissions),
        )
        .route("/tokens/:account_id", get(handlers::tokens::index))
        .route(
            "/tokens/generate/:account_id",
            get(handlers::tokens::new_form),
        )
        .route(paths::TOKEN_GENERATE, post(handlers::tokens::generate))
        .route(
            "/transactions/:charge_id",
            get(handlers::transactions::show),
        )
        .route(
            "/transactions/:charge_id/refund",
            post(handlers::transactions::submit_refund),
        )
        .route_layer(middleware::from_fn(handlers::auth::gate));

    Router::new()
        .merge(protected)
        .route(
            paths::LOGIN,
            get(handlers::auth::login_form).post(handlers::auth::submit_login),
        )
        .route(
            paths::OTP_LOGIN,
            get(handlers::auth::otp_login_form).post(handlers::auth::submit_otp),
        )
        .route(paths::OTP_SEND_AGAIN, post(handlers::auth::resend_otp))
        .route(paths::LOGOUT, get(handlers::auth::logout))
        .route(paths::HEALTHCHECK, get(handlers::health::health))
        .layer(middleware::from_fn(handlers::auth::session::middleware))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(config))
                .layer(Extension(sessions))
                .layer(Extension(adminusers))
                .layer(Extension(connector))
                .layer(Extension(notify)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    config: PortalConfig,
    adminusers: AdminUsersClient,
    connector: ConnectorClient,
    notify: NotifyClient,
) -> Result<()> {
    let sessions = Arc::new(SessionStore::new());
    let app = app(config, sessions, adminusers, connector, notify);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
