//! Client for the admin-users API, the service of record for identities,
//! services, roles, and permissions.
//!
//! The portal never owns this data; every operation here is a remote call
//! and the returned records live only in the caller's session or response.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{Instrument, info_span};

use super::{ClientError, endpoint_url, http_client};

const USER_RESOURCE: &str = "/v1/api/users";
const SERVICE_RESOURCE: &str = "/v1/api/services";
const FORGOTTEN_PASSWORD_RESOURCE: &str = "/v1/api/forgotten-passwords";

/// A user record as the admin-users API reports it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub external_id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub telephone_number: Option<String>,
    #[serde(default)]
    pub otp_key: Option<String>,
    #[serde(default)]
    pub gateway_account_id: Option<String>,
    #[serde(default)]
    pub services: Vec<ServiceRef>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl User {
    /// Whether this user is a member of the given service.
    #[must_use]
    pub fn belongs_to(&self, service_external_id: &str) -> bool {
        self.services
            .iter()
            .any(|service| service.external_id == service_external_id)
    }

    #[must_use]
    pub fn role_name(&self) -> Option<&str> {
        self.role.as_ref().map(|role| role.name.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceRef {
    pub external_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A forgotten-password entry (code sent to the user out of band).
#[derive(Clone, Debug, Deserialize)]
pub struct ForgottenPassword {
    pub code: String,
    pub username: String,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AdminUsersClient {
    client: Client,
    base_url: String,
}

impl AdminUsersClient {
    /// # Errors
    /// Returns an error if the base URL is invalid or the underlying HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, user_agent: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(user_agent)?,
            base_url: endpoint_url(base_url, "")?,
        })
    }

    /// Authenticate a username/password pair.
    ///
    /// # Errors
    /// `ClientError::Status(401)` for bad credentials; other non-success
    /// statuses and transport failures propagate as-is.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, ClientError> {
        let url = format!("{}{USER_RESOURCE}/authenticate", self.base_url);
        let span = info_span!(
            "adminusers.authenticate",
            http.method = "POST",
            url = %url
        );
        async {
            let response = self
                .client
                .post(&url)
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ClientError::Status(response.status()));
            }

            Ok(response.json().await?)
        }
        .instrument(span)
        .await
    }

    /// Record a successful login so the failed-attempt counter resets.
    ///
    /// # Errors
    /// Returns `ClientError::Status` for non-success statuses.
    pub async fn record_login_success(&self, username: &str) -> Result<(), ClientError> {
        let url = format!(
            "{}{USER_RESOURCE}/{username}/attempt-login?action=reset",
            self.base_url
        );
        let span = info_span!(
            "adminusers.attempt_login_reset",
            http.method = "POST",
            url = %url
        );
        async {
            let response = self.client.post(&url).send().await?;
            if !response.status().is_success() {
                return Err(ClientError::Status(response.status()));
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Fetch a single user by external id.
    ///
    /// # Errors
    /// `ClientError::Status(404)` when the user does not exist.
    pub async fn get_user(&self, external_id: &str) -> Result<User, ClientError> {
        let url = format!("{}{USER_RESOURCE}/{external_id}", self.base_url);
        let span = info_span!(
            "adminusers.get_user",
            http.method = "GET",
            url = %url
        );
        async {
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(ClientError::Status(response.status()));
            }
            Ok(response.json().await?)
        }
        .instrument(span)
        .await
    }

    /// List the users of a service.
    ///
    /// # Errors
    /// Returns `ClientError::Status` for non-success statuses.
    pub async fn service_users(&self, service_external_id: &str) -> Result<Vec<User>, ClientError> {
        let url = format!(
            "{}{SERVICE_RESOURCE}/{service_external_id}/users",
            self.base_url
        );
        let span = info_span!(
            "adminusers.service_users",
            http.method = "GET",
            url = %url
        );
        async {
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(ClientError::Status(response.status()));
            }
            Ok(response.json().await?)
        }
        .instrument(span)
        .await
    }

    /// Remove a user from a service.
    ///
    /// # Errors
    /// Returns `ClientError::Status` for non-success statuses.
    pub async fn remove_service_user(
        &self,
        service_external_id: &str,
        user_external_id: &str,
    ) -> Result<(), ClientError> {
        let url = format!(
            "{}{SERVICE_RESOURCE}/{service_external_id}/users/{user_external_id}",
            self.base_url
        );
        let span = info_span!(
            "adminusers.remove_service_user",
            http.method = "DELETE",
            url = %url
        );
        async {
            let response = self.client.delete(&url).send().await?;
            if !response.status().is_success() {
                return Err(ClientError::Status(response.status()));
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Change a user's role within a service.
    ///
    /// Remote statuses carry the interesting outcomes: 404 unknown user,
    /// 400 unknown role, 409 user not in the service, 412 the service
    /// would be left without an administrator.
    ///
    /// # Errors
    /// Returns `ClientError::Status` carrying those statuses.
    pub async fn update_service_role(
        &self,
        username: &str,
        service_external_id: &str,
        role_name: &str,
    ) -> Result<User, ClientError> {
        let url = format!(
            "{}{USER_RESOURCE}/{username}/services/{service_external_id}",
            self.base_url
        );
        let span = info_span!(
            "adminusers.update_service_role",
            http.method = "PUT",
            url = %url
        );
        async {
            let response = self
                .client
                .put(&url)
                .json(&json!({ "role_name": role_name }))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ClientError::Status(response.status()));
            }

            Ok(response.json().await?)
        }
        .instrument(span)
        .await
    }

    /// Look up a forgotten-password entry by its code.
    ///
    /// # Errors
    /// `ClientError::Status(404)` when no valid (non-expired) entry exists.
    pub async fn get_forgotten_password(
        &self,
        code: &str,
    ) -> Result<ForgottenPassword, ClientError> {
        let url = format!("{}{FORGOTTEN_PASSWORD_RESOURCE}/{code}", self.base_url);
        let span = info_span!(
            "adminusers.get_forgotten_password",
            http.method = "GET",
            url = %url
        );
        async {
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(ClientError::Status(response.status()));
            }
            Ok(response.json().await?)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use reqwest::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_body(external_id: &str, username: &str, role: &str) -> serde_json::Value {
        json!({
            "external_id": external_id,
            "username": username,
            "email": format!("{username}@example.com"),
            "telephone_number": "+447700900000",
            "services": [{"external_id": "service-1", "name": "System Generated"}],
            "permissions": ["users-service:read"],
            "role": {"name": role, "description": format!("{role}-description")}
        })
    }

    #[tokio::test]
    async fn authenticate_returns_user_on_success() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/api/users/authenticate"))
            .and(body_json(
                json!({"username": "alice", "password": "password10"}),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(user_body("u-1", "alice", "admin")),
            )
            .mount(&server)
            .await;

        let client = AdminUsersClient::new(&server.uri(), "selfservice/test")?;
        let user = client.authenticate("alice", "password10").await?;

        assert_eq!(user.username, "alice");
        assert!(user.belongs_to("service-1"));
        assert_eq!(user.role_name(), Some("admin"));
        Ok(())
    }

    #[tokio::test]
    async fn authenticate_maps_unauthorized_status() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/api/users/authenticate"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = AdminUsersClient::new(&server.uri(), "selfservice/test")?;
        let err = client
            .authenticate("alice", "wrong")
            .await
            .expect_err("expected 401");

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        Ok(())
    }

    #[tokio::test]
    async fn record_login_success_posts_reset_action() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/api/users/alice/attempt-login"))
            .and(query_param("action", "reset"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = AdminUsersClient::new(&server.uri(), "selfservice/test")?;
        client.record_login_success("alice").await?;
        Ok(())
    }

    #[tokio::test]
    async fn update_service_role_returns_updated_user() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/v1/api/users/alice/services/service-1"))
            .and(body_json(json!({"role_name": "view-and-refund"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(user_body("u-1", "alice", "view-and-refund")),
            )
            .mount(&server)
            .await;

        let client = AdminUsersClient::new(&server.uri(), "selfservice/test")?;
        let user = client
            .update_service_role("alice", "service-1", "view-and-refund")
            .await?;

        assert_eq!(user.role_name(), Some("view-and-refund"));
        Ok(())
    }

    #[tokio::test]
    async fn update_service_role_surfaces_remote_statuses() -> Result<()> {
        // 404 unknown user, 400 unknown role, 409 not in service,
        // 412 minimum admin count reached.
        for expected in [404_u16, 400, 409, 412] {
            let server = MockServer::start().await;

            Mock::given(method("PUT"))
                .and(path("/v1/api/users/someone/services/1234"))
                .respond_with(ResponseTemplate::new(expected))
                .mount(&server)
                .await;

            let client = AdminUsersClient::new(&server.uri(), "selfservice/test")?;
            let err = client
                .update_service_role("someone", "1234", "admin")
                .await
                .expect_err("expected error status");

            assert_eq!(err.status().map(|status| status.as_u16()), Some(expected));
        }
        Ok(())
    }

    #[tokio::test]
    async fn get_forgotten_password_round_trips() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/api/forgotten-passwords/existing-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "existing-code",
                "username": "alice",
                "date": "2020-12-12 16:23:01"
            })))
            .mount(&server)
            .await;

        let client = AdminUsersClient::new(&server.uri(), "selfservice/test")?;
        let entry = client.get_forgotten_password("existing-code").await?;

        assert_eq!(entry.code, "existing-code");
        assert_eq!(entry.username, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn get_forgotten_password_maps_not_found() -> Result<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/api/forgotten-passwords/non-existent-code"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = AdminUsersClient::new(&server.uri(), "selfservice/test")?;
        let err = client
            .get_forgotten_password("non-existent-code")
            .await
            .expect_err("expected 404");

        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        Ok(())
    }
}
