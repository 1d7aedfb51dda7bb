//! Keycloak admin REST API client.
//!
//! Every request carries a bearer token from the password grant. The token is
//! reused across calls until [`EXPIRY_MARGIN`](super::token::EXPIRY_MARGIN)
//! before it expires; a 401 from any admin endpoint clears it.

use std::sync::Arc;
use std::time::Instant;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use urlencoding::encode;

use super::BrokerError;
use super::token::{AdminToken, TokenCache, TokenResponse};
use crate::config::KeycloakConfig;

/// A role as the admin API represents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRepresentation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RoleRepresentation {
    /// A role to be created, with no id yet.
    #[must_use]
    pub fn named(name: &str, description: Option<&str>) -> Self {
        Self {
            id: String::new(),
            name: name.to_owned(),
            description: description.map(str::to_owned),
        }
    }
}

/// Payload for creating a user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRemoteUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub enabled: bool,
    pub email_verified: bool,
    pub credentials: Vec<PasswordCredential<'a>>,
}

/// Payload for updating a user's profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUserUpdate<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub enabled: bool,
    pub email_verified: bool,
}

/// A non-temporary password credential.
#[derive(Debug, Serialize)]
pub struct PasswordCredential<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: &'a str,
    pub temporary: bool,
}

impl<'a> PasswordCredential<'a> {
    #[must_use]
    pub const fn permanent(value: &'a str) -> Self {
        Self {
            kind: "password",
            value,
            temporary: false,
        }
    }
}

#[derive(Deserialize)]
struct ClientRepresentation {
    id: String,
    #[serde(rename = "clientId")]
    client_id: String,
}

/// Keycloak admin API client.
///
/// Cheap to clone; clones share the HTTP connection pool and the admin token.
#[derive(Clone)]
pub struct KeycloakAdminClient {
    inner: Arc<KeycloakAdminClientInner>,
}

struct KeycloakAdminClientInner {
    http: reqwest::Client,
    config: KeycloakConfig,
    token: TokenCache,
}

impl KeycloakAdminClient {
    /// Create a client for the configured broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &KeycloakConfig) -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(KeycloakAdminClientInner {
                http,
                config: config.clone(),
                token: TokenCache::default(),
            }),
        })
    }

    fn realm_url(&self, path: &str) -> String {
        let config = &self.inner.config;
        format!(
            "{}/admin/realms/{}{path}",
            config.base_url,
            encode(&config.realm)
        )
    }

    fn user_url(&self, remote_id: &str, tail: &str) -> String {
        self.realm_url(&format!("/users/{}{tail}", encode(remote_id)))
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Obtain an admin token, reusing the cached one while it is fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the password grant fails.
    #[instrument(skip(self))]
    pub async fn admin_token(&self) -> Result<SecretString, BrokerError> {
        if let Some(token) = self.inner.token.fresh().await {
            return Ok(token);
        }

        let config = &self.inner.config;
        let url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            config.base_url,
            encode(&config.realm)
        );
        let requested_at = Instant::now();
        let response = self
            .inner
            .http
            .post(url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", config.admin_client_id.as_str()),
                ("username", config.admin_username.as_str()),
                ("password", config.admin_password.expose_secret()),
            ])
            .send()
            .await?;

        let response = check("admin token", response).await?;
        let body: TokenResponse = response.json().await?;
        let token = AdminToken::new(
            SecretString::from(body.access_token),
            std::time::Duration::from_secs(body.expires_in),
            requested_at,
        );
        let access_token = token.access_token.clone();
        self.inner.token.store(token).await;
        tracing::debug!(expires_in = body.expires_in, "Acquired broker admin token");

        Ok(access_token)
    }

    /// Send an authenticated request and check its status.
    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BrokerError> {
        let token = self.admin_token().await?;
        let response = request.bearer_auth(token.expose_secret()).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.inner.token.clear().await;
            return Err(BrokerError::Unauthorized(operation));
        }
        check(operation, response).await
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create a user and return the id from the `Location` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the header is missing.
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create_user(&self, user: &NewRemoteUser<'_>) -> Result<String, BrokerError> {
        let request = self.inner.http.post(self.realm_url("/users")).json(user);
        let response = self.send("create user", request).await?;

        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .ok_or(BrokerError::MissingLocation)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, update), fields(username = %update.username))]
    pub async fn update_user(
        &self,
        remote_id: &str,
        update: &RemoteUserUpdate<'_>,
    ) -> Result<(), BrokerError> {
        let request = self.inner.http.put(self.user_url(remote_id, "")).json(update);
        self.send("update user", request).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn set_enabled(&self, remote_id: &str, enabled: bool) -> Result<(), BrokerError> {
        let request = self
            .inner
            .http
            .put(self.user_url(remote_id, ""))
            .json(&serde_json::json!({ "enabled": enabled }));
        self.send("set enabled", request).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, password))]
    pub async fn reset_password(&self, remote_id: &str, password: &str) -> Result<(), BrokerError> {
        let request = self
            .inner
            .http
            .put(self.user_url(remote_id, "/reset-password"))
            .json(&PasswordCredential::permanent(password));
        self.send("reset password", request).await?;
        Ok(())
    }

    // =========================================================================
    // Realm roles
    // =========================================================================

    /// Look up a realm role by name; `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails with anything other than 404.
    #[instrument(skip(self))]
    pub async fn realm_role(&self, name: &str) -> Result<Option<RoleRepresentation>, BrokerError> {
        let request = self
            .inner
            .http
            .get(self.realm_url(&format!("/roles/{}", encode(name))));
        match self.send("get realm role", request).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(BrokerError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create a realm role. An existing role (409) counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, role), fields(role = %role.name))]
    pub async fn create_realm_role(&self, role: &RoleRepresentation) -> Result<(), BrokerError> {
        let request = self.inner.http.post(self.realm_url("/roles")).json(role);
        match self.send("create realm role", request).await {
            Ok(_) | Err(BrokerError::Status { status: 409, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn user_realm_roles(
        &self,
        remote_id: &str,
    ) -> Result<Vec<RoleRepresentation>, BrokerError> {
        let request = self
            .inner
            .http
            .get(self.user_url(remote_id, "/role-mappings/realm"));
        Ok(self.send("list realm mappings", request).await?.json().await?)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, roles), fields(count = roles.len()))]
    pub async fn remove_user_realm_roles(
        &self,
        remote_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<(), BrokerError> {
        let request = self
            .inner
            .http
            .delete(self.user_url(remote_id, "/role-mappings/realm"))
            .json(roles);
        self.send("remove realm mappings", request).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, roles), fields(count = roles.len()))]
    pub async fn add_user_realm_roles(
        &self,
        remote_id: &str,
        roles: &[RoleRepresentation],
    ) -> Result<(), BrokerError> {
        let request = self
            .inner
            .http
            .post(self.user_url(remote_id, "/role-mappings/realm"))
            .json(roles);
        self.send("add realm mappings", request).await?;
        Ok(())
    }

    // =========================================================================
    // Client roles
    // =========================================================================

    /// Resolve the internal id of a client from its `clientId`.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotFound` if no client matches.
    #[instrument(skip(self))]
    pub async fn client_uuid(&self, client_id: &str) -> Result<String, BrokerError> {
        let request = self
            .inner
            .http
            .get(self.realm_url("/clients"))
            .query(&[("clientId", client_id)]);
        let clients: Vec<ClientRepresentation> =
            self.send("find client", request).await?.json().await?;

        clients
            .into_iter()
            .find(|c| c.client_id == client_id)
            .map(|c| c.id)
            .ok_or_else(|| BrokerError::ClientNotFound(client_id.to_owned()))
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn client_roles(
        &self,
        client_uuid: &str,
    ) -> Result<Vec<RoleRepresentation>, BrokerError> {
        let request = self
            .inner
            .http
            .get(self.realm_url(&format!("/clients/{}/roles", encode(client_uuid))));
        Ok(self.send("list client roles", request).await?.json().await?)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn client_role(
        &self,
        client_uuid: &str,
        name: &str,
    ) -> Result<RoleRepresentation, BrokerError> {
        let request = self.inner.http.get(self.realm_url(&format!(
            "/clients/{}/roles/{}",
            encode(client_uuid),
            encode(name)
        )));
        match self.send("get client role", request).await {
            Ok(response) => Ok(response.json().await?),
            Err(BrokerError::Status { status: 404, .. }) => {
                Err(BrokerError::RoleNotFound(name.to_owned()))
            }
            Err(e) => Err(e),
        }
    }

    /// Create a client role. An existing role (409) counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn create_client_role(&self, client_uuid: &str, name: &str) -> Result<(), BrokerError> {
        let request = self
            .inner
            .http
            .post(self.realm_url(&format!("/clients/{}/roles", encode(client_uuid))))
            .json(&RoleRepresentation::named(name, None));
        match self.send("create client role", request).await {
            Ok(_) | Err(BrokerError::Status { status: 409, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn user_client_roles(
        &self,
        remote_id: &str,
        client_uuid: &str,
    ) -> Result<Vec<RoleRepresentation>, BrokerError> {
        let request = self.inner.http.get(self.user_url(
            remote_id,
            &format!("/role-mappings/clients/{}", encode(client_uuid)),
        ));
        Ok(self.send("list client mappings", request).await?.json().await?)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, roles), fields(count = roles.len()))]
    pub async fn remove_user_client_roles(
        &self,
        remote_id: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<(), BrokerError> {
        let request = self
            .inner
            .http
            .delete(self.user_url(
                remote_id,
                &format!("/role-mappings/clients/{}", encode(client_uuid)),
            ))
            .json(roles);
        self.send("remove client mappings", request).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, roles), fields(count = roles.len()))]
    pub async fn add_user_client_roles(
        &self,
        remote_id: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> Result<(), BrokerError> {
        let request = self
            .inner
            .http
            .post(self.user_url(
                remote_id,
                &format!("/role-mappings/clients/{}", encode(client_uuid)),
            ))
            .json(roles);
        self.send("add client mappings", request).await?;
        Ok(())
    }

    /// The configured role client (`clientId`).
    #[must_use]
    pub fn role_client(&self) -> &str {
        &self.inner.config.role_client
    }
}

/// Turn a non-success response into [`BrokerError::Status`] carrying the body.
async fn check(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BrokerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(BrokerError::Status {
        operation,
        status: status.as_u16(),
        body,
    })
}
