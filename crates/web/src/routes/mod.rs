//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (database)
//!
//! # Menu
//! GET  /                       - Available menu (public)
//! GET  /menu                   - Available menu (signed in)
//!
//! # Account
//! GET  /account/login          - Login form
//! POST /account/login          - Login action
//! POST /account/register       - Registration
//! POST /account/logout         - Logout
//! GET  /account/profile        - Profile
//! POST /account/profile        - Update profile
//! POST /account/password       - Change password
//! POST /account/deactivate     - Deactivate own account
//! POST /account/reactivate     - Reactivate by email and password
//! GET  /sso/broker             - Continue to the identity broker
//!
//! # Orders
//! GET  /orders                 - Own order history
//! POST /orders                 - Place an order
//! POST /orders/{id}/advance    - Advance status (Admin+)
//! GET  /reports                - Reporting dashboard (Lead+)
//!
//! # Administration
//! GET  /admin                               - Dashboard (Admin+)
//! GET  /admin/users                         - Account list (Admin+)
//! GET  /admin/users/{id}                    - Account detail (Admin+)
//! POST /admin/users/{id}/toggle-status      - Activate/deactivate (Head)
//! POST /admin/users/{id}/tier               - Set tier (Head)
//! POST /admin/users/{id}/broker-roles       - Set broker role labels (Head)
//! POST /admin/users/{id}/resync             - Push to the broker again (Admin+)
//! POST /admin/broker-roles/refresh          - Drop cached broker roles (Admin+)
//!
//! # OpenID Connect provider
//! GET      /.well-known/openid-configuration
//! GET      /.well-known/jwks.json
//! GET|POST /connect/authorize
//! POST     /connect/token
//! GET|POST /connect/userinfo
//! GET|POST /connect/logout
//! ```

pub mod account;
pub mod admin;
pub mod health;
pub mod menu;
pub mod oidc;
pub mod orders;

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Request},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::de::DeserializeOwned;

use crate::state::AppState;

/// Request body accepted as JSON or as an urlencoded form.
///
/// A body without a content type is read as a form, so an empty `POST`
/// yields the all-default value.
pub struct Input<T>(pub T);

impl<S, T> FromRequest<S> for Input<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(mut req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let is_json = content_type.is_some_and(|v| v.starts_with("application/json"));
        let missing = content_type.is_none();
        if missing {
            req.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
        }

        if is_json {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(value)| Self(value))
                .map_err(IntoResponse::into_response)
        } else {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| Self(value))
                .map_err(IntoResponse::into_response)
        }
    }
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(account::login_page).post(account::login))
        .route("/register", post(account::register))
        .route("/logout", post(account::logout))
        .route(
            "/profile",
            get(account::profile).post(account::update_profile),
        )
        .route("/password", post(account::change_password))
        .route("/deactivate", post(account::deactivate))
        .route("/reactivate", post(account::reactivate))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::history).post(orders::place))
        .route("/{id}/advance", post(orders::advance))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::dashboard))
        .route("/users", get(admin::users))
        .route("/users/{id}", get(admin::user_detail))
        .route("/users/{id}/toggle-status", post(admin::toggle_status))
        .route("/users/{id}/tier", post(admin::set_tier))
        .route("/users/{id}/broker-roles", post(admin::set_broker_roles))
        .route("/users/{id}/resync", post(admin::resync))
        .route("/broker-roles/refresh", post(admin::refresh_roles))
}

/// Create the OIDC provider routes router.
pub fn connect_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/authorize",
            get(oidc::authorize_get).post(oidc::authorize_post),
        )
        .route("/token", post(oidc::token))
        .route("/userinfo", get(oidc::userinfo).post(oidc::userinfo))
        .route("/logout", get(oidc::logout_get).post(oidc::logout_post))
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/", get(menu::public_menu))
        .route("/menu", get(menu::menu))
        .route("/reports", get(orders::reports))
        .route("/sso/broker", get(account::go_to_broker))
        .route(
            "/.well-known/openid-configuration",
            get(oidc::discovery),
        )
        .route("/.well-known/jwks.json", get(oidc::jwks))
        .nest("/account", account_routes())
        .nest("/orders", order_routes())
        .nest("/admin", admin_routes())
        .nest("/connect", connect_routes())
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::tests::test_config;
    use crate::middleware::session_layer;

    /// Full router over a lazy pool and an in-memory session store.
    pub fn app() -> Router {
        let config = test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/foodi_test")
            .unwrap();
        let sessions = session_layer(MemoryStore::default(), &config).unwrap();
        let state = AppState::new(config, pool).unwrap();

        routes().layer(sessions).with_state(state)
    }

    pub async fn send(request: Request<Body>) -> axum::response::Response {
        app().oneshot(request).await.unwrap()
    }

    pub fn get_json(uri: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = send(get_json("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_pages_reject_anonymous() {
        for uri in ["/menu", "/orders", "/reports", "/admin", "/admin/users/1", "/account/profile"] {
            let response = send(get_json(uri)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_anonymous_browser_goes_to_login() {
        let request = Request::get("/orders")
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/account/login?return_url=%2Forders"
        );
    }

    #[tokio::test]
    async fn test_mutations_require_login() {
        for uri in [
            "/account/deactivate",
            "/account/password",
            "/admin/users/1/toggle-status",
            "/admin/broker-roles/refresh",
            "/orders/1/advance",
        ] {
            let request = Request::post(uri).body(Body::empty()).unwrap();
            let response = send(request).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }
}
