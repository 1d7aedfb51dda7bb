//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store, signed cookie)
//!
//! Login and tier checks are extractors rather than layers.

pub mod auth;
pub mod session;

pub use auth::{
    AuthRejection, OptionalAuth, RequireAdmin, RequireAuth, RequireHead, RequireLead,
    clear_current_account, current_account, set_current_account,
};
pub use session::{create_session_layer, session_layer};
