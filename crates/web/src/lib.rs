//! Foodi web application library.
//!
//! Accounts, menu and orders, best-effort synchronization with the Keycloak
//! identity broker, and an OpenID Connect provider surface that lets the
//! broker federate Foodi logins.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod oidc;
pub mod routes;
pub mod services;
pub mod state;
