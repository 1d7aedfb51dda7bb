//! Foodi Core - Shared domain types.
//!
//! This crate provides the types used across all Foodi components:
//! - `web` - Food ordering site, OIDC provider and identity-broker sync
//! - `cli` - Command-line tools for migrations, seeding and bootstrap accounts
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, handles, emails, permission tiers, prices and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
