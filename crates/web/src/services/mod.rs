//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password hashing and credential verification
//! - `accounts` - Self-service account lifecycle with broker mirroring
//! - `admin` - Account administration (status, tier, broker roles)
//! - `orders` - Menu, ordering and reporting
//!
//! Services that touch the identity broker commit the local change first and
//! report the broker result as a [`accounts::SyncOutcome`]; a broker failure
//! never rolls back local state.

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod orders;

#[cfg(test)]
pub(crate) mod testing;
