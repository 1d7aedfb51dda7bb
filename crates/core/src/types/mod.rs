//! Core types for Foodi.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod handle;
pub mod id;
pub mod price;
pub mod roles;
pub mod status;
pub mod tier;

pub use email::{Email, EmailError};
pub use handle::{Handle, HandleError};
pub use id::*;
pub use price::{MenuPrice, PriceError};
pub use roles::normalize_role_labels;
pub use status::{OrderStatus, ParseOrderStatusError};
pub use tier::{ParseTierError, PermissionTier, TierInfo};
