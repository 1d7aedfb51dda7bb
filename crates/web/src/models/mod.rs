//! Domain models for the web crate.
//!
//! These are validated domain objects, separate from database row types.

pub mod account;
pub mod menu;
pub mod order;
pub mod session;

pub use account::{Account, AccountStats, NewAccount, ProfileUpdate};
pub use menu::{MenuItem, NewMenuItem};
pub use order::{NewOrder, Order, OrderLine, OrderReport};
pub use session::{CurrentAccount, keys as session_keys};
