//! Menu domain types.

use serde::Serialize;

use foodi_core::{MenuItemId, MenuPrice};

/// A dish on the menu.
#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub description: String,
    pub price: MenuPrice,
    pub image_url: String,
    pub is_available: bool,
}

/// Input for creating or replacing a dish (used by seeding).
#[derive(Debug, Clone)]
pub struct NewMenuItem {
    pub name: String,
    pub description: String,
    pub price: MenuPrice,
    pub image_url: String,
    pub is_available: bool,
}
