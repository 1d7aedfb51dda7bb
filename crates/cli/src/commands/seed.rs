//! Seed the menu with the default dishes.
//!
//! Dishes are upserted by name, so running the command again refreshes
//! descriptions and prices without creating duplicates.

use rust_decimal::Decimal;
use tracing::info;

use foodi_core::MenuPrice;
use foodi_web::db::MenuRepository;
use foodi_web::models::NewMenuItem;

use super::connect;

/// `(name, description, price in cents, image)`
const DEFAULT_MENU: [(&str, &str, i64, &str); 6] = [
    ("Margherita Pizza", "Classic tomato and mozzarella", 1299, "/images/pizza.jpg"),
    ("Cheeseburger", "Juicy beef patty with cheese", 999, "/images/burger.jpg"),
    ("Caesar Salad", "Fresh romaine with parmesan", 799, "/images/salad.jpg"),
    ("Spaghetti Carbonara", "Creamy pasta with bacon", 1399, "/images/pasta.jpg"),
    ("Chicken Wings", "Crispy wings with hot sauce", 899, "/images/wings.jpg"),
    ("Fish Tacos", "Fresh fish with salsa", 1199, "/images/tacos.jpg"),
];

/// The default dishes as insertable items.
///
/// # Errors
///
/// Returns an error if a price is outside the accepted range.
pub fn default_menu() -> Result<Vec<NewMenuItem>, foodi_core::PriceError> {
    DEFAULT_MENU
        .iter()
        .map(|&(name, description, cents, image_url)| {
            Ok(NewMenuItem {
                name: name.to_owned(),
                description: description.to_owned(),
                price: MenuPrice::new(Decimal::new(cents, 2))?,
                image_url: image_url.to_owned(),
                is_available: true,
            })
        })
        .collect()
}

/// Insert or refresh the default dishes.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn menu() -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect().await?;
    let repo = MenuRepository::new(&pool);

    for item in default_menu()? {
        let saved = repo.upsert_by_name(&item).await?;
        info!(id = %saved.id, name = %saved.name, price = %saved.price, "Dish saved");
    }

    info!("Menu seeding complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_menu_prices() {
        let menu = default_menu().unwrap();
        assert_eq!(menu.len(), 6);
        assert!(menu.iter().all(|item| item.is_available));

        let carbonara = menu
            .iter()
            .find(|item| item.name == "Spaghetti Carbonara")
            .unwrap();
        assert_eq!(carbonara.price.amount(), Decimal::new(1399, 2));
    }
}
