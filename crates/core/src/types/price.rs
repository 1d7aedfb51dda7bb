//! Menu prices using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Error returned when a price is outside the accepted range.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Below [`MenuPrice::MIN`].
    #[error("price must be at least {min}")]
    TooLow {
        /// Smallest accepted price.
        min: Decimal,
    },
    /// Above [`MenuPrice::MAX`].
    #[error("price must be at most {max}")]
    TooHigh {
        /// Largest accepted price.
        max: Decimal,
    },
    /// More than two decimal places.
    #[error("price cannot have more than two decimal places")]
    TooPrecise,
}

/// Price of a single menu entry, between 0.01 and 999.99 inclusive.
///
/// ```
/// use foodi_core::MenuPrice;
/// use rust_decimal::Decimal;
///
/// let price = MenuPrice::new(Decimal::new(1299, 2)).unwrap();
/// assert_eq!(price.to_string(), "12.99");
/// assert!(MenuPrice::new(Decimal::ZERO).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct MenuPrice(Decimal);

impl MenuPrice {
    /// Smallest accepted price (0.01).
    pub const MIN: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
    /// Largest accepted price (999.99).
    pub const MAX: Decimal = Decimal::from_parts(99_999, 0, 0, false, 2);

    /// Validate a price.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is outside 0.01..=999.99 or has more
    /// than two decimal places.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount < Self::MIN {
            return Err(PriceError::TooLow { min: Self::MIN });
        }
        if amount > Self::MAX {
            return Err(PriceError::TooHigh { max: Self::MAX });
        }
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise);
        }
        Ok(Self(amount.round_dp(2)))
    }

    /// The amount as a decimal.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for MenuPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for MenuPrice {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MenuPrice> for Decimal {
    fn from(price: MenuPrice) -> Self {
        price.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(MenuPrice::new(Decimal::new(1, 2)).is_ok());
        assert!(MenuPrice::new(Decimal::new(99_999, 2)).is_ok());
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            MenuPrice::new(Decimal::ZERO),
            Err(PriceError::TooLow { .. })
        ));
        assert!(matches!(
            MenuPrice::new(Decimal::new(-500, 2)),
            Err(PriceError::TooLow { .. })
        ));
        assert!(matches!(
            MenuPrice::new(Decimal::new(100_000, 2)),
            Err(PriceError::TooHigh { .. })
        ));
    }

    #[test]
    fn test_rejects_fractional_cents() {
        assert_eq!(
            MenuPrice::new(Decimal::new(12_995, 3)),
            Err(PriceError::TooPrecise)
        );
        // Trailing zeros are fine.
        assert!(MenuPrice::new(Decimal::new(12_990, 3)).is_ok());
    }

    #[test]
    fn test_display_two_places() {
        let price = MenuPrice::new(Decimal::new(8, 0)).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(price.to_string(), "8.00");
    }
}
