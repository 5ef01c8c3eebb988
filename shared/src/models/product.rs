//! Product Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Largest amount a `NUMERIC(12,2)` column holds: 9999999999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Digits kept after the decimal point for prices and totals
pub const AMOUNT_SCALE: u32 = 2;

/// Image attached to a product; `url` is the stored file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ProductImage {
    pub id: i64,
    pub url: String,
}

/// Product entity with its images ordered by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub images: Vec<ProductImage>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Create product payload
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
}

/// Update product payload
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_amount_matches_column_bound() {
        assert_eq!(MAX_AMOUNT, "9999999999.99".parse::<Decimal>().unwrap());
        assert_eq!(MAX_AMOUNT.scale(), AMOUNT_SCALE);
    }
}
