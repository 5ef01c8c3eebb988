//! Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELED" => Ok(OrderStatus::Canceled),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }
}

/// Line item; `price` is the unit price captured when the order was placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
}

/// Order with its items ordered by item id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub items: Vec<OrderItem>,
}

/// Requested quantity of one product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i32,
}

/// Order header insert payload
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub total_amount: Decimal,
    pub status: OrderStatus,
}

/// Line item insert payload
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!("CANCELED".parse::<OrderStatus>(), Ok(OrderStatus::Canceled));
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn order_line_uses_camel_case() {
        let line: OrderLine =
            serde_json::from_str(r#"{"productId": 7, "quantity": 2}"#).unwrap();
        assert_eq!(line.product_id, 7);
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn item_serializes_camel_case() {
        let item = OrderItem {
            id: 1,
            order_id: 2,
            product_id: 3,
            product_name: Some("Mouse".into()),
            quantity: 1,
            price: Decimal::new(1999, 2),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["orderId"], 2);
        assert_eq!(json["productName"], "Mouse");
    }
}
