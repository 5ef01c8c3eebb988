//! Order transaction engine
//!
//! `place_order` reserves stock, prices the lines and writes the order with
//! its items in one transaction. A failure at any step drops the
//! transaction, so no stock change or partial order survives.

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{MAX_AMOUNT, NewOrder, NewOrderItem, Order, OrderLine, OrderStatus};
use shared::request::PageQuery;
use shared::response::Paged;

use crate::db::{Store, StoreError};
use crate::error::{ServiceError, ServiceResult};

/// Attempts per order when the store reports a serialization conflict
const MAX_ATTEMPTS: u32 = 3;

pub struct OrderEngine {
    store: Arc<dyn Store>,
}

impl OrderEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Place an order for `user_id`
    ///
    /// Lines are processed in the given order; a product listed twice is
    /// decremented twice and the second line sees the reduced stock.
    pub async fn place_order(&self, user_id: i64, items: &[OrderLine]) -> ServiceResult<Order> {
        validate_lines(items)?;

        let mut attempt = 1;
        loop {
            match self.try_place_order(user_id, items).await {
                Err(ServiceError::Db(StoreError::Conflict(reason))) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        user_id,
                        attempt,
                        reason = %reason,
                        "Order transaction conflict, retrying"
                    );
                    attempt += 1;
                }
                Err(ServiceError::Db(StoreError::Conflict(reason))) => {
                    tracing::error!(
                        user_id,
                        attempts = attempt,
                        reason = %reason,
                        "Order transaction kept conflicting"
                    );
                    return Err(
                        AppError::internal("Could not place order, please try again").into(),
                    );
                }
                result => return result,
            }
        }
    }

    async fn try_place_order(&self, user_id: i64, items: &[OrderLine]) -> ServiceResult<Order> {
        let mut tx = self.store.begin().await?;

        let mut total = Decimal::ZERO;
        let mut lines = Vec::with_capacity(items.len());

        for item in items {
            let Some(product) = tx.lock_product(item.product_id).await? else {
                return Err(AppError::with_message(
                    ErrorCode::ProductNotFound,
                    format!("Product with ID {} not found", item.product_id),
                )
                .into());
            };

            if product.stock < item.quantity {
                return Err(AppError::with_message(
                    ErrorCode::InsufficientStock,
                    format!(
                        "Insufficient stock for product {}. Available: {}, Requested: {}",
                        product.name, product.stock, item.quantity
                    ),
                )
                .with_detail("product_id", product.id)
                .with_detail("product_name", product.name.clone())
                .with_detail("available", product.stock)
                .with_detail("requested", item.quantity)
                .into());
            }

            let Some(next_total) = product
                .price
                .checked_mul(Decimal::from(item.quantity))
                .and_then(|line| total.checked_add(line))
                .filter(|sum| *sum <= MAX_AMOUNT)
            else {
                return Err(AppError::with_message(
                    ErrorCode::OrderTotalTooLarge,
                    format!("Order total exceeds {MAX_AMOUNT}"),
                )
                .with_detail("product_id", product.id)
                .into());
            };
            total = next_total;
            lines.push(NewOrderItem {
                product_id: product.id,
                quantity: item.quantity,
                price: product.price,
            });

            tx.update_product_stock(product.id, product.stock - item.quantity)
                .await?;
        }

        let order_id = tx
            .create_order(NewOrder {
                user_id,
                total_amount: total,
                status: OrderStatus::Pending,
            })
            .await?;
        tx.create_order_items(order_id, &lines).await?;

        let Some(order) = tx.find_order_by_id(order_id, user_id).await? else {
            return Err(AppError::internal("Order vanished before commit").into());
        };

        tx.commit().await?;

        tracing::info!(
            order_id,
            user_id,
            total = %order.total_amount,
            items = order.items.len(),
            "Order placed"
        );
        Ok(order)
    }

    /// Orders of `user_id`, newest first
    pub async fn history(&self, user_id: i64, query: PageQuery) -> ServiceResult<Paged<Order>> {
        let query = query.clamped();
        let mut tx = self.store.begin().await?;
        let total = tx.count_orders(user_id).await?;
        let orders = tx
            .list_orders(user_id, query.offset(), query.limit())
            .await?;
        Ok(Paged::new(orders, query, total.max(0) as u64))
    }

    /// One order, only if it belongs to `user_id`
    pub async fn find_by_id(&self, order_id: i64, user_id: i64) -> ServiceResult<Order> {
        let mut tx = self.store.begin().await?;
        tx.find_order_by_id(order_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::OrderNotFound,
                    format!("Order with ID {order_id} not found"),
                )
                .into()
            })
    }
}

fn validate_lines(items: &[OrderLine]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(
            AppError::with_message(ErrorCode::OrderEmpty, "At least one item is required")
                .with_field_error("items", "At least one item is required"),
        );
    }

    let mut err = AppError::validation("Validation failed");
    for (i, item) in items.iter().enumerate() {
        if item.product_id <= 0 {
            err = err.with_field_error(
                format!("items.{i}.productId"),
                "Product ID must be a positive integer",
            );
        }
        if item.quantity <= 0 {
            err = err.with_field_error(
                format!("items.{i}.quantity"),
                "Quantity must be a positive integer",
            );
        }
    }

    let first = err
        .errors
        .as_ref()
        .and_then(|e| e.values().next())
        .and_then(|m| m.first())
        .cloned();
    match first {
        Some(first) => {
            err.message = first;
            Err(err)
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: i64, quantity: i32) -> OrderLine {
        OrderLine {
            product_id,
            quantity,
        }
    }

    #[test]
    fn empty_order_is_rejected() {
        let err = validate_lines(&[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderEmpty);
        assert!(err.errors.unwrap().contains_key("items"));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let err = validate_lines(&[line(1, 2), line(2, 0)]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.message, "Quantity must be a positive integer");
        assert!(err.errors.unwrap().contains_key("items.1.quantity"));
    }

    #[test]
    fn non_positive_product_id_is_rejected() {
        let err = validate_lines(&[line(-3, 1)]).unwrap_err();
        assert!(err.errors.unwrap().contains_key("items.0.productId"));
    }

    #[test]
    fn valid_lines_pass() {
        assert!(validate_lines(&[line(1, 1), line(1, 4)]).is_ok());
    }
}
