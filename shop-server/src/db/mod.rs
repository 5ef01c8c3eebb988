//! Persistence layer
//!
//! Every operation runs on a transaction handle obtained from [`Store::begin`].
//! Dropping a handle without calling [`StoreTx::commit`] rolls it back.
//!
//! Two implementations:
//! - [`PgStore`]: PostgreSQL via sqlx, row locks with `SELECT ... FOR UPDATE`
//! - [`MemoryStore`]: process-local tables, one transaction at a time

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::models::{
    NewOrder, NewOrderItem, NewProduct, NewUser, Order, Product, ProductChanges, ProductImage,
    User, UserChanges,
};
use thiserror::Error;

/// Storage failure, classified by what callers can do about it
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Unique constraint (SQLSTATE 23505)
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    /// Foreign key constraint (SQLSTATE 23503)
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    /// Serialization failure or deadlock (SQLSTATE 40001 / 40P01); safe to retry
    #[error("transaction conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Map a SQLSTATE code to a variant
    pub fn from_sqlstate(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "23505" => StoreError::UniqueViolation(message),
            "23503" => StoreError::ForeignKeyViolation(message),
            "40001" | "40P01" => StoreError::Conflict(message),
            _ => StoreError::Database(message),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => match db.code() {
                Some(code) => StoreError::from_sqlstate(&code, db.message()),
                None => StoreError::Database(db.message().to_string()),
            },
            _ => StoreError::Database(e.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Product fields needed to reserve stock, read under a row lock
#[derive(Debug, Clone, PartialEq)]
pub struct ProductStock {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
}

/// Persisted refresh token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserRepo: Send {
    async fn find_user_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;
    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError>;
    /// Returns `None` when no user has this id
    async fn update_user(
        &mut self,
        id: i64,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError>;
    async fn count_users(&mut self) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait ProductRepo: Send {
    /// Read a product and hold its row until the transaction ends
    async fn lock_product(&mut self, id: i64) -> Result<Option<ProductStock>, StoreError>;
    async fn find_product(&mut self, id: i64) -> Result<Option<Product>, StoreError>;
    async fn update_product_stock(&mut self, id: i64, stock: i32) -> Result<(), StoreError>;
    /// Products ordered by id ascending
    async fn list_products(&mut self, skip: i64, take: i64) -> Result<Vec<Product>, StoreError>;
    async fn count_products(&mut self) -> Result<i64, StoreError>;
    /// Returns the new product id
    async fn insert_product(&mut self, product: NewProduct) -> Result<i64, StoreError>;
    /// Returns `false` when no product has this id
    async fn update_product(
        &mut self,
        id: i64,
        changes: ProductChanges,
    ) -> Result<bool, StoreError>;
    /// Returns `false` when no product has this id
    async fn delete_product(&mut self, id: i64) -> Result<bool, StoreError>;
    async fn insert_product_images(
        &mut self,
        product_id: i64,
        urls: &[String],
    ) -> Result<(), StoreError>;
    /// Deletes the listed images that belong to `product_id` and returns them
    async fn delete_product_images(
        &mut self,
        product_id: i64,
        image_ids: &[i64],
    ) -> Result<Vec<ProductImage>, StoreError>;
}

#[async_trait]
pub trait OrderRepo: Send {
    /// Returns the new order id
    async fn create_order(&mut self, order: NewOrder) -> Result<i64, StoreError>;
    async fn create_order_items(
        &mut self,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> Result<(), StoreError>;
    /// Full order graph, only if it belongs to `user_id`
    async fn find_order_by_id(
        &mut self,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Order>, StoreError>;
    async fn count_orders(&mut self, user_id: i64) -> Result<i64, StoreError>;
    /// Newest first: `created_at DESC, id DESC`
    async fn list_orders(
        &mut self,
        user_id: i64,
        skip: i64,
        take: i64,
    ) -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
pub trait RefreshTokenRepo: Send {
    async fn find_refresh_token(
        &mut self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;
    async fn insert_refresh_token(&mut self, record: NewRefreshToken) -> Result<(), StoreError>;
    /// Rotate a record in place
    async fn update_refresh_token(
        &mut self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    /// Returns `false` when no record has this token
    async fn delete_refresh_token(&mut self, token: &str) -> Result<bool, StoreError>;
}

/// An open transaction
#[async_trait]
pub trait StoreTx: UserRepo + ProductRepo + OrderRepo + RefreshTokenRepo + Send {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Transaction factory shared by the services
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}
