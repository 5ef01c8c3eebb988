//! Data models
//!
//! Shared between shop-server and API clients.
//! Flat DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (PostgreSQL BIGSERIAL).

pub mod order;
pub mod product;
pub mod user;

// Re-exports
pub use order::*;
pub use product::*;
pub use user::*;
