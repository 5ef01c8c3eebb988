//! Shared types for the storefront workspace
//!
//! Wire-level types used by `shop-server` and its clients: error codes,
//! the response envelope, paging and the domain models.

pub mod error;
pub mod models;
pub mod request;
pub mod response;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, ErrorCode};
pub use request::PageQuery;
pub use response::{ApiResponse, Paged, Paging};
