//! API Response types
//!
//! Every successful response follows this format:
//! ```json
//! {
//!     "success": true,
//!     "message": "Orders fetched successfully",
//!     "data": [ ... ],
//!     "paging": { "current_page": 1, "total_page": 3, "size": 10, "total_data": 25 }
//! }
//! ```
//!
//! Errors are rendered by [`crate::error::AppError`].

use crate::request::PageQuery;
use serde::{Deserialize, Serialize};

/// Success envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
}

impl<T> ApiResponse<T> {
    /// Success response with data
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            paging: None,
        }
    }
}

impl ApiResponse<()> {
    /// Success response without data
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            paging: None,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// Success response for one page of a list
    pub fn paged(message: impl Into<String>, page: Paged<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(page.items),
            paging: Some(page.paging),
        }
    }
}

impl<T: Serialize> axum::response::IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        axum::Json(self).into_response()
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub current_page: u32,
    pub total_page: u32,
    pub size: u32,
    pub total_data: u64,
}

impl Paging {
    /// Build paging metadata; `total_page` is never below 1
    pub fn new(query: PageQuery, total_data: u64) -> Self {
        let q = query.clamped();
        let size = q.size as u64;
        let total_page = total_data.div_ceil(size).max(1);
        Self {
            current_page: q.page,
            total_page: u32::try_from(total_page).unwrap_or(u32::MAX),
            size: q.size,
            total_data,
        }
    }
}

/// One page of items plus its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub paging: Paging,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, query: PageQuery, total_data: u64) -> Self {
        Self {
            items,
            paging: Paging::new(query, total_data),
        }
    }
}
