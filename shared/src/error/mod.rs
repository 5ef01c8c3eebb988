//! Error model shared by the server and its clients
//!
//! [`ErrorCode`] is the stable numeric contract, [`AppError`] the value
//! handlers return. An `AppError` renders as
//! `{success: false, code, message, errors?, details?}` with the status
//! its code maps to.
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::validation("Validation failed")
//!     .with_field_error("email", "Invalid email");
//! assert_eq!(err.code, ErrorCode::ValidationFailed);
//! assert_eq!(err.http_status(), shared::http::StatusCode::BAD_REQUEST);
//! ```

mod category;
mod codes;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::AppError;
