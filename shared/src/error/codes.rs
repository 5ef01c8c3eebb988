//! Numeric error codes
//!
//! Every code is declared once in the table below together with its HTTP
//! status and default message. Ranges:
//! - 0xxx: General
//! - 1xxx: Authentication
//! - 2xxx: Permission
//! - 4xxx: Order
//! - 6xxx: Product and upload (65xx)
//! - 8xxx: Account
//! - 9xxx: System

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! error_codes {
    ($( $(#[$doc:meta])* $variant:ident = $value:literal, $status:ident, $message:literal; )+) => {
        /// Error code sent to clients as a number in the `code` field
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u16", try_from = "u16")]
        #[repr(u16)]
        pub enum ErrorCode {
            $( $(#[$doc])* $variant = $value, )+
        }

        impl ErrorCode {
            /// All codes, in declaration order
            pub const ALL: &'static [ErrorCode] = &[$( ErrorCode::$variant ),+];

            /// Default English message
            pub const fn message(&self) -> &'static str {
                match self {
                    $( ErrorCode::$variant => $message, )+
                }
            }

            /// HTTP status the code is rendered with
            pub const fn http_status(&self) -> StatusCode {
                match self {
                    $( ErrorCode::$variant => StatusCode::$status, )+
                }
            }
        }

        impl TryFrom<u16> for ErrorCode {
            type Error = InvalidErrorCode;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(ErrorCode::$variant), )+
                    other => Err(InvalidErrorCode(other)),
                }
            }
        }
    };
}

error_codes! {
    // General
    /// Input failed validation; field messages are in `errors`
    ValidationFailed = 2, BAD_REQUEST, "Validation failed";
    /// Body could not be parsed at all
    InvalidRequest = 5, BAD_REQUEST, "Invalid request";
    RouteNotFound = 6, NOT_FOUND, "Route not found";

    // Authentication
    NotAuthenticated = 1001, UNAUTHORIZED, "Unauthorized";
    InvalidCredentials = 1002, UNAUTHORIZED, "Invalid email or password";
    TokenExpired = 1003, UNAUTHORIZED, "Token expired";
    TokenInvalid = 1004, UNAUTHORIZED, "Invalid token";

    // Permission
    /// Authenticated, but with the wrong role for the route
    RoleRequired = 2002, FORBIDDEN, "Role required";

    // Order
    OrderNotFound = 4001, NOT_FOUND, "Order not found";
    OrderEmpty = 4007, BAD_REQUEST, "At least one item is required";
    /// Total would not fit the stored amount column
    OrderTotalTooLarge = 4008, BAD_REQUEST, "Order total exceeds the allowed maximum";

    // Product
    ProductNotFound = 6001, NOT_FOUND, "Product not found";
    /// `details` carries `available` and `requested`
    InsufficientStock = 6003, BAD_REQUEST, "Insufficient stock";
    /// Product is referenced by order items
    ProductInUse = 6004, CONFLICT, "Product is referenced by existing orders";

    // Upload
    FileTooLarge = 6501, PAYLOAD_TOO_LARGE, "File too large";
    UnsupportedFileFormat = 6502, BAD_REQUEST, "Only image files are allowed";
    TooManyFiles = 6503, BAD_REQUEST, "Too many files";

    // Account
    UserNotFound = 8001, NOT_FOUND, "User not found";
    EmailAlreadyExists = 8002, CONFLICT, "Email already exists";
    PasswordMismatch = 8003, BAD_REQUEST, "Passwords do not match";

    // System
    InternalError = 9001, INTERNAL_SERVER_ERROR, "Internal server error";
    StorageError = 9004, INTERNAL_SERVER_ERROR, "File storage failed";
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A number that is not a known [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);
