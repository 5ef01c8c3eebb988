//! Code ranges grouped by domain

use super::codes::ErrorCode;

/// Domain of an [`ErrorCode`], derived from its thousands digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    General,
    Auth,
    Permission,
    Order,
    Product,
    Account,
    /// 9xxx and any range without its own domain
    System,
}

impl ErrorCategory {
    pub fn from_code(code: u16) -> Self {
        match code / 1000 {
            0 => Self::General,
            1 => Self::Auth,
            2 => Self::Permission,
            4 => Self::Order,
            6 => Self::Product,
            8 => Self::Account,
            _ => Self::System,
        }
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges() {
        assert_eq!(ErrorCode::RouteNotFound.category(), ErrorCategory::General);
        assert_eq!(ErrorCode::TokenExpired.category(), ErrorCategory::Auth);
        assert_eq!(ErrorCode::RoleRequired.category(), ErrorCategory::Permission);
        assert_eq!(ErrorCode::OrderEmpty.category(), ErrorCategory::Order);
        assert_eq!(ErrorCode::TooManyFiles.category(), ErrorCategory::Product);
        assert_eq!(ErrorCode::PasswordMismatch.category(), ErrorCategory::Account);
        assert_eq!(ErrorCode::StorageError.category(), ErrorCategory::System);
        assert_eq!(ErrorCategory::from_code(3001), ErrorCategory::System);
    }
}
