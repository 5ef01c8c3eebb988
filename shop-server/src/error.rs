//! Unified service-layer error type
//!
//! `ServiceError` bridges storage errors (`StoreError`) and the API-layer
//! error (`AppError`) so services can use `?` on both.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::db::StoreError;

/// Service-layer error
///
/// `Db` is logged and hidden behind InternalError; `App` reaches the client
/// as is.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Db(#[from] StoreError),
    #[error(transparent)]
    App(#[from] AppError),
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service database error");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Application error code, if this is not a storage failure
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ServiceError::App(e) => Some(e.code),
            ServiceError::Db(_) => None,
        }
    }
}

/// snake_case field name to camelCase, the casing clients send
pub fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert `validator` errors into a `ValidationFailed` AppError keyed by field
pub fn validation_error(errors: &ValidationErrors) -> AppError {
    let mut app = AppError::validation("Validation failed");
    for (field, kind) in errors.errors() {
        if let ValidationErrorsKind::Field(list) = kind {
            for err in list {
                let msg = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", camel_case(field)));
                app = app.with_field_error(camel_case(field), msg);
            }
        }
    }
    if let Some(first) = app
        .errors
        .as_ref()
        .and_then(|e| e.values().next())
        .and_then(|msgs| msgs.first())
    {
        app.message = first.clone();
    }
    app
}
