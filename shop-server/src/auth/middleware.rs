//! Authentication and role middleware

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use shared::error::{AppError, ErrorCode};
use shared::models::{Role, UserProfile};

use super::jwt::extract_bearer;
use crate::security_log;
use crate::state::AppState;

/// Authenticated user, inserted into request extensions by [`require_auth`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub UserProfile);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn profile(&self) -> &UserProfile {
        &self.0
    }
}

/// Require a valid `Authorization: Bearer <token>` header
///
/// The token's subject is reloaded from the store so deleted users and
/// changed roles take effect before the token expires.
///
/// | Failure | Code |
/// |---------|------|
/// | header missing or malformed | 401 NotAuthenticated |
/// | token expired | 401 TokenExpired |
/// | bad signature / wrong kind | 401 TokenInvalid |
/// | user no longer exists | 401 NotAuthenticated |
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = auth_header.and_then(extract_bearer) else {
        security_log!("WARN", "auth_missing", uri = req.uri().to_string());
        return Err(AppError::unauthorized());
    };

    let claims = match state.sessions.verify_access(token) {
        Ok(profile) => profile,
        Err(e) => {
            security_log!(
                "WARN",
                "auth_failed",
                error = e.message.clone(),
                uri = req.uri().to_string()
            );
            return Err(e);
        }
    };

    let user = {
        let mut tx = state.store.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to open transaction for auth");
            AppError::new(ErrorCode::InternalError)
        })?;
        tx.find_user_by_id(claims.id).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load authenticated user");
            AppError::new(ErrorCode::InternalError)
        })?
    };

    let Some(user) = user else {
        security_log!("WARN", "auth_unknown_user", user_id = claims.id);
        return Err(AppError::unauthorized());
    };

    req.extensions_mut().insert(CurrentUser(user.profile()));
    Ok(next.run(req).await)
}

/// Require the authenticated user to hold `role`
///
/// ```ignore
/// Router::new()
///     .route("/products", get(list))
///     .layer(middleware::from_fn(require_role(Role::Admin)))
///     .layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub fn require_role(
    role: Role,
) -> impl Fn(
    Request,
    Next,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AppError>> + Send>>
+ Clone {
    move |req: Request, next: Next| {
        Box::pin(async move {
            let user = req
                .extensions()
                .get::<CurrentUser>()
                .ok_or(AppError::unauthorized())?;

            if user.role() != role {
                security_log!(
                    "WARN",
                    "role_required",
                    user_id = user.id(),
                    user_role = user.role().as_str(),
                    required_role = role.as_str()
                );
                return Err(AppError::with_message(ErrorCode::RoleRequired, "Forbidden"));
            }

            Ok(next.run(req).await)
        })
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(AppError::unauthorized)
    }
}
