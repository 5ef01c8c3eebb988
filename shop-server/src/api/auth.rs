//! Account and session routes
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /auth/register | POST | - |
//! | /auth/login | POST | - |
//! | /auth/refresh | POST | refresh cookie |
//! | /auth/current | GET | bearer |
//! | /auth/logout | POST | bearer |
//! | /auth/profile | PUT | bearer, multipart |

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Router, middleware};
use http::{HeaderMap, StatusCode, header};
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::UserProfile;
use shared::response::ApiResponse;

use super::cookie::{REFRESH_COOKIE, read_cookie};
use super::extract::ApiJson;
use super::multipart::{Form, body_limit, store_files};
use crate::accounts::{LoginRequest, PhotoUpdate, ProfileUpdate, RegisterRequest};
use crate::auth::{CurrentUser, TokenPair, require_auth};
use crate::security_log;
use crate::state::AppState;
use crate::uploads::UploadKind;

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/current", get(current))
        .route("/auth/logout", post(logout))
        .route(
            "/auth/profile",
            put(update_profile).layer(DefaultBodyLimit::max(body_limit(1))),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .merge(protected)
}

/// Body of login and refresh responses; the refresh token travels in the cookie
#[derive(Debug, Serialize)]
pub struct SessionPayload {
    pub user: UserProfile,
    pub token: String,
}

async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.accounts.register(req).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("User registered successfully", profile),
    ))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Response, AppError> {
    let email = req.email.clone();
    let (user, pair) = state.accounts.login(req).await.map_err(|e| {
        if e.code() == Some(ErrorCode::InvalidCredentials) {
            security_log!("WARN", "login_failed", email = email.as_str());
        }
        AppError::from(e)
    })?;
    Ok(session_response(&state, "User logged in successfully", user, pair))
}

async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let Some(token) = read_cookie(&headers, REFRESH_COOKIE) else {
        return Err(AppError::with_message(
            ErrorCode::NotAuthenticated,
            "No refresh token provided",
        ));
    };
    let (user, pair) = state.sessions.refresh(&token).await.map_err(|e| {
        let err = AppError::from(e);
        security_log!("WARN", "refresh_failed", reason = err.message.as_str());
        err
    })?;
    Ok(session_response(&state, "Token refreshed successfully", user, pair))
}

async fn current(user: CurrentUser) -> ApiResponse<UserProfile> {
    ApiResponse::ok("Current user retrieved successfully", user.0)
}

/// Revoke the cookie's refresh token, if any, and always clear the cookie
async fn logout(State(state): State<AppState>, user: CurrentUser, headers: HeaderMap) -> Response {
    let result = match read_cookie(&headers, REFRESH_COOKIE) {
        Some(token) => state.sessions.revoke(&token).await,
        None => Ok(()),
    };
    let clear = [(header::SET_COOKIE, state.cookie.clear())];

    match result {
        Ok(()) => {
            tracing::info!(user_id = user.id(), "User logged out");
            (clear, ApiResponse::message("User logged out successfully")).into_response()
        }
        Err(e) => (clear, AppError::from(e)).into_response(),
    }
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let mut form = Form::read(multipart).await?;

    let mut photos = form.take_files(UploadKind::Profile.field());
    if photos.len() > 1 {
        return Err(AppError::with_message(
            ErrorCode::TooManyFiles,
            "Only one profile photo may be uploaded",
        )
        .with_field_error("photo", "Only one file allowed"));
    }
    let uploaded = match photos.pop() {
        Some(part) => store_files(&state.uploads, UploadKind::Profile, vec![part])
            .await?
            .pop(),
        None => None,
    };

    let photo = match (&uploaded, form.flag("removePhoto")) {
        (Some(name), _) => PhotoUpdate::Replaced(name.clone()),
        (None, true) => PhotoUpdate::Cleared,
        (None, false) => PhotoUpdate::Unspecified,
    };
    let update = ProfileUpdate {
        name: form.text("name"),
        email: form.text("email"),
        password: form.text("password"),
        confirm_password: form.text("confirmPassword"),
        photo,
    };

    match state.accounts.update_profile(user.id(), update).await {
        Ok(profile) => Ok(ApiResponse::ok("User profile updated successfully", profile)),
        Err(e) => {
            if let Some(name) = uploaded {
                state.uploads.remove(UploadKind::Profile, &name).await;
            }
            Err(e.into())
        }
    }
}

fn session_response(
    state: &AppState,
    message: &str,
    user: UserProfile,
    pair: TokenPair,
) -> Response {
    let cookie = [(header::SET_COOKIE, state.cookie.set(&pair.refresh_token))];
    let body = ApiResponse::ok(
        message,
        SessionPayload {
            user,
            token: pair.access_token,
        },
    );
    (cookie, body).into_response()
}
