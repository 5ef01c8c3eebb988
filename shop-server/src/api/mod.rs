//! HTTP surface
//!
//! - [`auth`] - registration, login, session and profile routes
//! - [`product`] - product catalog (ADMIN)
//! - [`order`] - order placement and history (CUSTOMER)
//! - [`health`] - liveness check
//!
//! Everything except `/health` and the static upload directories lives
//! under `/api/v1`.

pub mod auth;
pub mod cookie;
pub mod extract;
pub mod health;
pub mod multipart;
pub mod order;
pub mod product;

use axum::Router;
use axum::extract::OriginalUri;
use axum::routing::get;
use http::{HeaderValue, Method, header};
use shared::error::{AppError, ErrorCode};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::uploads::UploadKind;

pub const API_PREFIX: &str = "/api/v1";

/// Build the fully layered application router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router(state.clone()))
        .merge(product::router(state.clone()))
        .merge(order::router(state.clone()));

    Router::new()
        .route("/health", get(health::health_check))
        .nest(API_PREFIX, api)
        .nest_service(
            "/profile",
            ServeDir::new(state.uploads.dir(UploadKind::Profile)),
        )
        .nest_service(
            "/products",
            ServeDir::new(state.uploads.dir(UploadKind::Product)),
        )
        .fallback(route_not_found)
        .layer(cors_layer(state.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Restricted to `origin` with credentials when set, permissive otherwise
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!(origin, "Invalid CLIENT_URL, falling back to permissive CORS");
            CorsLayer::permissive()
        }
    }
}

async fn route_not_found(method: Method, OriginalUri(uri): OriginalUri) -> AppError {
    AppError::with_message(
        ErrorCode::RouteNotFound,
        format!("Route {method} {uri} not found"),
    )
}
