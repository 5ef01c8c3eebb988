//! Order routes (CUSTOMER only)

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Router, middleware};
use http::StatusCode;
use serde::Deserialize;
use shared::error::AppError;
use shared::models::{Order, OrderLine, Role};
use shared::response::ApiResponse;

use super::extract::{ApiJson, IdPath, PageParams};
use crate::auth::{CurrentUser, require_auth, require_role};
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", post(create))
        .route("/orders/history", get(history))
        .route("/orders/{id}", get(find))
        .route_layer(middleware::from_fn(require_role(Role::Customer)))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderLine>,
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orders.place_order(user.id(), &req.items).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Order created successfully", order),
    ))
}

async fn history(
    State(state): State<AppState>,
    user: CurrentUser,
    PageParams(query): PageParams,
) -> Result<ApiResponse<Vec<Order>>, AppError> {
    let page = state.orders.history(user.id(), query).await?;
    Ok(ApiResponse::paged("Order history retrieved successfully", page))
}

async fn find(
    State(state): State<AppState>,
    user: CurrentUser,
    IdPath(id): IdPath,
) -> Result<ApiResponse<Order>, AppError> {
    let order = state.orders.find_by_id(id, user.id()).await?;
    Ok(ApiResponse::ok("Order retrieved successfully", order))
}
