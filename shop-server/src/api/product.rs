//! Product routes (ADMIN only)
//!
//! Create and update take multipart forms: text fields `name`,
//! `description`, `price`, `stock`, files in `images` (or `images[]`), and
//! on update a JSON array `removeImages` of image ids.

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Router, middleware};
use http::StatusCode;
use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{Product, ProductChanges, Role};
use shared::response::ApiResponse;

use super::extract::{IdPath, PageParams};
use super::multipart::{FilePart, Form, body_limit, store_files};
use crate::auth::{require_auth, require_role};
use crate::products::{NewProductInput, ProductUpdate};
use crate::state::AppState;
use crate::uploads::{MAX_PRODUCT_IMAGES, UploadKind};

const PRICE_INVALID: &str = "Price must be a positive number";
const STOCK_INVALID: &str = "Stock must be a non-negative integer";

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create).layer(upload_limit()))
        .route(
            "/products/{id}",
            get(find).put(update).delete(delete).layer(upload_limit()),
        )
        .route_layer(middleware::from_fn(require_role(Role::Admin)))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

async fn list(
    State(state): State<AppState>,
    PageParams(query): PageParams,
) -> Result<ApiResponse<Vec<Product>>, AppError> {
    let page = state.products.list(query).await?;
    Ok(ApiResponse::paged("Products retrieved successfully", page))
}

async fn find(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<ApiResponse<Product>, AppError> {
    let product = state.products.find(id).await?;
    Ok(ApiResponse::ok("Product retrieved successfully", product))
}

async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = Form::read(multipart).await?;
    let images = take_images(&mut form)?;

    let price = form.parse::<Decimal>("price", PRICE_INVALID)?;
    let stock = form.parse::<i32>("stock", STOCK_INVALID)?;
    let (Some(price), Some(stock)) = (price, stock) else {
        let mut err = AppError::validation("Validation failed");
        if price.is_none() {
            err = err.with_field_error("price", "Price is required");
        }
        if stock.is_none() {
            err = err.with_field_error("stock", "Stock is required");
        }
        return Err(err);
    };

    let image_urls = store_files(&state.uploads, UploadKind::Product, images).await?;
    let input = NewProductInput {
        name: form.text("name").unwrap_or_default(),
        description: form.text("description"),
        price,
        stock,
        image_urls: image_urls.clone(),
    };

    match state.products.create(input).await {
        Ok(product) => Ok((
            StatusCode::CREATED,
            ApiResponse::ok("Product created successfully", product),
        )),
        Err(e) => {
            state
                .uploads
                .remove_all(UploadKind::Product, &image_urls)
                .await;
            Err(e.into())
        }
    }
}

async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    multipart: Multipart,
) -> Result<ApiResponse<Product>, AppError> {
    let mut form = Form::read(multipart).await?;
    let images = take_images(&mut form)?;

    let changes = ProductChanges {
        name: form.fields.get("name").map(|n| n.trim().to_string()),
        description: form.text("description"),
        price: form.parse::<Decimal>("price", PRICE_INVALID)?,
        stock: form.parse::<i32>("stock", STOCK_INVALID)?,
    };
    let remove_image_ids = match form.text("removeImages") {
        Some(raw) => serde_json::from_str::<Vec<i64>>(&raw).map_err(|_| {
            AppError::field("removeImages", "removeImages must be a JSON array of image ids")
        })?,
        None => Vec::new(),
    };

    let new_image_urls = store_files(&state.uploads, UploadKind::Product, images).await?;
    let update = ProductUpdate {
        changes,
        new_image_urls: new_image_urls.clone(),
        remove_image_ids,
    };

    match state.products.update(id, update).await {
        Ok(product) => Ok(ApiResponse::ok("Product updated successfully", product)),
        Err(e) => {
            state
                .uploads
                .remove_all(UploadKind::Product, &new_image_urls)
                .await;
            Err(e.into())
        }
    }
}

async fn delete(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<ApiResponse<()>, AppError> {
    state.products.delete(id).await?;
    Ok(ApiResponse::message("Product deleted successfully"))
}

fn upload_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(body_limit(MAX_PRODUCT_IMAGES))
}

fn take_images(form: &mut Form) -> Result<Vec<FilePart>, AppError> {
    let images = form.take_files(UploadKind::Product.field());
    if images.len() > MAX_PRODUCT_IMAGES {
        return Err(AppError::with_message(
            ErrorCode::TooManyFiles,
            format!("At most {MAX_PRODUCT_IMAGES} images may be uploaded"),
        )
        .with_field_error("images", format!("At most {MAX_PRODUCT_IMAGES} files allowed")));
    }
    Ok(images)
}
