//! Extractors whose rejections use the error envelope

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use shared::error::AppError;
use shared::request::PageQuery;

/// `Json<T>` with malformed bodies rejected as `InvalidRequest`
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::invalid_request(rejection.body_text())),
        }
    }
}

/// Numeric `{id}` path segment
pub struct IdPath(pub i64);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::invalid_request(e.body_text()))?;
        raw.parse()
            .map(IdPath)
            .map_err(|_| AppError::invalid_request(format!("Invalid id: {raw}")))
    }
}

/// `?page=&size=`; unparseable values fall back to the defaults, then clamp
pub struct PageParams(pub PageQuery);

impl<S> FromRequestParts<S> for PageParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::invalid_request(e.body_text()))?;
        let defaults = PageQuery::default();
        let number = |key: &str, fallback: u32| {
            params
                .get(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(fallback)
        };
        Ok(PageParams(PageQuery::new(
            number("page", defaults.page),
            number("size", defaults.size),
        )))
    }
}

/// Client IP: first `X-Forwarded-For` entry, then the peer address
pub fn client_ip(parts: &Parts) -> String {
    if let Some(forwarded) = parts.headers.get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let ip = first.trim();
        if !ip.is_empty() {
            return ip.to_owned();
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn page_params(uri: &str) -> PageQuery {
        let (mut parts, _) = http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
            .into_parts();
        PageParams::from_request_parts(&mut parts, &()).await.ok().unwrap().0
    }

    #[tokio::test]
    async fn page_params_fall_back_and_clamp() {
        let q = page_params("/x").await;
        assert_eq!((q.page, q.size), (1, 10));

        let q = page_params("/x?page=3&size=500").await;
        assert_eq!((q.page, q.size), (3, 100));

        let q = page_params("/x?page=abc&size=0").await;
        assert_eq!((q.page, q.size), (1, 10));
    }

    #[test]
    fn forwarded_ip_wins() {
        let (parts, _) = http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(client_ip(&parts), "203.0.113.7");
    }

    #[test]
    fn unknown_without_peer() {
        let (parts, _) = http::Request::builder().body(()).unwrap().into_parts();
        assert_eq!(client_ip(&parts), "unknown");
    }
}
