//! Health check endpoint

use axum::Json;
use axum::extract::Request;
use serde::Serialize;

use super::extract::client_ip;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
    data: HealthData,
}

#[derive(Debug, Serialize)]
pub struct HealthData {
    ip_address: String,
}

pub async fn health_check(req: Request) -> Json<HealthResponse> {
    let (parts, _) = req.into_parts();
    Json(HealthResponse {
        status: "OK",
        message: "Server is healthy",
        data: HealthData {
            ip_address: client_ip(&parts),
        },
    })
}
