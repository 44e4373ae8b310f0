// Router HTTP API implementation
// This file provides the HTTP endpoints consumed by the swap front end:
// route fetch, token list, health, stats and metrics
//
// Numan Thabit 2025 Nov

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use super::request::{RouteFetchRequest, SlippageDefaults};
use super::resolver::{ResolverStats, RouteResolver};
use crate::errors::ResolutionError;
use crate::router::routes::Route;
use crate::transport::tokens::{Token, TokenListClient};

/// Shared state behind the HTTP API
pub struct Router {
    resolver: Arc<RouteResolver>,
    tokens: TokenListClient,
    slippage: SlippageDefaults,
}

impl Router {
    pub fn new(
        resolver: Arc<RouteResolver>,
        tokens: TokenListClient,
        slippage: SlippageDefaults,
    ) -> Self {
        Self {
            resolver,
            tokens,
            slippage,
        }
    }

    pub fn resolver(&self) -> &Arc<RouteResolver> {
        &self.resolver
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn resolution_error(err: ResolutionError) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::new(err.to_string())))
}

/// Create the HTTP router with API endpoints
pub fn create_api_router(router: Arc<Router>) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/swap-route", post(swap_route))
        .route("/api/tokens", get(list_tokens))
        .route("/api/stats", get(get_stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}

/// Health check endpoint
async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn metrics() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render(),
    )
        .into_response()
}

/// Route fetch endpoint - validates, resolves and normalizes one route
async fn swap_route(
    State(router): State<Arc<Router>>,
    body: Result<Json<RouteFetchRequest>, JsonRejection>,
) -> Result<Json<Route>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!("invalid request body: {}", rejection.body_text()))),
        )
    })?;

    let req = body
        .into_swap_request(router.slippage)
        .map_err(resolution_error)?;
    let route = router
        .resolver
        .resolve_route(&req)
        .await
        .map_err(resolution_error)?;
    Ok(Json(route))
}

/// Token list endpoint
async fn list_tokens(
    State(router): State<Arc<Router>>,
) -> Result<Json<Vec<Token>>, ApiError> {
    let tokens = router.tokens.fetch_tokens().await.map_err(|e| {
        error!(error = %e, "token list unavailable");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Internal server error".to_string(),
                details: Some(e.to_string()),
            }),
        )
    })?;
    Ok(Json(tokens))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub resolver: ResolverStats,
    pub admission_available: usize,
}

/// Get resolver statistics
async fn get_stats(State(router): State<Arc<Router>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        resolver: router.resolver.stats(),
        admission_available: router.resolver.admission_available(),
    })
}
