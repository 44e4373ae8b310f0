// Route-fetch endpoint client
// This file implements a client of this service's own POST /api/swap-route
// endpoint, so a remote front end can drive a route session over HTTP
//
// Numan Thabit 2025 Nov

use crate::errors::ResolutionError;
use crate::metrics::{REQ_ERRORS, REQ_LATENCY};
use crate::router::request::{RouteFetchRequest, SwapRequest};
use crate::router::routes::Route;
use crate::router::session::RouteSource;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const SERVICE: &str = "route_api";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

#[derive(Clone)]
pub struct RouteApiClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl RouteApiClient {
    /// `base` is the service root; the route path is appended.
    pub fn new(base: &Url, timeout: Duration) -> Result<Self> {
        let endpoint = base
            .join("/api/swap-route")
            .context("build route-fetch endpoint url")?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client for route-fetch endpoint")?;
        Ok(Self { endpoint, client })
    }

    pub async fn fetch(&self, req: &SwapRequest) -> Result<Route, ResolutionError> {
        let _timer = REQ_LATENCY
            .with_label_values(&[SERVICE, "swap_route"])
            .start_timer();
        let result = self.fetch_inner(req).await;
        if result.is_err() {
            REQ_ERRORS.with_label_values(&[SERVICE, "swap_route"]).inc();
        }
        result
    }

    async fn fetch_inner(&self, req: &SwapRequest) -> Result<Route, ResolutionError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&RouteFetchRequest::from(req))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResolutionError::UpstreamTimeout
                } else {
                    ResolutionError::upstream(None, e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            return resp.json::<Route>().await.map_err(|e| {
                ResolutionError::upstream(Some(status.as_u16()), format!("route body: {e}"))
            });
        }

        let detail = resp
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_default();
        Err(error_from_status(status.as_u16(), detail))
    }
}

/// Inverse of `ResolutionError::status_code`.
fn error_from_status(status: u16, detail: String) -> ResolutionError {
    match status {
        400 => ResolutionError::InvalidInput(detail),
        404 => ResolutionError::NoRouteAvailable,
        408 => ResolutionError::UpstreamTimeout,
        429 => ResolutionError::RateLimited,
        503 => ResolutionError::UpstreamUnavailable,
        other => ResolutionError::upstream(Some(other), detail),
    }
}

impl RouteSource for RouteApiClient {
    async fn fetch_route(&self, req: &SwapRequest) -> Result<Route, ResolutionError> {
        self.fetch(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_camel_case_body_and_reads_route() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/swap-route"))
            .and(body_partial_json(json!({
                "tokenIn": "near",
                "tokenOut": "usdc.near",
                "amountIn": "2",
                "decimalsOut": 6,
                "slippageType": "Auto"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "route": ["Rhea"],
                "amountOut": "6.420000",
                "minimumReceived": "6.380000",
                "priceImpact": "0.5",
                "estimatedGas": "0.003",
                "fee": "0.003",
                "transactions": [],
                "needsUnwrap": false,
                "deadline": null,
                "hasSlippage": true,
                "dexId": "Rhea",
                "useIntents": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let client = RouteApiClient::new(&base, Duration::from_secs(5)).unwrap();
        let route = client
            .fetch(&SwapRequest::new("near", "usdc.near", "2", 24, 6))
            .await
            .unwrap();
        assert_eq!(route.amount_out, "6.420000");
        assert_eq!(route.dex_id, "Rhea");
    }

    #[tokio::test]
    async fn maps_error_statuses_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "amountIn must be positive"})),
            )
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let client = RouteApiClient::new(&base, Duration::from_secs(5)).unwrap();
        let err = client
            .fetch(&SwapRequest::new("near", "usdc.near", "0", 24, 6))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResolutionError::InvalidInput("amountIn must be positive".into())
        );
        assert_eq!(error_from_status(503, String::new()).status_code(), 503);
    }
}
