// Routing service client
// This file implements the HTTP client for the external swap routing
// service and classifies its failures into resolution errors
//
// Numan Thabit 2025 Nov

use crate::errors::ResolutionError;
use crate::metrics::{REQ_ERRORS, REQ_LATENCY};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const SERVICE: &str = "routing";

/// Longest upstream body echoed back inside an error.
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct RoutingApi {
    endpoint: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl RoutingApi {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .build()
            .context("build HTTP client for routing service")?;

        Ok(Self {
            endpoint,
            client,
            timeout,
        })
    }

    /// GET the route list. The timeout aborts the in-flight request.
    pub async fn fetch_routes(&self, query: &[(&str, String)]) -> Result<Value, ResolutionError> {
        let _timer = REQ_LATENCY
            .with_label_values(&[SERVICE, "route"])
            .start_timer();

        let result = self.fetch_routes_inner(query).await;
        if result.is_err() {
            REQ_ERRORS.with_label_values(&[SERVICE, "route"]).inc();
        }
        result
    }

    async fn fetch_routes_inner(&self, query: &[(&str, String)]) -> Result<Value, ResolutionError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            warn!(status = %status, body = %truncate(&body), "routing service request failed");
            return Err(classify_failure(status, &body));
        }

        debug!(bytes = body.len(), "routing service responded");
        serde_json::from_str(&body).map_err(|e| {
            ResolutionError::upstream(
                Some(status.as_u16()),
                format!("invalid JSON from routing service: {e}"),
            )
        })
    }
}

fn classify_transport(err: reqwest::Error) -> ResolutionError {
    if err.is_timeout() {
        ResolutionError::UpstreamTimeout
    } else {
        ResolutionError::upstream(None, format!("routing service unreachable: {err}"))
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

const NOT_FOUND_HINTS: &[&str] = &["no route", "no routes", "not found", "no path"];
const INVALID_INPUT_HINTS: &[&str] = &[
    "invalid",
    "failed to parse",
    "malformed",
    "missing field",
    "unknown variant",
    "failed to deserialize",
];

/// Best-effort classification of a non-success response. The routing service
/// does not separate "no route" from "bad pair" reliably, so this reads the body text.
pub fn classify_failure(status: StatusCode, body: &str) -> ResolutionError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ResolutionError::RateLimited;
    }
    if status == StatusCode::NOT_FOUND {
        return ResolutionError::NoRouteAvailable;
    }

    let lowered = body.to_ascii_lowercase();
    if status.is_client_error() {
        if NOT_FOUND_HINTS.iter().any(|hint| lowered.contains(hint)) {
            return ResolutionError::NoRouteAvailable;
        }
        if INVALID_INPUT_HINTS.iter().any(|hint| lowered.contains(hint)) {
            return ResolutionError::InvalidInput(truncate(body.trim()));
        }
    }

    ResolutionError::upstream(Some(status.as_u16()), truncate(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn classifies_statuses_and_bodies() {
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, ""),
            ResolutionError::RateLimited
        );
        assert_eq!(
            classify_failure(StatusCode::NOT_FOUND, "whatever"),
            ResolutionError::NoRouteAvailable
        );
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "Failed to parse the query string"),
            ResolutionError::InvalidInput(_)
        ));
        assert_eq!(
            classify_failure(StatusCode::BAD_REQUEST, "No routes found for pair"),
            ResolutionError::NoRouteAvailable
        );
        assert!(matches!(
            classify_failure(StatusCode::BAD_GATEWAY, "upstream exploded"),
            ResolutionError::UpstreamError {
                status: Some(502),
                ..
            }
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "teapot"),
            ResolutionError::UpstreamError {
                status: Some(400),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn forwards_query_and_parses_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/route"))
            .and(query_param("token_in", "near"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"dex_id": "Rhea"}])))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/route", server.uri())).unwrap();
        let api = RoutingApi::new(url, Duration::from_secs(5)).unwrap();
        let body = api
            .fetch_routes(&[("token_in", "near".to_string())])
            .await
            .unwrap();
        assert_eq!(body[0]["dex_id"], "Rhea");
    }

    #[tokio::test]
    async fn times_out_slow_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/route"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/route", server.uri())).unwrap();
        let api = RoutingApi::new(url, Duration::from_millis(50)).unwrap();
        let err = api.fetch_routes(&[]).await.unwrap_err();
        assert_eq!(err, ResolutionError::UpstreamTimeout);
    }

    #[tokio::test]
    async fn non_json_success_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/route", server.uri())).unwrap();
        let api = RoutingApi::new(url, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            api.fetch_routes(&[]).await,
            Err(ResolutionError::UpstreamError { .. })
        ));
    }
}
