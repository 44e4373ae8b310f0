// Route resolver
// Validates a swap request, queries the routing service and normalizes
// the best route it returns. Guarded by admission control and a circuit
// breaker over upstream faults.
//
// Numan Thabit 2025 Nov

use crate::control::{AdmissionControl, BreakerPolicy, CircuitBreakers};
use crate::errors::ResolutionError;
use crate::metrics::RESOLUTIONS;
use crate::router::normalize::normalize_route;
use crate::router::request::SwapRequest;
use crate::router::routes::Route;
use crate::router::session::RouteSource;
use crate::router::validation::validate_swap_request;
use crate::transport::routing::RoutingApi;
use anyhow::Result;
use num_bigint::BigUint;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const BREAKER_CLASS: &str = "routing";

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub endpoint: Url,
    /// Hard timeout of one routing service call
    pub timeout: Duration,
    /// Wait budget the routing service may spend collecting venue quotes
    pub max_wait_ms: u64,
    /// Venue allow-list
    pub dexes: Vec<String>,
    /// Routing service requests per second; zero disables the limit
    pub rate_per_sec: u32,
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    short_circuited: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub short_circuited: u64,
}

pub struct RouteResolver {
    api: RoutingApi,
    settings: ResolverSettings,
    admission: AdmissionControl,
    breakers: CircuitBreakers,
    counters: Counters,
}

impl RouteResolver {
    pub fn new(settings: ResolverSettings, max_inflight: usize) -> Result<Self> {
        let api = RoutingApi::new(settings.endpoint.clone(), settings.timeout)?;
        let admission = AdmissionControl::new(max_inflight, settings.rate_per_sec);
        Ok(Self {
            api,
            settings,
            admission,
            breakers: CircuitBreakers::default(),
            counters: Counters::default(),
        })
    }

    pub fn with_breaker_policy(mut self, policy: BreakerPolicy) -> Self {
        self.breakers = CircuitBreakers::new(policy);
        self
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn admission_available(&self) -> usize {
        self.admission.available()
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            total: self.counters.total.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            short_circuited: self.counters.short_circuited.load(Ordering::Relaxed),
        }
    }

    /// Resolve the best route for `req`. Invalid input fails before any network call.
    #[tracing::instrument(skip_all, fields(token_in = %req.token_in, token_out = %req.token_out))]
    pub async fn resolve_route(&self, req: &SwapRequest) -> Result<Route, ResolutionError> {
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        let result = self.resolve_inner(req).await;

        let outcome = match &result {
            Ok(route) => {
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                info!(
                    dex = %route.dex_id,
                    amount_out = %route.amount_out,
                    steps = route.steps.len(),
                    intents = route.use_intents,
                    "route resolved"
                );
                "ok"
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, status = err.status_code(), "route resolution failed");
                outcome_label(err)
            }
        };
        RESOLUTIONS.with_label_values(&[outcome]).inc();
        result
    }

    async fn resolve_inner(&self, req: &SwapRequest) -> Result<Route, ResolutionError> {
        let amount_in = validate_swap_request(req)?;

        if self.breakers.is_open(BREAKER_CLASS).await {
            self.counters.short_circuited.fetch_add(1, Ordering::Relaxed);
            return Err(ResolutionError::UpstreamUnavailable);
        }

        let _permit = self
            .admission
            .acquire()
            .await
            .ok_or(ResolutionError::UpstreamUnavailable)?;

        let query = self.build_query(req, &amount_in);
        debug!(amount_in = %amount_in, params = query.len(), "querying routing service");

        let body = match self.api.fetch_routes(&query).await {
            Ok(body) => {
                self.breakers.record_success(BREAKER_CLASS).await;
                body
            }
            Err(err) => {
                if err.is_upstream_fault() {
                    self.breakers.record_failure(BREAKER_CLASS).await;
                } else {
                    self.breakers.record_success(BREAKER_CLASS).await;
                }
                return Err(err);
            }
        };

        normalize_route(body, req.decimals_out)
    }

    /// Routing service query. Token ids, including the native sentinel, pass through untouched.
    fn build_query(&self, req: &SwapRequest, amount_in: &BigUint) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("token_in", req.token_in.clone()),
            ("token_out", req.token_out.clone()),
            ("amount_in", amount_in.to_string()),
            ("max_wait_ms", self.settings.max_wait_ms.to_string()),
        ];
        query.extend(req.slippage.query_pairs());
        query.push(("dexes", self.settings.dexes.join(",")));
        if let Some(account) = &req.trader_account_id {
            query.push(("trader_account_id", account.clone()));
        }
        if let Some(key) = &req.signing_public_key {
            query.push(("signing_public_key", key.clone()));
        }
        query
    }
}

fn outcome_label(err: &ResolutionError) -> &'static str {
    match err {
        ResolutionError::InvalidInput(_) => "invalid_input",
        ResolutionError::NoRouteAvailable => "no_route",
        ResolutionError::UpstreamTimeout => "timeout",
        ResolutionError::RateLimited => "rate_limited",
        ResolutionError::UpstreamError { .. } => "upstream_error",
        ResolutionError::UpstreamUnavailable => "unavailable",
    }
}

impl RouteSource for RouteResolver {
    async fn fetch_route(&self, req: &SwapRequest) -> Result<Route, ResolutionError> {
        self.resolve_route(req).await
    }
}
