// Configuration management module
// This file handles loading and parsing of configuration settings
// from environment variables
//
// Numan Thabit 2025 Nov

use crate::router::execution::EngineSettings;
use crate::router::resolver::ResolverSettings;
use crate::router::session::DEFAULT_DEBOUNCE;
use crate::venues::{default_dexes, INTENTS_CONTRACT, WRAP_CONTRACT};
use anyhow::{ensure, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP API binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Routing service endpoint, e.g. https://router.intear.tech/route
    #[serde(default = "default_router_endpoint")]
    pub router_endpoint: Url,
    /// Reputable token list endpoint
    #[serde(default = "default_tokens_endpoint")]
    pub tokens_endpoint: Url,
    /// NEAR JSON-RPC endpoint used for confirmation polling and balance lookups
    #[serde(default = "default_near_rpc_endpoint")]
    pub near_rpc_endpoint: Url,
    /// Solver relay JSON-RPC endpoint for intent settlement
    #[serde(default = "default_solver_relay_endpoint")]
    pub solver_relay_endpoint: Url,
    /// Hard timeout for one routing service call
    #[serde(default = "default_route_timeout_ms")]
    pub route_timeout_ms: u64,
    /// Wait budget handed to the routing service
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Venue allow-list (APP__DEXES=Rhea,Veax,...)
    #[serde(default = "default_dexes")]
    pub dexes: Vec<String>,
    /// Routing service requests per second (0 = unlimited)
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: u32,
    /// Concurrent route resolutions admitted
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    #[serde(default = "default_max_slippage")]
    pub default_max_slippage: f64,
    #[serde(default = "default_min_slippage")]
    pub default_min_slippage: f64,
    /// Input quiescence before a route session resolves
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_confirmation_poll_ms")]
    pub confirmation_poll_ms: u64,
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    /// Per-call timeout for NEAR RPC requests (status polls, balance lookups)
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Per-call timeout for publishing an intent to the solver relay
    #[serde(default = "default_relay_timeout_ms")]
    pub relay_timeout_ms: u64,
    #[serde(default = "default_intents_recipient")]
    pub intents_recipient: String,
    #[serde(default = "default_wrap_contract")]
    pub wrap_contract: String,
    /// Origin passed as callbackUrl in NEP-413 payloads
    pub callback_origin: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("dexes")
                    .try_parsing(true),
            )
            .build()?;
        let loaded: AppConfig = cfg.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_inflight > 0, "APP__MAX_INFLIGHT must be positive");
        ensure!(self.route_timeout_ms > 0, "APP__ROUTE_TIMEOUT_MS must be positive");
        ensure!(
            self.confirmation_poll_ms > 0 && self.confirmation_timeout_ms > 0,
            "APP__CONFIRMATION_POLL_MS and APP__CONFIRMATION_TIMEOUT_MS must be positive"
        );
        ensure!(
            self.rpc_timeout_ms > 0 && self.relay_timeout_ms > 0,
            "APP__RPC_TIMEOUT_MS and APP__RELAY_TIMEOUT_MS must be positive"
        );
        ensure!(!self.dexes.is_empty(), "APP__DEXES must name at least one venue");
        ensure!(
            (0.0..=1.0).contains(&self.default_min_slippage)
                && (0.0..=1.0).contains(&self.default_max_slippage)
                && self.default_min_slippage <= self.default_max_slippage,
            "default slippage bounds must satisfy 0 <= min <= max <= 1"
        );
        Ok(())
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            endpoint: self.router_endpoint.clone(),
            timeout: Duration::from_millis(self.route_timeout_ms),
            max_wait_ms: self.max_wait_ms,
            dexes: self.dexes.clone(),
            rate_per_sec: self.rate_per_sec,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            poll_interval: Duration::from_millis(self.confirmation_poll_ms),
            confirmation_timeout: Duration::from_millis(self.confirmation_timeout_ms),
            intents_recipient: self.intents_recipient.clone(),
            wrap_contract: self.wrap_contract.clone(),
            callback_origin: self.callback_origin.clone(),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn parse_default_url(raw: &str) -> Url {
    Url::parse(raw).unwrap_or_else(|err| panic!("invalid built-in url {raw}: {err}"))
}

fn default_router_endpoint() -> Url {
    parse_default_url("https://router.intear.tech/route")
}

fn default_tokens_endpoint() -> Url {
    parse_default_url("https://prices.intear.tech/tokens-reputable")
}

fn default_near_rpc_endpoint() -> Url {
    parse_default_url("https://rpc.mainnet.near.org")
}

fn default_solver_relay_endpoint() -> Url {
    parse_default_url("https://solver-relay-v2.chaindefuser.com/rpc")
}

fn default_route_timeout_ms() -> u64 {
    15_000
}

fn default_max_wait_ms() -> u64 {
    3_000
}

fn default_rate_per_sec() -> u32 {
    50
}

fn default_max_inflight() -> usize {
    64
}

fn default_max_slippage() -> f64 {
    0.05
}

fn default_min_slippage() -> f64 {
    0.001
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

fn default_confirmation_poll_ms() -> u64 {
    2_000
}

fn default_confirmation_timeout_ms() -> u64 {
    30_000
}

fn default_rpc_timeout_ms() -> u64 {
    10_000
}

fn default_relay_timeout_ms() -> u64 {
    20_000
}

fn default_intents_recipient() -> String {
    INTENTS_CONTRACT.to_string()
}

fn default_wrap_contract() -> String {
    WRAP_CONTRACT.to_string()
}
