use anyhow::{anyhow, Context, Result};
use near_swap_aggr::config::AppConfig;
use near_swap_aggr::router::request::SlippageDefaults;
use near_swap_aggr::router::router::create_api_router;
use near_swap_aggr::router::{RouteResolver, Router};
use near_swap_aggr::transport::TokenListClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal aggregator error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration from environment")?;

    let resolver = Arc::new(
        RouteResolver::new(config.resolver_settings(), config.max_inflight)
            .context("initialize route resolver")?,
    );
    let tokens =
        TokenListClient::new(config.tokens_endpoint.clone()).context("initialize token list client")?;
    let slippage = SlippageDefaults {
        max: config.default_max_slippage,
        min: config.default_min_slippage,
    };
    let router = Arc::new(Router::new(resolver.clone(), tokens, slippage));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("bind API server address {}", config.listen_addr))?;

    info!(
        address = %config.listen_addr,
        router = %config.router_endpoint,
        tokens = %config.tokens_endpoint,
        dexes = %config.dexes.join(","),
        "swap aggregator online"
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let api_router = create_api_router(router);
    let server = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, api_router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            warn!(error = %e, "API server error");
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = resolver.stats();
                info!(
                    total = stats.total,
                    succeeded = stats.succeeded,
                    failed = stats.failed,
                    short_circuited = stats.short_circuited,
                    admission_available = resolver.admission_available(),
                    "resolver heartbeat"
                );
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    warn!(error = %err, "ctrl_c listener error");
                }
                info!("Shutdown signal received, draining HTTP server");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(());
    server.await.context("join API server task")?;
    Ok(())
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
