// Route session
// Debounces rapid input edits and applies resolution results in issue
// order: a resolution that was superseded while in flight is discarded,
// so the accepted route always belongs to the latest request.
//
// Numan Thabit 2025 Nov

use crate::config::AppConfig;
use crate::errors::ResolutionError;
use crate::router::request::SwapRequest;
use crate::router::routes::Route;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::debug;

/// Quiescence window before an edit is resolved.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

/// Anything that can turn a swap request into a route.
#[allow(async_fn_in_trait)]
pub trait RouteSource: Send + Sync {
    async fn fetch_route(&self, req: &SwapRequest) -> Result<Route, ResolutionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Accepted(Arc<Route>),
    /// A newer request was issued before this one finished.
    Superseded,
    Failed(ResolutionError),
}

pub struct RouteSession<S> {
    source: S,
    quiet: Duration,
    ticket: AtomicU64,
    latest: watch::Sender<Option<Arc<Route>>>,
}

impl<S: RouteSource> RouteSession<S> {
    pub fn new(source: S, quiet: Duration) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            source,
            quiet,
            ticket: AtomicU64::new(0),
            latest,
        }
    }

    /// Session debounced by the configured `debounce_ms`.
    pub fn from_config(source: S, config: &AppConfig) -> Self {
        Self::new(source, config.debounce())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.ticket.load(Ordering::SeqCst) == ticket
    }

    /// Issue a request. Later calls supersede earlier ones whether or not
    /// those have finished.
    pub async fn request(&self, req: SwapRequest) -> SessionOutcome {
        let ticket = self.ticket.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.quiet.is_zero() {
            tokio::time::sleep(self.quiet).await;
            if !self.is_current(ticket) {
                debug!(ticket, "edit superseded during debounce");
                return SessionOutcome::Superseded;
            }
        }

        let result = self.source.fetch_route(&req).await;

        match result {
            Ok(route) => {
                let route = Arc::new(route);
                // The ticket check runs under the channel's write lock, so
                // stores from overlapping requests cannot interleave.
                let stored = self.latest.send_if_modified(|slot| {
                    if self.is_current(ticket) {
                        *slot = Some(route.clone());
                        true
                    } else {
                        false
                    }
                });
                if stored {
                    SessionOutcome::Accepted(route)
                } else {
                    debug!(ticket, "discarding stale route");
                    SessionOutcome::Superseded
                }
            }
            Err(err) => {
                let cleared = self.latest.send_if_modified(|slot| {
                    if self.is_current(ticket) {
                        *slot = None;
                        true
                    } else {
                        false
                    }
                });
                if cleared {
                    SessionOutcome::Failed(err)
                } else {
                    SessionOutcome::Superseded
                }
            }
        }
    }

    /// Drop the accepted route and supersede anything in flight.
    pub fn invalidate(&self) {
        self.ticket.fetch_add(1, Ordering::SeqCst);
        self.latest.send_replace(None);
    }

    /// Latest accepted route, unless its deadline has passed.
    pub fn accepted(&self) -> Option<Arc<Route>> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.latest
            .borrow()
            .clone()
            .filter(|route| !route.is_expired(now_ms))
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Route>>> {
        self.latest.subscribe()
    }
}
