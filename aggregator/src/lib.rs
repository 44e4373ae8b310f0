// Library root module for near-swap-aggr
// This file defines the public API and module structure for the near-swap-aggr library
// It exports the route resolver, the execution engine and their transports
//
// Numan Thabit 2025 Nov

pub mod config;
pub mod control;
pub mod errors;
pub mod metrics;
pub mod router;
pub mod signing;
pub mod transport;
pub mod units;
pub mod venues;
