// Transport layer
// reqwest clients for every external service the aggregator talks to
//
// Numan Thabit 2025 Nov

pub mod jsonrpc;
pub mod relay;
pub mod route_api;
pub mod routing;
pub mod tokens;

pub use jsonrpc::{JsonRpc, TxStatus};
pub use relay::{PublishedIntent, SolverRelay};
pub use route_api::RouteApiClient;
pub use routing::RoutingApi;
pub use tokens::{Token, TokenListClient};
