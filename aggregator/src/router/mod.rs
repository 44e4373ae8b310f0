// Router module - route resolution and execution plane
// This file wires the request model, the resolver that normalizes the
// routing service's answer, the route session and the execution engine
//
// Numan Thabit 2025 Nov

pub mod execution;
pub mod fields;
pub mod normalize;
pub mod request;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod validation;

#[allow(clippy::module_inception)]
pub mod router;

pub use execution::{ExecutionEngine, ExecutionState, SwapExecutionResult};
pub use request::{RouteFetchRequest, SlippagePolicy, SwapRequest};
pub use resolver::RouteResolver;
pub use router::Router;
pub use routes::{ExecutionStep, Route};
pub use session::{RouteSession, RouteSource, SessionOutcome};
