//! Debug HTTP surface, compiled only in debug builds with `debug_http`.
//!
//! An Axum router exposing governor health, state snapshots, recent
//! diagnostics and a live SSE stream of governor events. `governor_sim serve`
//! mounts it over a scripted player.

mod routes;
mod sse;

pub use routes::{build_router, run_http_server, DebugHttpState, HttpServerError};
