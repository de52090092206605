// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod app;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod relevance;
pub mod scheduler;
pub mod status;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::engine::{AggregationEngine, RunResult};
pub use crate::notify::{DeliverySink, NotifierMux};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: `RUST_LOG` filter (default `info`), JSON when `LOG_FORMAT=json`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json().with_target(false)).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
