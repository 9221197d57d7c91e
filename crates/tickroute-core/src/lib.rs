//! # Tickroute Core
//!
//! Resilient endpoint-routing layer for aggregated financial data
//! providers.
//!
//! ## Overview
//!
//! This crate provides the routing machinery that sits between business
//! callers and upstream provider adapters:
//!
//! - **Endpoint registry** merged from a database table and a YAML file
//! - **Priority router** that ranks eligible endpoints per data category
//! - **Circuit breaker** isolating repeatedly-failing endpoints
//! - **Self-refreshing cache** (LRU + TTL + background refresh)
//! - **Route manager** composing all of the above behind one contract
//!
//! Provider adapters themselves (wire protocols, parsing) live outside
//! this crate; each endpoint hands the manager an opaque fetch function.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | LRU+TTL cache with pre-emptive background refresh |
//! | [`circuit_breaker`] | Per-endpoint fault isolation |
//! | [`endpoint`] | Endpoint configuration records and health |
//! | [`error`] | Fetch/invoke error taxonomy |
//! | [`fetch`] | Fetch function contract for adapters |
//! | [`manager`] | Composition root and public calling contract |
//! | [`registry`] | Configuration sources and merge policy |
//! | [`router`] | Endpoint filtering and ranking |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tickroute_core::{FetcherFn, Params, RouteManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = RouteManager::builder()
//!         .with_store_path("endpoints.duckdb")
//!         .with_yaml("endpoints.yaml")
//!         .register_fetcher(
//!             "tdx_daily_kline",
//!             Arc::new(FetcherFn(|params: Params| async move {
//!                 // call into the real provider adapter here
//!                 Ok(serde_json::json!({ "bars": [] }))
//!             })),
//!         )
//!         .build();
//!
//!     let bars = manager.invoke_best("daily_kline", Params::new()).await?;
//!     println!("{bars}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Business caller  │
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │  Route Manager   │────▶│   Smart Cache    │
//! └────────┬─────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ Endpoint Router  │     │ Circuit Breaker  │
//! └────────┬─────────┘     └────────┬─────────┘
//!          │                        │
//!          ▼                        ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ Endpoint Registry│     │  Fetch function  │
//! │   (DB ⊕ YAML)    │     │ (adapter-owned)  │
//! └──────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! All call-path failures surface to the immediate caller; this layer
//! performs no retries and no automatic endpoint fallback (callers own
//! that policy via the ranked [`router::EndpointRouter::find_endpoints`]
//! list). Repeated upstream failures escalate from `Upstream` errors to
//! `CircuitOpen` rejections, signalling callers to back off. Only
//! background cache-refresh failures are swallowed (logged and counted).

pub mod cache;
pub mod circuit_breaker;
pub mod endpoint;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod registry;
pub mod router;

// Re-export commonly used types at crate root for convenience

// Caching
pub use cache::{CacheConfig, CacheStats, RefreshFn, SmartCache};

// Circuit breaker
pub use circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStats,
};

// Endpoint records
pub use endpoint::{EndpointConfig, EndpointStatus, HealthPolicy, HealthStatus};

// Error types
pub use error::{FetchError, FetchErrorKind, InvokeError, RegistryError, ValidationError};

// Fetch contract
pub use fetch::{EndpointFetcher, FetchFuture, FetcherFn, Params};

// Manager
pub use manager::{EndpointSummary, ManagerConfig, RouteManager, RouteManagerBuilder};

// Registry
pub use registry::{EndpointRegistry, YamlEndpoint};

// Router
pub use router::{EndpointFilter, EndpointRouter};

// Config store (re-exported from tickroute-store)
pub use tickroute_store::{ConfigStore, EndpointRow, StoreError};
