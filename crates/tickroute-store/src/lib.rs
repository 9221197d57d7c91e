//! # Tickroute Store
//!
//! DuckDB-backed configuration store for tickroute endpoint records.
//!
//! ## Overview
//!
//! This crate owns the `endpoint_configs` table: the authoritative,
//! operator-managed side of the endpoint registry. The routing layer reads
//! `status = 'active'` rows at startup and on reload; it never writes health
//! fields back to the store.
//!
//! All user input is handled through parameterized queries.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickroute_store::ConfigStore;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ConfigStore::open("endpoints.duckdb")?;
//!     let rows = store.load_active()?;
//!     println!("loaded {} active endpoint rows", rows.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod models;
pub mod store;

pub use error::StoreError;
pub use models::EndpointRow;
pub use store::ConfigStore;
