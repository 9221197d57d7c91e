//! CLI argument definitions for tickroute.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `endpoints` | List the merged endpoint registry |
//! | `best` | Show the routing winner for a data category |
//! | `check` | Validate both configuration sources and the merge |
//!
//! # Global Options
//!
//! | Option | Description |
//! |--------|-------------|
//! | `--db` | Path to the DuckDB endpoint config store |
//! | `--yaml` | Path to the YAML endpoint config file |
//! | `--json` | Machine-readable JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Inspect the merged registry
//! tickroute --db endpoints.duckdb --yaml endpoints.yaml endpoints
//!
//! # Only daily k-line endpoints, including failed ones
//! tickroute --yaml endpoints.yaml endpoints --category daily_kline --include-unhealthy
//!
//! # Who would serve realtime quotes right now?
//! tickroute --yaml endpoints.yaml best realtime_quote
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Operator CLI for the tickroute endpoint registry and router.
#[derive(Debug, Parser)]
#[command(
    name = "tickroute",
    author,
    version,
    about = "Inspect endpoint routing configuration",
    long_about = "tickroute inspects the merged endpoint registry used by the routing layer:\n\
\n\
  • endpoint records merged from DuckDB and YAML sources\n\
  • routing order per data category (priority, then quality score)\n\
  • endpoint health as accumulated by the invocation handler\n\
\n\
Use 'tickroute <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Path to the DuckDB endpoint config store.
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Path to the YAML endpoint config file.
    #[arg(long, global = true, value_name = "PATH")]
    pub yaml: Option<PathBuf>,

    /// Emit machine-readable JSON instead of a table.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the merged endpoint registry.
    Endpoints(EndpointsArgs),
    /// Show the routing winner for a data category.
    Best(BestArgs),
    /// Validate both configuration sources and report the merge result.
    Check,
}

#[derive(Debug, Args)]
pub struct EndpointsArgs {
    /// Only endpoints serving this data category.
    #[arg(long)]
    pub category: Option<String>,

    /// Only endpoints backed by this source.
    #[arg(long)]
    pub source: Option<String>,

    /// Include endpoints whose health is `failed`.
    #[arg(long)]
    pub include_unhealthy: bool,
}

#[derive(Debug, Args)]
pub struct BestArgs {
    /// Data category to route, e.g. `daily_kline`.
    pub category: String,
}
