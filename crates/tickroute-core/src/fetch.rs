//! Fetch function contract between the routing layer and provider adapters.
//!
//! Adapters (TDX binary protocol, HTTP wrappers, ...) live outside this
//! crate; they hand the manager one [`EndpointFetcher`] per endpoint. The
//! routing layer never interprets what the fetcher does internally.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::FetchError;

/// Call parameters for one endpoint invocation.
///
/// A `BTreeMap` so serialization is ordered, which keeps cache keys
/// deterministic for equal parameter sets.
pub type Params = BTreeMap<String, Value>;

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, FetchError>> + Send + 'a>>;

/// Opaque upstream fetch function for one endpoint.
///
/// Implementations must be `Send + Sync`; the manager shares them across
/// caller tasks and background cache refreshes.
pub trait EndpointFetcher: Send + Sync {
    fn fetch(&self, params: Params) -> FetchFuture<'_>;
}

/// Adapts a plain async closure into an [`EndpointFetcher`].
pub struct FetcherFn<F>(pub F);

impl<F, Fut> EndpointFetcher for FetcherFn<F>
where
    F: Fn(Params) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
{
    fn fetch(&self, params: Params) -> FetchFuture<'_> {
        Box::pin((self.0)(params))
    }
}
