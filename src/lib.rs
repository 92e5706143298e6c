//! Cache Proxy - A transparent caching interceptor
//!
//! Wraps any [`Target`] so that operation calls are memoized in a [`Store`]
//! together with the output they emit, with TTL expiry and single-flight
//! protection against concurrent recomputation.

pub mod config;
pub mod error;
pub mod output;
pub mod proxy;
pub mod store;
pub mod tasks;
pub mod value;

pub use config::Config;
pub use error::{CacheError, Result};
pub use output::{Capture, OutputSink};
pub use proxy::{derive_key, CacheControl, CachingProxy, Proxied, TtlContext};
pub use store::{Bundle, CacheStats, MemoryStore, Store};
pub use tasks::spawn_cleanup_task;
pub use value::{DispatchTarget, DispatchTargetBuilder, Target, Value};
