//! Cache control: how long a freshly computed bundle stays fresh.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::store::Bundle;
use crate::value::{Target, Value};

/// Everything a dynamic TTL policy may look at.
pub struct TtlContext<'a> {
    pub target: &'a dyn Target,
    pub operation: &'a str,
    pub arguments: &'a [Value],
    /// The bundle that was just computed
    pub bundle: &'a Bundle,
}

type TtlFn = dyn Fn(&TtlContext<'_>) -> Duration + Send + Sync;

/// TTL policy shared by a proxy and every proxy derived from it.
#[derive(Clone)]
pub enum CacheControl {
    Fixed(Duration),
    /// Evaluated once per miss, after the call has been computed
    Dynamic(Arc<TtlFn>),
}

impl CacheControl {
    pub fn fixed(ttl: Duration) -> Self {
        CacheControl::Fixed(ttl)
    }

    pub fn dynamic<F>(policy: F) -> Self
    where
        F: Fn(&TtlContext<'_>) -> Duration + Send + Sync + 'static,
    {
        CacheControl::Dynamic(Arc::new(policy))
    }

    /// Fixed policy using the configured default TTL.
    pub fn from_config(config: &Config) -> Self {
        CacheControl::Fixed(config.default_ttl())
    }

    pub(crate) fn ttl_for(&self, ctx: &TtlContext<'_>) -> Duration {
        match self {
            CacheControl::Fixed(ttl) => *ttl,
            CacheControl::Dynamic(policy) => policy(ctx),
        }
    }
}

impl fmt::Debug for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheControl::Fixed(ttl) => f.debug_tuple("Fixed").field(ttl).finish(),
            CacheControl::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}
