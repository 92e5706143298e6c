//! Proxy Module
//!
//! [`CachingProxy`] wraps a [`Target`] and a [`Store`] namespace. Every
//! operation call goes through the interceptor: the result and the output
//! the call emitted are cached together, and the output is replayed into
//! the caller's sink on every call, hit or miss.
//!
//! Object-typed results and fields come back wrapped in a child proxy whose
//! store namespace is the parent's namespace plus the call path (or
//! bracketed field name), so `page.body().title()` is cached at every step
//! and never collides with a top-level `title()`.

mod control;
mod interceptor;
mod invoker;
mod key;


use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{CacheError, Result};
use crate::output::OutputSink;
use crate::store::Store;
use crate::value::{Target, Value};

pub use control::{CacheControl, TtlContext};
pub use key::derive_key;

use interceptor::Call;

// == Proxied ==
/// What a proxied call or field read hands back.
#[derive(Debug, Clone)]
pub enum Proxied {
    Value(serde_json::Value),
    Proxy(CachingProxy),
}

impl Proxied {
    /// Returns the plain value, or None for a wrapped object.
    pub fn into_value(self) -> Option<serde_json::Value> {
        match self {
            Proxied::Value(value) => Some(value),
            Proxied::Proxy(_) => None,
        }
    }

    /// Returns the child proxy, or None for a plain value.
    pub fn into_proxy(self) -> Option<CachingProxy> {
        match self {
            Proxied::Proxy(proxy) => Some(proxy),
            Proxied::Value(_) => None,
        }
    }
}

impl From<Proxied> for Value {
    fn from(proxied: Proxied) -> Self {
        match proxied {
            Proxied::Value(value) => Value::Data(value),
            Proxied::Proxy(proxy) => Value::Object(Arc::new(proxy)),
        }
    }
}

// == Caching Proxy ==
/// Caching façade over a target.
///
/// Immutable once built; cloning shares the target, store and policy.
#[derive(Clone)]
pub struct CachingProxy {
    target: Arc<dyn Target>,
    store: Arc<dyn Store>,
    control: CacheControl,
}

impl CachingProxy {
    // == Constructor ==
    pub fn new(target: Arc<dyn Target>, store: Arc<dyn Store>, control: CacheControl) -> Self {
        Self {
            target,
            store,
            control,
        }
    }

    /// Convenience constructor taking the target and store by value.
    pub fn wrap(
        target: impl Target + 'static,
        store: impl Store + 'static,
        control: CacheControl,
    ) -> Self {
        Self::new(Arc::new(target), Arc::new(store), control)
    }

    // == Invoke ==
    /// Calls `operation` through the cache.
    ///
    /// The call's output is written to `sink` exactly once, whether it was
    /// computed now or replayed from the store.
    pub fn invoke(
        &self,
        operation: &str,
        args: &[Value],
        sink: &mut OutputSink,
    ) -> Result<Proxied> {
        let path = derive_key(operation, args)?;
        let call = Call {
            target: self.target.as_ref(),
            operation,
            args,
            path: &path,
        };

        let (bundle, resolution) =
            interceptor::resolve(self.store.as_ref(), &self.control, &call, sink)?;
        debug!(path = %path, ?resolution, "Resolved proxied call");

        sink.emit(&bundle.output)?;
        Ok(self.rewrap(bundle.value, &path))
    }

    // == Read ==
    /// Reads a field from the target. Field reads are not cached; object
    /// fields are wrapped so calls on them are.
    pub fn read(&self, field: &str) -> Option<Proxied> {
        self.target
            .field(field)
            .map(|value| self.rewrap(value, &field_segment(field)))
    }

    fn rewrap(&self, value: Value, segment: &str) -> Proxied {
        match value {
            Value::Data(data) => Proxied::Value(data),
            Value::Object(target) => Proxied::Proxy(CachingProxy {
                target,
                store: self.store.descend(segment),
                control: self.control.clone(),
            }),
        }
    }
}

/// Namespace segment for a field read.
///
/// Call paths always end in `)`, so a bracketed field name can never be
/// mistaken for one.
fn field_segment(name: &str) -> String {
    format!("[{}]", name)
}

impl Target for CachingProxy {
    fn call(
        &self,
        operation: &str,
        args: &[Value],
        sink: &mut OutputSink,
    ) -> anyhow::Result<Value> {
        self.invoke(operation, args, sink)
            .map(Value::from)
            .map_err(CacheError::into_target)
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.read(name).map(Value::from)
    }
}

impl fmt::Debug for CachingProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingProxy")
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}
