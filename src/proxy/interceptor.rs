//! Stampede protection.
//!
//! Decides per call whether to serve from the store, compute and store,
//! wait for a concurrent writer, or compute without caching. All
//! coordination goes through the store's lock and wait primitives.

use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::output::OutputSink;
use crate::proxy::control::{CacheControl, TtlContext};
use crate::proxy::invoker;
use crate::store::{duration_ms, Bundle, Store};
use crate::value::{Target, Value};

/// How a call's bundle was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Fresh entry served from the store
    Hit,
    /// Lock acquired, computed here and stored
    Computed,
    /// Another writer held the lock and stored the entry while we waited
    Waited,
    /// Waiting failed, computed here without touching the store
    Fallback,
}

/// One intercepted call.
pub(crate) struct Call<'a> {
    pub target: &'a dyn Target,
    pub operation: &'a str,
    pub args: &'a [Value],
    /// Store path derived from the operation and arguments
    pub path: &'a str,
}

impl Call<'_> {
    fn compute(&self, sink: &mut OutputSink) -> Result<Bundle> {
        invoker::catch(self.target, self.operation, self.args, sink)
    }
}

/// Resolves `call` to a bundle.
///
/// Target failures propagate and leave nothing in the store. Store failures
/// propagate as well, releasing the lock if this call held it. Only a failed
/// `wait`, or an entry gone missing right after one, degrades to an uncached
/// compute.
pub(crate) fn resolve(
    store: &dyn Store,
    control: &CacheControl,
    call: &Call<'_>,
    sink: &mut OutputSink,
) -> Result<(Bundle, Resolution)> {
    let path = call.path;

    if let Some(bundle) = store.get_if_fresh(path)? {
        return Ok((bundle, Resolution::Hit));
    }

    if store.lock(path)? {
        let bundle = match call.compute(sink) {
            Ok(bundle) => bundle,
            Err(err) => {
                release(store, path);
                return Err(err);
            }
        };

        let ttl = control.ttl_for(&TtlContext {
            target: call.target,
            operation: call.operation,
            arguments: call.args,
            bundle: &bundle,
        });
        if let Err(err) = store.set(path, bundle.clone(), ttl) {
            release(store, path);
            return Err(err);
        }
        debug!(path, ttl_ms = duration_ms(ttl), "Stored computed call");
        return Ok((bundle, Resolution::Computed));
    }

    if store.wait(path)? {
        // The entry can be evicted between `wait` and `get`; treat that
        // like a failed wait.
        match store.get(path) {
            Ok(bundle) => return Ok((bundle, Resolution::Waited)),
            Err(CacheError::StoreUnavailable(reason)) => {
                warn!(path, %reason, "Entry vanished after wait");
            }
            Err(err) => return Err(err),
        }
    }

    warn!(path, "Gave up waiting for concurrent writer, computing uncached");
    let bundle = call.compute(sink)?;
    Ok((bundle, Resolution::Fallback))
}

/// Best-effort lock release; the caller's own error wins.
fn release(store: &dyn Store, path: &str) {
    if let Err(err) = store.release(path) {
        warn!(path, error = %err, "Failed to release lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::value::DispatchTarget;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Store that is always locked by someone else.
    struct ContendedStore {
        wait_succeeds: bool,
        entry: Option<Bundle>,
    }

    impl Store for ContendedStore {
        fn get_if_fresh(&self, _path: &str) -> Result<Option<Bundle>> {
            Ok(None)
        }

        fn get(&self, path: &str) -> Result<Bundle> {
            self.entry
                .clone()
                .ok_or_else(|| CacheError::StoreUnavailable(path.to_string()))
        }

        fn set(&self, path: &str, _bundle: Bundle, _ttl: Duration) -> Result<()> {
            panic!("unexpected set at {}", path)
        }

        fn lock(&self, _path: &str) -> Result<bool> {
            Ok(false)
        }

        fn wait(&self, _path: &str) -> Result<bool> {
            Ok(self.wait_succeeds)
        }

        fn descend(&self, _segment: &str) -> Arc<dyn Store> {
            unreachable!()
        }
    }

    /// Store that grants the lock but cannot write, recording releases.
    #[derive(Default)]
    struct ReadOnlyStore {
        released: parking_lot::Mutex<Vec<String>>,
    }

    impl Store for ReadOnlyStore {
        fn get_if_fresh(&self, _path: &str) -> Result<Option<Bundle>> {
            Ok(None)
        }

        fn get(&self, path: &str) -> Result<Bundle> {
            Err(CacheError::StoreUnavailable(path.to_string()))
        }

        fn set(&self, _path: &str, _bundle: Bundle, _ttl: Duration) -> Result<()> {
            Err(CacheError::StoreUnavailable("read-only".to_string()))
        }

        fn lock(&self, _path: &str) -> Result<bool> {
            Ok(true)
        }

        fn wait(&self, _path: &str) -> Result<bool> {
            Ok(false)
        }

        fn release(&self, path: &str) -> Result<()> {
            self.released.lock().push(path.to_string());
            Ok(())
        }

        fn descend(&self, _segment: &str) -> Arc<dyn Store> {
            unreachable!()
        }
    }

    struct Counting {
        target: DispatchTarget,
        calls: Arc<AtomicUsize>,
    }

    fn counting(fail: bool) -> Counting {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let target = DispatchTarget::builder()
            .operation("render", move |_, sink| {
                seen.fetch_add(1, Ordering::SeqCst);
                sink.emit("hi")?;
                if fail {
                    anyhow::bail!("render failed");
                }
                Ok(Value::from(42))
            })
            .build();
        Counting { target, calls }
    }

    fn call<'a>(target: &'a DispatchTarget) -> Call<'a> {
        Call {
            target,
            operation: "render",
            args: &[],
            path: "render()",
        }
    }

    fn memory() -> MemoryStore {
        MemoryStore::new(10, Duration::from_secs(30), Duration::from_millis(50))
    }

    fn control() -> CacheControl {
        CacheControl::fixed(Duration::from_secs(60))
    }

    #[test]
    fn test_miss_then_hit() {
        let c = counting(false);
        let store = memory();
        let mut sink = OutputSink::buffer();

        let (first, how) = resolve(&store, &control(), &call(&c.target), &mut sink).unwrap();
        assert_eq!(how, Resolution::Computed);
        assert_eq!(first, Bundle::new("hi", 42));

        let (second, how) = resolve(&store, &control(), &call(&c.target), &mut sink).unwrap();
        assert_eq!(how, Resolution::Hit);
        assert_eq!(second, first);
        assert_eq!(c.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.contents(), "", "Resolving never emits by itself");
    }

    #[test]
    fn test_lock_denied_and_wait_succeeds_reuses_entry() {
        let c = counting(false);
        let store = ContendedStore {
            wait_succeeds: true,
            entry: Some(Bundle::new("theirs", 7)),
        };
        let mut sink = OutputSink::buffer();

        let (bundle, how) = resolve(&store, &control(), &call(&c.target), &mut sink).unwrap();

        assert_eq!(how, Resolution::Waited);
        assert_eq!(bundle, Bundle::new("theirs", 7));
        assert_eq!(c.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wait_failure_falls_back_without_storing() {
        let c = counting(false);
        let store = ContendedStore {
            wait_succeeds: false,
            entry: None,
        };
        let mut sink = OutputSink::buffer();

        // ContendedStore panics on set, so reaching the end proves no write
        let (bundle, how) = resolve(&store, &control(), &call(&c.target), &mut sink).unwrap();

        assert_eq!(how, Resolution::Fallback);
        assert_eq!(bundle, Bundle::new("hi", 42));
        assert_eq!(c.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_compute_releases_lock_and_stores_nothing() {
        let c = counting(true);
        let store = memory();
        let mut sink = OutputSink::buffer();

        let err = resolve(&store, &control(), &call(&c.target), &mut sink).unwrap_err();

        assert!(matches!(err, CacheError::Target(_)));
        assert!(store.is_empty());
        assert!(!store.is_locked("render()"));
        assert_eq!(sink.contents(), "");
    }

    #[test]
    fn test_failed_set_releases_lock() {
        let c = counting(false);
        let store = ReadOnlyStore::default();
        let mut sink = OutputSink::buffer();

        let err = resolve(&store, &control(), &call(&c.target), &mut sink).unwrap_err();

        assert!(matches!(err, CacheError::StoreUnavailable(_)));
        assert_eq!(*store.released.lock(), vec!["render()".to_string()]);
        assert_eq!(c.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entry_evicted_between_wait_and_get_falls_back() {
        let c = counting(false);
        let store = MemoryStore::new(1, Duration::from_secs(30), Duration::from_millis(500));
        assert!(store.lock("render()").unwrap());
        store.set("render()", Bundle::new("theirs", 7), Duration::from_secs(60)).unwrap();
        // Another key's write evicts the entry the waiter is about to read
        store.set("other()", Bundle::new("x", 0), Duration::from_secs(60)).unwrap();
        let evicting = EvictBeforeGet {
            inner: store.clone(),
        };
        let mut sink = OutputSink::buffer();

        let (bundle, how) = resolve(&evicting, &control(), &call(&c.target), &mut sink).unwrap();

        assert_eq!(how, Resolution::Fallback);
        assert_eq!(bundle, Bundle::new("hi", 42));
        assert_eq!(store.stats().evictions, 1);
    }

    /// Reports a successful wait for an entry the memory store already evicted.
    struct EvictBeforeGet {
        inner: MemoryStore,
    }

    impl Store for EvictBeforeGet {
        fn get_if_fresh(&self, _path: &str) -> Result<Option<Bundle>> {
            Ok(None)
        }

        fn get(&self, path: &str) -> Result<Bundle> {
            self.inner.get(path)
        }

        fn set(&self, path: &str, _bundle: Bundle, _ttl: Duration) -> Result<()> {
            panic!("unexpected set at {}", path)
        }

        fn lock(&self, _path: &str) -> Result<bool> {
            Ok(false)
        }

        fn wait(&self, _path: &str) -> Result<bool> {
            Ok(true)
        }

        fn descend(&self, _segment: &str) -> Arc<dyn Store> {
            unreachable!()
        }
    }

    #[test]
    fn test_dynamic_ttl_evaluated_once_with_bundle() {
        let c = counting(false);
        let store = memory();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let control = CacheControl::dynamic(move |ctx| {
            record
                .lock()
                .push((ctx.operation.to_string(), ctx.bundle.clone()));
            Duration::from_secs(60)
        });
        let mut sink = OutputSink::buffer();

        resolve(&store, &control, &call(&c.target), &mut sink).unwrap();
        resolve(&store, &control, &call(&c.target), &mut sink).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ("render".to_string(), Bundle::new("hi", 42)));
    }
}
