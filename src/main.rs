//! Cache Proxy demo runner
//!
//! Renders a small site through a caching proxy from several concurrent
//! workers and reports what the memory store saw.

use std::thread;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_proxy::{
    spawn_cleanup_task, CacheControl, CacheStats, CachingProxy, Config, DispatchTarget,
    MemoryStore, OutputSink, Proxied, Value,
};

/// Number of workers racing to render the same page
const WORKERS: usize = 4;

/// Simulated cost of rendering one page
const RENDER_COST: Duration = Duration::from_millis(200);

#[derive(Serialize)]
struct StatsReport {
    generated_at: String,
    stats: CacheStats,
    hit_rate: f64,
}

/// Entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the memory store and start the TTL cleanup task
/// 4. Render the same page from several workers at once, then once more
/// 5. Print the rendered page and a store statistics report
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_proxy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, default_ttl={}s, lock_ttl={}s, wait_timeout={}ms, cleanup_interval={}s",
        config.max_entries,
        config.default_ttl,
        config.lock_ttl,
        config.wait_timeout_ms,
        config.cleanup_interval
    );

    let store = MemoryStore::from_config(&config);
    let cleanup_handle = spawn_cleanup_task(
        store.clone(),
        Duration::from_secs(config.cleanup_interval),
    );

    let proxy = CachingProxy::wrap(site(), store.clone(), CacheControl::from_config(&config));

    let mut workers = Vec::with_capacity(WORKERS);
    for worker in 0..WORKERS {
        let proxy = proxy.clone();
        workers.push(tokio::task::spawn_blocking(move || {
            let html = render_page(&proxy, "home")?;
            info!(worker, bytes = html.len(), "Worker rendered page");
            anyhow::Ok(html)
        }));
    }

    let mut rendered = Vec::with_capacity(WORKERS);
    for worker in workers {
        rendered.push(worker.await??);
    }
    if rendered.windows(2).any(|pair| pair[0] != pair[1]) {
        anyhow::bail!("workers rendered different pages");
    }

    let again = tokio::task::spawn_blocking(move || render_page(&proxy, "home")).await??;
    println!("{}", again);

    let stats = store.stats();
    let report = StatsReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        hit_rate: stats.hit_rate(),
        stats,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    cleanup_handle.abort();
    info!("Demo complete");
    Ok(())
}

/// Renders `name` through the proxy and returns everything it emitted.
fn render_page(proxy: &CachingProxy, name: &str) -> anyhow::Result<String> {
    let mut sink = OutputSink::buffer();
    let page = proxy
        .invoke("page", &[name.into()], &mut sink)?
        .into_proxy()
        .context("page() did not return an object")?;
    let title = page
        .read("title")
        .and_then(Proxied::into_value)
        .and_then(|title| title.as_str().map(str::to_string))
        .context("page has no title")?;

    sink.emit(&format!("<!-- {} -->\n", title))?;
    page.invoke("render", &[], &mut sink)?;
    Ok(sink.take_contents())
}

/// A site whose pages are expensive to render.
fn site() -> DispatchTarget {
    DispatchTarget::builder()
        .operation("page", |args, _sink| {
            let name = args
                .first()
                .and_then(Value::as_data)
                .and_then(|v| v.as_str())
                .context("page() expects a name")?
                .to_string();
            Ok(Value::object(page(name)))
        })
        .build()
}

fn page(name: String) -> DispatchTarget {
    let title = format!("The {} page", name);
    DispatchTarget::builder()
        .field("title", title.clone())
        .operation("render", move |_, sink| {
            thread::sleep(RENDER_COST);
            sink.emit(&format!("<h1>{}</h1>\n<p>Rendered once for {}.</p>\n", title, name))?;
            Ok(Value::from(true))
        })
        .build()
}
