//! Scope Cache - demo driver
//!
//! Simulates concurrent users opening views against a bounded scope registry
//! and a shared application output cache, then reports statistics as JSON.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scope_cache::{
    spawn_purge_task, Cache, Clock, Config, ProviderRegistry, ScopeContext, ScopeKind,
    ScopeRegistry, SystemClock, Ttl,
};

const WORKERS: usize = 4;
const REQUESTS_PER_WORKER: usize = 40;
const VIEWS_PER_WORKER: usize = 12;

/// Object living in a view scope.
#[derive(Debug)]
struct ViewBean {
    view: String,
    created_at: DateTime<Utc>,
}

impl ViewBean {
    fn new(view: &str) -> Self {
        Self {
            view: view.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// One worker's request loop: open a view, render a page through the cache.
fn simulate_views(
    worker: usize,
    registry: &ScopeRegistry<String, Arc<ViewBean>>,
    cache: &dyn Cache,
) {
    for request in 0..REQUESTS_PER_WORKER {
        let view = format!("view-{worker}-{}", request % VIEWS_PER_WORKER);
        let bean = registry.create_object(view.as_str(), "form", || Arc::new(ViewBean::new(&view)));

        let page = format!("page:{}", request % 5);
        if cache.get(&page).is_none() {
            cache.put_default(
                &page,
                json!({ "rendered_by": bean.view, "at": bean.created_at.to_rfc3339() }),
            );
        }
        cache.put_attribute(&page, "last_view", json!(view), Ttl::Forever);
    }
}

/// Main entry point for the scope cache demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Select the cache provider and create the application output cache
/// 4. Start the expired-entry purge task
/// 5. Run concurrent view workers against the scope registry
/// 6. End scopes and print statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scope_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting scope cache demo");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        max_active_scopes = config.max_active_scopes.get(),
        provider = ?config.provider,
        purge_interval_secs = config.purge_interval.as_secs(),
        "Configuration loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider = ProviderRegistry::with_defaults()
        .select_configured(&config, clock)
        .context("Failed to select cache provider")?;

    let application = ScopeContext::new(ScopeKind::Application);
    let output_cache = provider
        .get_cache(&application)
        .context("Failed to create application output cache")?;

    let purge_handle = spawn_purge_task(Arc::clone(&output_cache), config.purge_interval);

    let registry = Arc::new(ScopeRegistry::<String, Arc<ViewBean>>::from_config(
        &config,
        |object_id: &str, bean: &Arc<ViewBean>| -> anyhow::Result<()> {
            debug!(object_id, view = %bean.view, "Releasing view bean");
            Ok(())
        },
    ));

    let mut workers = Vec::with_capacity(WORKERS);
    for worker in 0..WORKERS {
        let registry = Arc::clone(&registry);
        let cache = Arc::clone(&output_cache);
        workers.push(tokio::task::spawn_blocking(move || {
            simulate_views(worker, &registry, cache.as_ref())
        }));
    }
    for worker in workers {
        worker.await.context("View worker failed")?;
    }

    // The user navigates away from one view, then the session ends
    if let Some(holder) = registry.active_holders().pop() {
        registry.end_scope(holder.as_str());
        info!(scope = %holder, "Ended most recent view scope");
    }
    let ended = registry.end_all_scopes();
    info!(ended, "Session ended");

    let report = json!({
        "scopes": registry.stats(),
        "application_cache": output_cache.stats(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to render statistics")?
    );

    purge_handle.abort();
    info!("Demo complete");
    Ok(())
}
