//! Stack reconciler worker
//!
//! Periodically refreshes each stack's container snapshot from the
//! container runtime so status queries stay current outside of active
//! deploy sessions. Read-only: never acquires operation locks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::stacks::runtime::ContainerRuntime;
use crate::stacks::status::CountsCache;
use crate::stacks::store::StackStore;

/// Reconciler worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,

    /// Initial delay before the first poll
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            initial_delay: Duration::from_secs(3),
        }
    }
}

/// Run the reconciler worker
pub async fn run<S, F>(
    options: &Options,
    store: Arc<StackStore>,
    runtime: Arc<dyn ContainerRuntime>,
    cache: Arc<CountsCache>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Reconciler worker starting...");

    // Initial delay
    sleep_fn(options.initial_delay).await;

    loop {
        // Check for shutdown
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Reconciler worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {
                // Continue with refresh
            }
        }

        refresh_all(&store, runtime.as_ref(), &cache).await;
    }
}

async fn refresh_all(store: &StackStore, runtime: &dyn ContainerRuntime, cache: &CountsCache) {
    let stacks = match store.load_all().await {
        Ok(stacks) => stacks,
        Err(e) => {
            warn!("Failed to load stack definitions: {}", e);
            return;
        }
    };

    let ids: Vec<String> = stacks.iter().map(|s| s.id.clone()).collect();
    cache.retain(&ids);

    for stack in &stacks {
        match runtime.list_containers(stack).await {
            Ok(containers) => {
                debug!(
                    "Stack {}: {} containers ({} running)",
                    stack.id,
                    containers.len(),
                    containers.iter().filter(|c| c.is_running()).count()
                );
                cache.update(&stack.id, containers);
            }
            Err(e) => {
                warn!("Failed to list containers for stack {}: {}", stack.id, e);
            }
        }
    }
}
