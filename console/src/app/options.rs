//! Application configuration options

use std::time::Duration;

use crate::ops::session::SessionOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{AuthSettings, ComposeSettings, PackageSettings, Settings};
use crate::workers::reconciler;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Authentication configuration
    pub auth: AuthSettings,

    /// Package manager configuration
    pub packages: PackageSettings,

    /// Compose tool configuration
    pub compose: ComposeSettings,

    /// Operation session tuning
    pub session: SessionOptions,

    /// Reconciler worker options
    pub reconciler: reconciler::Options,

    /// Enable the reconciler worker
    pub enable_reconciler: bool,
}

impl AppOptions {
    /// Build options from the settings file and storage layout
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions { layout },
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            auth: settings.auth.clone(),
            packages: settings.packages.clone(),
            compose: settings.compose.clone(),
            session: SessionOptions {
                stall_timeout: Duration::from_secs(settings.stall_timeout_secs.max(1)),
            },
            reconciler: reconciler::Options {
                interval: Duration::from_secs(settings.reconcile_interval_secs.max(1)),
                ..Default::default()
            },
            enable_reconciler: settings.enable_reconciler,
        }
    }
}

/// Lifecycle options for the daemon
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8443,
        }
    }
}
