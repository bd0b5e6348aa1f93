//! Settings file management

use secrecy::SecretString;
use serde::Deserialize;

use crate::logs::LogLevel;

/// Console daemon settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Authentication configuration
    pub auth: AuthSettings,

    /// Package manager configuration
    #[serde(default)]
    pub packages: PackageSettings,

    /// Compose tool configuration
    #[serde(default)]
    pub compose: ComposeSettings,

    /// Seconds without subprocess output before a stalled warning
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_secs: u64,

    /// Enable the stack reconciler worker
    #[serde(default = "default_true")]
    pub enable_reconciler: bool,

    /// Reconciler polling interval in seconds
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_stall_timeout() -> u64 {
    120
}

fn default_reconcile_interval() -> u64 {
    15
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8443
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Authentication settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Shared secret for session token verification
    pub token_secret: SecretString,

    /// Roles granted the privileged gate
    #[serde(default = "default_privileged_roles")]
    pub privileged_roles: Vec<String>,

    /// Groups granted the privileged gate
    #[serde(default = "default_privileged_groups")]
    pub privileged_groups: Vec<String>,
}

fn default_privileged_roles() -> Vec<String> {
    vec!["admin".to_string()]
}

fn default_privileged_groups() -> Vec<String> {
    vec!["wheel".to_string(), "root".to_string(), "sudo".to_string()]
}

/// Package manager settings
#[derive(Debug, Clone, Deserialize)]
pub struct PackageSettings {
    /// Package manager binary
    #[serde(default = "default_package_manager")]
    pub manager: String,

    /// Inject a non-interactive assume-yes flag for mutating operations
    #[serde(default = "default_true")]
    pub assume_yes: bool,
}

fn default_package_manager() -> String {
    "apt-get".to_string()
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            manager: default_package_manager(),
            assume_yes: true,
        }
    }
}

/// Compose tool settings
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeSettings {
    /// Compose command argv prefix
    #[serde(default = "default_compose_command")]
    pub command: Vec<String>,
}

fn default_compose_command() -> Vec<String> {
    vec!["docker".to_string(), "compose".to_string()]
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            command: default_compose_command(),
        }
    }
}
