//! Stack models

use serde::{Deserialize, Serialize};

/// Derived aggregate health of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackStatus {
    Active,
    Partial,
    Stopped,
    Error,
    Deploying,
}

/// A named group of containers defined by a compose declaration.
///
/// `status`, `container_count` and `running_count` are derived from the
/// container runtime at query time, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    /// Stack identifier (directory name under the stacks root)
    pub id: String,

    /// Display name
    pub name: String,

    /// Compose declaration text
    pub compose_content: String,

    /// Environment file text
    #[serde(default)]
    pub env_content: String,

    /// Directory the compose tool runs in
    pub path: std::path::PathBuf,
}

/// A container belonging to a stack, as reported by the container runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackContainer {
    /// Compose service name
    pub service: String,

    /// Container name
    pub container_name: String,

    /// Image reference
    pub image: String,

    /// Runtime state string (e.g. "running", "exited")
    pub status: String,

    /// Published ports
    #[serde(default)]
    pub ports: Vec<String>,
}

impl StackContainer {
    /// Whether the container is currently running
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }
}
