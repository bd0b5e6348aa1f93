//! Operation models and wire messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authn::Identity;

/// Lock key for package operations. The package database is host-wide, so
/// every package operation contends on this single key.
pub const PACKAGE_MANAGER_KEY: &str = "package-manager";

/// The kind of privileged operation requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Update,
    Install,
    Remove,
    Refresh,
    StackDeploy,
    StackStart,
    StackStop,
    StackRestart,
}

impl OperationKind {
    /// Whether this kind targets a stack rather than the package manager
    pub fn is_stack(&self) -> bool {
        matches!(
            self,
            OperationKind::StackDeploy
                | OperationKind::StackStart
                | OperationKind::StackStop
                | OperationKind::StackRestart
        )
    }

    /// Whether this kind requires a non-empty target list
    pub fn requires_targets(&self) -> bool {
        !matches!(self, OperationKind::Update | OperationKind::Refresh)
    }

    /// Action name used in audit entries and log lines
    pub fn action_name(&self) -> &'static str {
        match self {
            OperationKind::Update => "package_update",
            OperationKind::Install => "package_install",
            OperationKind::Remove => "package_remove",
            OperationKind::Refresh => "repo_refresh",
            OperationKind::StackDeploy => "stack_deploy",
            OperationKind::StackStart => "stack_start",
            OperationKind::StackStop => "stack_stop",
            OperationKind::StackRestart => "stack_restart",
        }
    }
}

/// An accepted operation request. Immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Session id, shared with the lock token holder field
    pub id: Uuid,

    /// Requested operation kind
    pub kind: OperationKind,

    /// Package names, or a single stack id for stack kinds
    pub targets: Vec<String>,

    /// The authorized caller
    pub requester: Identity,

    /// Acceptance timestamp
    pub requested_at: DateTime<Utc>,
}

impl OperationRequest {
    /// Create a request accepted now
    pub fn new(kind: OperationKind, targets: Vec<String>, requester: Identity) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            targets,
            requester,
            requested_at: Utc::now(),
        }
    }

    /// The lock key this request contends on
    pub fn target_key(&self) -> String {
        if self.kind.is_stack() {
            format!("stack:{}", self.targets.first().map(String::as_str).unwrap_or(""))
        } else {
            PACKAGE_MANAGER_KEY.to_string()
        }
    }
}

/// Coarse-grained progress phase assigned to subprocess output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Starting,
    Checking,
    Downloading,
    Installing,
    Verifying,
    Cleaning,
    Caching,
    Complete,
    Error,
}

/// A structured progress event, sequenced per session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Monotonic per-session sequence, starting at 0
    pub sequence: u64,

    /// Classified phase
    pub phase: Phase,

    /// Progress estimate, 0-100
    pub progress: u8,

    /// Human-readable message
    pub message: String,

    /// Emission timestamp
    pub timestamp: DateTime<Utc>,
}

/// The terminal outcome of an operation session. Exactly one per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the subprocess completed successfully
    pub success: bool,

    /// Terminal message shown to the client
    pub message: String,

    /// Full captured subprocess output
    pub raw_output: String,

    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
}

/// First client frame on the streaming endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationPayload {
    /// Requested operation kind
    pub operation: OperationKind,

    /// Package names, or a single stack id for stack kinds
    #[serde(default)]
    pub targets: Vec<String>,
}

/// Server frames on the streaming endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A raw subprocess output line
    Output { message: String },

    /// A structured status update
    Status {
        message: String,
        phase: Phase,
        progress: u8,
    },

    /// Terminal success frame
    Complete { message: String, success: bool },

    /// Terminal failure frame, also used for pre-spawn rejections
    Error { message: String, success: bool },
}
