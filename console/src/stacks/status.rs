//! Derived stack status
//!
//! Status is a pure function of the live container counts and session
//! activity, recomputed on every query. It is never stored, so stored and
//! actual state cannot drift.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::models::stack::{StackContainer, StackStatus};

/// Compute a stack's aggregate status.
///
/// Precedence: an active deploy session overrides everything; a failed
/// last attempt with nothing running reports `error`; otherwise the
/// running/total ratio decides between `active`, `partial` and `stopped`.
pub fn stack_status(
    running_count: usize,
    container_count: usize,
    active_deploy_session: bool,
    last_deploy_failed: bool,
) -> StackStatus {
    if active_deploy_session {
        StackStatus::Deploying
    } else if last_deploy_failed && running_count == 0 {
        StackStatus::Error
    } else if container_count > 0 && running_count == container_count {
        StackStatus::Active
    } else if running_count > 0 && running_count < container_count {
        StackStatus::Partial
    } else {
        StackStatus::Stopped
    }
}

/// A snapshot of a stack's containers as last reported by the runtime
#[derive(Debug, Clone, Default)]
pub struct ContainerCounts {
    /// All containers belonging to the stack
    pub containers: Vec<StackContainer>,

    /// Snapshot time, `None` until the first refresh
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl ContainerCounts {
    /// Total container count
    pub fn total(&self) -> usize {
        self.containers.len()
    }

    /// Running container count
    pub fn running(&self) -> usize {
        self.containers.iter().filter(|c| c.is_running()).count()
    }
}

/// Shared cache of per-stack container snapshots, refreshed by the
/// reconciler worker and read by status queries.
#[derive(Debug, Default)]
pub struct CountsCache {
    counts: Mutex<HashMap<String, ContainerCounts>>,
}

impl CountsCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for a stack
    pub fn update(&self, stack_id: &str, containers: Vec<StackContainer>) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.insert(
            stack_id.to_string(),
            ContainerCounts {
                containers,
                refreshed_at: Some(Utc::now()),
            },
        );
    }

    /// Current snapshot for a stack, empty when never refreshed
    pub fn get(&self, stack_id: &str) -> ContainerCounts {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.get(stack_id).cloned().unwrap_or_default()
    }

    /// Drop snapshots for stacks that no longer exist
    pub fn retain(&self, ids: &[String]) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.retain(|id, _| ids.iter().any(|k| k == id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploying_overrides_everything() {
        assert_eq!(stack_status(3, 3, true, false), StackStatus::Deploying);
        assert_eq!(stack_status(0, 0, true, true), StackStatus::Deploying);
    }

    #[test]
    fn failed_attempt_with_nothing_running_is_error() {
        assert_eq!(stack_status(0, 3, false, true), StackStatus::Error);
        assert_eq!(stack_status(0, 0, false, true), StackStatus::Error);
    }

    #[test]
    fn failed_attempt_with_survivors_reports_counts() {
        assert_eq!(stack_status(2, 3, false, true), StackStatus::Partial);
        assert_eq!(stack_status(3, 3, false, true), StackStatus::Active);
    }

    #[test]
    fn all_running_is_active() {
        assert_eq!(stack_status(3, 3, false, false), StackStatus::Active);
    }

    #[test]
    fn some_running_is_partial() {
        assert_eq!(stack_status(2, 3, false, false), StackStatus::Partial);
        assert_eq!(stack_status(1, 3, false, false), StackStatus::Partial);
    }

    #[test]
    fn none_running_is_stopped() {
        assert_eq!(stack_status(0, 3, false, false), StackStatus::Stopped);
        assert_eq!(stack_status(0, 0, false, false), StackStatus::Stopped);
    }

    #[test]
    fn recomputation_is_pure() {
        for _ in 0..3 {
            assert_eq!(stack_status(2, 3, false, false), StackStatus::Partial);
        }
    }
}
