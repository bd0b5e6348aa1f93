//! Per-stack session activity flags
//!
//! Sessions record deploy-in-flight and last-attempt-failed state here;
//! the status query feeds both into the pure status function. Held in
//! memory only: a daemon restart forgets old failures, matching the
//! derived-not-stored stance.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    deploying: bool,
    last_attempt_failed: bool,
}

/// Shared deploy-activity state, one entry per stack id
#[derive(Debug, Default)]
pub struct StackActivity {
    flags: Mutex<HashMap<String, Flags>>,
}

impl StackActivity {
    /// Create empty activity state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a deploy session as in flight for the stack
    pub fn deploy_started(&self, stack_id: &str) {
        let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        flags.entry(stack_id.to_string()).or_default().deploying = true;
    }

    /// Record the end of a deploy/start attempt
    pub fn attempt_finished(&self, stack_id: &str, success: bool) {
        let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        let entry = flags.entry(stack_id.to_string()).or_default();
        entry.deploying = false;
        entry.last_attempt_failed = !success;
    }

    /// Whether a deploy session is currently in flight for the stack
    pub fn is_deploying(&self, stack_id: &str) -> bool {
        let flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        flags.get(stack_id).map(|f| f.deploying).unwrap_or(false)
    }

    /// Whether the last deploy/start attempt for the stack failed
    pub fn last_attempt_failed(&self, stack_id: &str) -> bool {
        let flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        flags
            .get(stack_id)
            .map(|f| f.last_attempt_failed)
            .unwrap_or(false)
    }
}
