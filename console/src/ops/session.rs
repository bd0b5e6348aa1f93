//! Operation session
//!
//! Binds one accepted request to one supervised subprocess: owns the
//! per-session sequence counter, forwards events in generation order,
//! watches for output stalls, emits exactly one terminal result, records
//! audit, and releases the lock on every exit path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditRecorder};
use crate::models::operation::{
    OperationKind, OperationRequest, OperationResult, Phase, ProgressEvent,
};
use crate::ops::classifier::LineClassifier;
use crate::ops::invocation::Invocation;
use crate::ops::locks::LockGuard;
use crate::ops::supervisor::Supervisor;
use crate::stacks::activity::StackActivity;

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Silence window before a stalled warning is emitted
    pub stall_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            stall_timeout: Duration::from_secs(120),
        }
    }
}

/// Events delivered to the connected client, in generation order
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A raw subprocess output line
    Output { line: String },

    /// A sequenced, classified progress event
    Progress(ProgressEvent),

    /// No output observed within the stall window; informational only
    Stalled { idle: Duration },

    /// The single terminal result
    Finished(OperationResult),
}

/// Everything an accepted operation needs to run
pub struct SessionContext {
    pub request: OperationRequest,
    pub invocation: Invocation,
    pub guard: LockGuard,
    pub classifier: Box<dyn LineClassifier>,
    pub audit: Arc<AuditRecorder>,
    pub activity: Arc<StackActivity>,
    pub options: SessionOptions,
}

/// Run an accepted operation to its terminal result.
///
/// The subprocess is spawned here, after the lock is already held. Client
/// disconnect (receiver dropped) terminates the subprocess; the child is
/// reaped, audited and the lock released on every path.
pub async fn run_operation(
    mut ctx: SessionContext,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> OperationResult {
    let mut sequence: u64 = 0;
    let action = ctx.request.kind.action_name();

    info!(
        "Session {} starting: {} {:?} by {}",
        ctx.request.id, action, ctx.request.targets, ctx.request.requester.subject
    );

    send_progress(
        &events,
        &mut sequence,
        Phase::Starting,
        0,
        format!("Starting {}", action),
    );

    let mut supervisor = match Supervisor::spawn(&ctx.invocation) {
        Ok(supervisor) => supervisor,
        Err(e) => {
            let result = OperationResult {
                success: false,
                message: e.to_string(),
                raw_output: String::new(),
                completed_at: Utc::now(),
            };
            return finish(ctx, events, sequence, result, false).await;
        }
    };

    let mut raw_output = String::new();
    let mut cancelled = false;

    loop {
        tokio::select! {
            next = tokio::time::timeout(ctx.options.stall_timeout, supervisor.next_line()) => {
                match next {
                    Ok(Some(line)) => {
                        raw_output.push_str(&line);
                        raw_output.push('\n');

                        if events.send(SessionEvent::Output { line: line.clone() }).is_err() {
                            cancelled = true;
                            break;
                        }

                        if let Some((phase, progress)) = ctx.classifier.classify(&line) {
                            send_progress(&events, &mut sequence, phase, progress, line);
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {
                        warn!(
                            "Session {}: no output for {:?}",
                            ctx.request.id, ctx.options.stall_timeout
                        );
                        let _ = events.send(SessionEvent::Stalled {
                            idle: ctx.options.stall_timeout,
                        });
                    }
                }
            }
            _ = events.closed() => {
                cancelled = true;
                break;
            }
        }
    }

    let exit = if cancelled {
        warn!(
            "Session {}: client disconnected, terminating subprocess",
            ctx.request.id
        );
        supervisor.terminate().await
    } else {
        supervisor.wait().await
    };

    let result = match (&exit, cancelled) {
        (_, true) => OperationResult {
            success: false,
            message: "Operation cancelled: client disconnected".to_string(),
            raw_output,
            completed_at: Utc::now(),
        },
        (Ok(status), false) if status.success() => OperationResult {
            success: true,
            message: format!("{} completed successfully", action),
            raw_output,
            completed_at: Utc::now(),
        },
        (Ok(status), false) => OperationResult {
            success: false,
            message: ctx
                .classifier
                .last_error()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} exited with {}", action, status)),
            raw_output,
            completed_at: Utc::now(),
        },
        (Err(e), false) => OperationResult {
            success: false,
            message: e.to_string(),
            raw_output,
            completed_at: Utc::now(),
        },
    };

    finish(ctx, events, sequence, result, cancelled).await
}

async fn finish(
    ctx: SessionContext,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut sequence: u64,
    result: OperationResult,
    cancelled: bool,
) -> OperationResult {
    let terminal_phase = if result.success {
        Phase::Complete
    } else {
        Phase::Error
    };
    send_progress(
        &events,
        &mut sequence,
        terminal_phase,
        100,
        result.message.clone(),
    );
    let _ = events.send(SessionEvent::Finished(result.clone()));

    // Deploy/start/restart outcomes feed the derived stack status
    if let Some(stack_id) = ctx.request.targets.first() {
        match ctx.request.kind {
            OperationKind::StackDeploy
            | OperationKind::StackStart
            | OperationKind::StackRestart => {
                ctx.activity.attempt_finished(stack_id, result.success);
            }
            _ => {}
        }
    }

    ctx.audit
        .record(AuditEntry {
            actor: ctx.request.requester.subject.clone(),
            action: ctx.request.kind.action_name().to_string(),
            target: ctx.request.targets.join(" "),
            success: result.success,
            detail: if cancelled {
                "cancelled".to_string()
            } else {
                result.message.clone()
            },
            timestamp: Utc::now(),
        })
        .await;

    info!(
        "Session {} finished: success={} cancelled={}",
        ctx.request.id, result.success, cancelled
    );

    // Lock release is the last act of the session
    drop(ctx.guard);

    result
}

fn send_progress(
    events: &mpsc::UnboundedSender<SessionEvent>,
    sequence: &mut u64,
    phase: Phase,
    progress: u8,
    message: String,
) {
    let event = ProgressEvent {
        sequence: *sequence,
        phase,
        progress,
        message,
        timestamp: Utc::now(),
    };
    *sequence += 1;
    let _ = events.send(SessionEvent::Progress(event));
}
