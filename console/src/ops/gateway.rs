//! Operation gateway
//!
//! The single entry point for privileged operations: checks the caller's
//! privilege gate, validates the payload, resolves stack definitions,
//! acquires the resource lock, and launches the session. Rejections
//! (`Unauthorized`, `InvalidRequest`, `Busy`) happen before any subprocess
//! is spawned.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::audit::AuditRecorder;
use crate::authn::Identity;
use crate::errors::ConsoleError;
use crate::models::operation::{OperationKind, OperationPayload, OperationRequest, OperationResult};
use crate::models::stack::Stack;
use crate::ops::classifier::HeuristicClassifier;
use crate::ops::invocation::{compose_invocation, package_invocation, Invocation};
use crate::ops::locks::{LockGuard, LockRegistry};
use crate::ops::session::{run_operation, SessionContext, SessionEvent, SessionOptions};
use crate::stacks::activity::StackActivity;
use crate::stacks::store::StackStore;
use crate::storage::settings::{ComposeSettings, PackageSettings};

/// An admitted operation, holding its lock and ready to launch
pub struct AcceptedOperation {
    request: OperationRequest,
    invocation: Invocation,
    guard: LockGuard,
    stack: Option<Stack>,
}

impl AcceptedOperation {
    /// The accepted request
    pub fn request(&self) -> &OperationRequest {
        &self.request
    }
}

/// Gateway wiring
pub struct OperationGateway {
    registry: Arc<LockRegistry>,
    stacks: Arc<StackStore>,
    activity: Arc<StackActivity>,
    audit: Arc<AuditRecorder>,
    packages: PackageSettings,
    compose: ComposeSettings,
    session_options: SessionOptions,
}

impl OperationGateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<LockRegistry>,
        stacks: Arc<StackStore>,
        activity: Arc<StackActivity>,
        audit: Arc<AuditRecorder>,
        packages: PackageSettings,
        compose: ComposeSettings,
        session_options: SessionOptions,
    ) -> Self {
        Self {
            registry,
            stacks,
            activity,
            audit,
            packages,
            compose,
            session_options,
        }
    }

    /// Validate and admit a request, acquiring its resource lock.
    ///
    /// Returns synchronously-reportable errors (`Unauthorized`,
    /// `InvalidRequest`, `Busy`) before any subprocess exists.
    pub async fn admit(
        &self,
        identity: &Identity,
        payload: OperationPayload,
    ) -> Result<AcceptedOperation, ConsoleError> {
        if !identity.privileged {
            return Err(ConsoleError::Unauthorized(format!(
                "{} is not permitted to run privileged operations",
                identity.subject
            )));
        }

        let kind = payload.operation;
        let targets = payload.targets;

        if kind.requires_targets() && targets.is_empty() {
            return Err(ConsoleError::InvalidRequest(format!(
                "{} requires at least one target",
                kind.action_name()
            )));
        }

        let stack = if kind.is_stack() {
            if targets.len() != 1 {
                return Err(ConsoleError::InvalidRequest(
                    "Stack operations take exactly one stack id".to_string(),
                ));
            }
            let stack = match self.stacks.get(&targets[0]).await {
                Ok(stack) => stack,
                Err(ConsoleError::NotFound(msg)) => {
                    return Err(ConsoleError::InvalidRequest(msg))
                }
                Err(e) => return Err(e),
            };
            if kind == OperationKind::StackDeploy {
                validate_compose_definition(&stack.compose_content)?;
            }
            Some(stack)
        } else {
            validate_package_targets(&targets)?;
            None
        };

        let request = OperationRequest::new(kind, targets, identity.clone());
        let target_key = request.target_key();

        let guard = self
            .registry
            .try_acquire(&target_key, request.id)
            .ok_or_else(|| {
                ConsoleError::Busy(format!(
                    "Another operation is already running on {}",
                    target_key
                ))
            })?;

        let invocation = match &stack {
            Some(stack) => compose_invocation(&self.compose, kind, &stack.path),
            None => package_invocation(&self.packages, kind, &request.targets),
        };

        debug!(
            "Admitted {} for {} (key {})",
            request.kind.action_name(),
            request.requester.subject,
            target_key
        );

        Ok(AcceptedOperation {
            request,
            invocation,
            guard,
            stack,
        })
    }

    /// Launch the session for an admitted operation.
    ///
    /// Deploys materialize the stored definition first; a materialization
    /// failure surfaces before any subprocess is spawned and drops the
    /// lock with it.
    pub async fn launch(
        &self,
        accepted: AcceptedOperation,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<JoinHandle<OperationResult>, ConsoleError> {
        let AcceptedOperation {
            request,
            invocation,
            guard,
            stack,
        } = accepted;

        if request.kind == OperationKind::StackDeploy {
            let stack = stack.as_ref().ok_or_else(|| {
                ConsoleError::Internal("Deploy admitted without a stack".to_string())
            })?;
            self.stacks.materialize(stack).await?;
            self.activity.deploy_started(&stack.id);
        }

        let ctx = SessionContext {
            classifier: Box::new(HeuristicClassifier::for_kind(request.kind)),
            request,
            invocation,
            guard,
            audit: self.audit.clone(),
            activity: self.activity.clone(),
            options: self.session_options.clone(),
        };

        Ok(tokio::spawn(run_operation(ctx, events)))
    }
}

/// Reject package names that could be misread as flags or paths
fn validate_package_targets(targets: &[String]) -> Result<(), ConsoleError> {
    for target in targets {
        let valid = !target.is_empty()
            && !target.starts_with('-')
            && target
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | '_' | ':'));
        if !valid {
            return Err(ConsoleError::InvalidRequest(format!(
                "Invalid package name: {}",
                target
            )));
        }
    }
    Ok(())
}

/// A deployable definition must be a YAML mapping with a non-empty
/// `services` section.
fn validate_compose_definition(content: &str) -> Result<(), ConsoleError> {
    let value: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| ConsoleError::InvalidRequest(format!("Malformed compose definition: {}", e)))?;

    let services = value
        .get("services")
        .and_then(|s| s.as_mapping())
        .ok_or_else(|| {
            ConsoleError::InvalidRequest(
                "Compose definition has no services section".to_string(),
            )
        })?;

    if services.is_empty() {
        return Err(ConsoleError::InvalidRequest(
            "Compose definition declares no services".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_target_validation() {
        assert!(validate_package_targets(&["nginx".to_string()]).is_ok());
        assert!(validate_package_targets(&["libssl3:amd64".to_string()]).is_ok());
        assert!(validate_package_targets(&["g++".to_string()]).is_ok());
        assert!(validate_package_targets(&["--force-yes".to_string()]).is_err());
        assert!(validate_package_targets(&["a b".to_string()]).is_err());
        assert!(validate_package_targets(&["".to_string()]).is_err());
    }

    #[test]
    fn compose_validation_accepts_services() {
        let content = "services:\n  web:\n    image: nginx:latest\n";
        assert!(validate_compose_definition(content).is_ok());
    }

    #[test]
    fn compose_validation_rejects_garbage() {
        assert!(matches!(
            validate_compose_definition(": not yaml ["),
            Err(ConsoleError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_compose_definition("volumes:\n  data: {}\n"),
            Err(ConsoleError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_compose_definition("services: {}\n"),
            Err(ConsoleError::InvalidRequest(_))
        ));
    }
}
