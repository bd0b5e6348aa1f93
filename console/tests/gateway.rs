//! Operation gateway integration tests
//!
//! Admission rules: privilege gate, payload validation, compose definition
//! checks, and immediate Busy on lock contention with no subprocess
//! spawned.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use bosun::audit::AuditRecorder;
use bosun::authn::Identity;
use bosun::errors::ConsoleError;
use bosun::filesys::dir::Dir;
use bosun::filesys::file::File;
use bosun::models::operation::{OperationKind, OperationPayload};
use bosun::ops::gateway::OperationGateway;
use bosun::ops::locks::LockRegistry;
use bosun::ops::session::{SessionEvent, SessionOptions};
use bosun::stacks::activity::StackActivity;
use bosun::stacks::store::StackStore;
use bosun::storage::settings::{ComposeSettings, PackageSettings};

struct Harness {
    registry: Arc<LockRegistry>,
    activity: Arc<StackActivity>,
    gateway: OperationGateway,
    base_dir: std::path::PathBuf,
}

impl Harness {
    async fn new() -> Self {
        // Echo-backed external commands keep the flow real without touching
        // the host
        Self::with_commands("/bin/echo", vec!["/bin/echo".to_string()]).await
    }

    async fn with_commands(manager: &str, compose: Vec<String>) -> Self {
        let base_dir = std::env::temp_dir().join(format!("bosun-gateway-{}", Uuid::new_v4()));
        let registry = Arc::new(LockRegistry::new());
        let activity = Arc::new(StackActivity::new());
        let stacks = Arc::new(StackStore::new(Dir::new(base_dir.join("stacks"))));
        let audit = Arc::new(AuditRecorder::new(File::new(base_dir.join("audit.log"))));

        let gateway = OperationGateway::new(
            registry.clone(),
            stacks,
            activity.clone(),
            audit,
            PackageSettings {
                manager: manager.to_string(),
                assume_yes: true,
            },
            ComposeSettings { command: compose },
            SessionOptions::default(),
        );

        Self {
            registry,
            activity,
            gateway,
            base_dir,
        }
    }

    async fn write_stack(&self, id: &str, compose_content: &str) {
        let dir = self.base_dir.join("stacks").join(id);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let definition = serde_json::json!({
            "name": id,
            "compose_content": compose_content,
            "env_content": "",
        });
        tokio::fs::write(dir.join("stack.json"), definition.to_string())
            .await
            .unwrap();
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.base_dir).ok();
    }
}

fn admin() -> Identity {
    Identity {
        subject: "operator".to_string(),
        role: "admin".to_string(),
        groups: vec![],
        privileged: true,
    }
}

fn viewer() -> Identity {
    Identity {
        subject: "viewer".to_string(),
        role: "viewer".to_string(),
        groups: vec!["staff".to_string()],
        privileged: false,
    }
}

fn payload(operation: OperationKind, targets: &[&str]) -> OperationPayload {
    OperationPayload {
        operation,
        targets: targets.iter().map(|t| t.to_string()).collect(),
    }
}

#[tokio::test]
async fn unprivileged_callers_are_rejected() {
    let harness = Harness::new().await;
    let result = harness
        .gateway
        .admit(&viewer(), payload(OperationKind::Update, &[]))
        .await;
    assert!(matches!(result, Err(ConsoleError::Unauthorized(_))));
    assert!(!harness.registry.is_held("package-manager"));
}

#[tokio::test]
async fn install_requires_targets() {
    let harness = Harness::new().await;
    let result = harness
        .gateway
        .admit(&admin(), payload(OperationKind::Install, &[]))
        .await;
    assert!(matches!(result, Err(ConsoleError::InvalidRequest(_))));
}

#[tokio::test]
async fn flag_like_package_names_are_rejected() {
    let harness = Harness::new().await;
    let result = harness
        .gateway
        .admit(&admin(), payload(OperationKind::Install, &["--purge"]))
        .await;
    assert!(matches!(result, Err(ConsoleError::InvalidRequest(_))));
}

#[tokio::test]
async fn concurrent_package_operations_get_busy() {
    let harness = Harness::new().await;

    let first = harness
        .gateway
        .admit(&admin(), payload(OperationKind::Update, &[]))
        .await
        .unwrap();

    // Second request on the same key is rejected immediately
    let second = harness
        .gateway
        .admit(&admin(), payload(OperationKind::Install, &["nginx"]))
        .await;
    assert!(matches!(second, Err(ConsoleError::Busy(_))));

    // Releasing the first admits new requests again
    drop(first);
    assert!(!harness.registry.is_held("package-manager"));
    assert!(harness
        .gateway
        .admit(&admin(), payload(OperationKind::Update, &[]))
        .await
        .is_ok());
}

#[tokio::test]
async fn independent_stacks_admit_concurrently() {
    let harness = Harness::new().await;
    harness
        .write_stack("media", "services:\n  web:\n    image: nginx\n")
        .await;
    harness
        .write_stack("db", "services:\n  pg:\n    image: postgres\n")
        .await;

    let media = harness
        .gateway
        .admit(&admin(), payload(OperationKind::StackStop, &["media"]))
        .await;
    let db = harness
        .gateway
        .admit(&admin(), payload(OperationKind::StackStop, &["db"]))
        .await;

    assert!(media.is_ok());
    assert!(db.is_ok());
}

#[tokio::test]
async fn unknown_stack_is_invalid_before_any_lock() {
    let harness = Harness::new().await;
    let result = harness
        .gateway
        .admit(&admin(), payload(OperationKind::StackStart, &["ghost"]))
        .await;
    assert!(matches!(result, Err(ConsoleError::InvalidRequest(_))));
    assert!(!harness.registry.is_held("stack:ghost"));
}

#[tokio::test]
async fn malformed_compose_is_invalid_before_any_lock() {
    let harness = Harness::new().await;
    harness.write_stack("broken", "volumes: [oops").await;

    let result = harness
        .gateway
        .admit(&admin(), payload(OperationKind::StackDeploy, &["broken"]))
        .await;
    assert!(matches!(result, Err(ConsoleError::InvalidRequest(_))));
    assert!(!harness.registry.is_held("stack:broken"));
}

#[tokio::test]
async fn deploy_materializes_definition_and_completes() {
    let harness = Harness::new().await;
    let compose_content = "services:\n  web:\n    image: nginx:latest\n";
    harness.write_stack("media", compose_content).await;

    let accepted = harness
        .gateway
        .admit(&admin(), payload(OperationKind::StackDeploy, &["media"]))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = harness.gateway.launch(accepted, tx).await.unwrap();
    let result = handle.await.unwrap();

    assert!(result.success);

    // The stored definition was written next to the stack for the compose tool
    let written = tokio::fs::read_to_string(
        harness.base_dir.join("stacks").join("media").join("compose.yaml"),
    )
    .await
    .unwrap();
    assert_eq!(written, compose_content);

    // Deploy finished: flag cleared, lock free
    assert!(!harness.activity.is_deploying("media"));
    assert!(!harness.activity.last_attempt_failed("media"));
    assert!(!harness.registry.is_held("stack:media"));

    // Exactly one terminal event reached the client
    let mut terminals = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, SessionEvent::Finished(_)) {
            terminals += 1;
        }
    }
    assert_eq!(terminals, 1);
}

#[tokio::test]
async fn package_operation_runs_to_completion_via_gateway() {
    let harness = Harness::new().await;

    let accepted = harness
        .gateway
        .admit(&admin(), payload(OperationKind::Install, &["nginx"]))
        .await
        .unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let handle = harness.gateway.launch(accepted, tx).await.unwrap();
    let result = handle.await.unwrap();

    assert!(result.success);
    assert!(!harness.registry.is_held("package-manager"));
}
