//! Application state

use std::sync::Arc;

use crate::app::options::AppOptions;
use crate::audit::AuditRecorder;
use crate::authn::{Authorizer, TokenAuthorizer};
use crate::errors::ConsoleError;
use crate::ops::gateway::OperationGateway;
use crate::ops::locks::LockRegistry;
use crate::server::state::ServerState;
use crate::stacks::activity::StackActivity;
use crate::stacks::runtime::{ComposeRuntime, ContainerRuntime};
use crate::stacks::status::CountsCache;
use crate::stacks::store::StackStore;

/// Application state shared across the server and workers
pub struct AppState {
    pub registry: Arc<LockRegistry>,
    pub stacks: Arc<StackStore>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub activity: Arc<StackActivity>,
    pub counts: Arc<CountsCache>,
    pub audit: Arc<AuditRecorder>,
    pub authorizer: Arc<dyn Authorizer>,
    pub gateway: Arc<OperationGateway>,
}

impl AppState {
    /// Initialize the application state
    pub async fn init(options: &AppOptions) -> Result<Arc<Self>, ConsoleError> {
        options.storage.layout.setup().await?;

        let registry = Arc::new(LockRegistry::new());
        let stacks = Arc::new(StackStore::new(options.storage.layout.stacks_dir()));
        let runtime: Arc<dyn ContainerRuntime> =
            Arc::new(ComposeRuntime::new(&options.compose));
        let activity = Arc::new(StackActivity::new());
        let counts = Arc::new(CountsCache::new());
        let audit = Arc::new(AuditRecorder::new(options.storage.layout.audit_log_file()));
        let authorizer: Arc<dyn Authorizer> = Arc::new(TokenAuthorizer::new(&options.auth));

        let gateway = Arc::new(OperationGateway::new(
            registry.clone(),
            stacks.clone(),
            activity.clone(),
            audit.clone(),
            options.packages.clone(),
            options.compose.clone(),
            options.session.clone(),
        ));

        Ok(Arc::new(Self {
            registry,
            stacks,
            runtime,
            activity,
            counts,
            audit,
            authorizer,
            gateway,
        }))
    }

    /// Build the server state view over this application state
    pub fn server_state(&self) -> ServerState {
        ServerState::new(
            self.authorizer.clone(),
            self.gateway.clone(),
            self.stacks.clone(),
            self.counts.clone(),
            self.activity.clone(),
            self.audit.clone(),
        )
    }
}
