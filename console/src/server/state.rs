//! Server state

use std::sync::Arc;

use crate::audit::AuditRecorder;
use crate::authn::Authorizer;
use crate::ops::gateway::OperationGateway;
use crate::stacks::activity::StackActivity;
use crate::stacks::status::CountsCache;
use crate::stacks::store::StackStore;

/// Server state shared across handlers
pub struct ServerState {
    pub authorizer: Arc<dyn Authorizer>,
    pub gateway: Arc<OperationGateway>,
    pub stacks: Arc<StackStore>,
    pub counts: Arc<CountsCache>,
    pub activity: Arc<StackActivity>,
    pub audit: Arc<AuditRecorder>,
}

impl ServerState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        gateway: Arc<OperationGateway>,
        stacks: Arc<StackStore>,
        counts: Arc<CountsCache>,
        activity: Arc<StackActivity>,
        audit: Arc<AuditRecorder>,
    ) -> Self {
        Self {
            authorizer,
            gateway,
            stacks,
            counts,
            activity,
            audit,
        }
    }
}
