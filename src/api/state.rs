//! API shared state

use std::sync::Arc;

use crate::{actors::notifier::NotificationHandle, registry::NodeRegistry};

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Authoritative node status, shared with the liveness sweeper
    pub registry: NodeRegistry,

    /// Notification actor, used for connectivity tests
    pub notifications: NotificationHandle,

    /// Shared secret every report must carry
    pub password: Arc<str>,
}

impl ApiState {
    pub fn new(
        registry: NodeRegistry,
        notifications: NotificationHandle,
        password: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            registry,
            notifications,
            password: password.into(),
        }
    }
}
