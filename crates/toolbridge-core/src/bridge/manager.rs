//! Caller-owned set of bridges sharing one tool registry

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::BridgeConfig;
use crate::error::OperationResult;
use crate::logging::SharedLogger;
use crate::tools::ToolRegistry;
use crate::transport::Transport;
use super::session::Bridge;

/// Handle returned by [`BridgeManager::create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BridgeId(u64);

impl std::fmt::Display for BridgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bridge-{}", self.0)
    }
}

/// Keeps independent bridges (e.g. one per chat panel) by id.
///
/// Every bridge created here uses the manager's registry, so a tool
/// registered once is available to all of them.
pub struct BridgeManager {
    registry: Arc<ToolRegistry>,
    bridges: RwLock<HashMap<BridgeId, Arc<Bridge>>>,
    next_id: AtomicU64,
    logger: SharedLogger,
}

impl BridgeManager {
    pub fn new(registry: Arc<ToolRegistry>, logger: SharedLogger) -> Self {
        Self {
            registry,
            bridges: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            logger,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Create an idle bridge talking HTTP to `config.endpoint`
    pub fn create(&self, config: BridgeConfig) -> OperationResult<BridgeId> {
        let bridge = Bridge::connect(config, Arc::clone(&self.registry), Arc::clone(&self.logger))?;
        Ok(self.insert(bridge))
    }

    /// Create an idle bridge over a caller-supplied transport
    pub fn create_with_transport(
        &self,
        config: BridgeConfig,
        transport: Arc<dyn Transport>,
    ) -> OperationResult<BridgeId> {
        let bridge = Bridge::new(config, transport, Arc::clone(&self.registry), Arc::clone(&self.logger))?;
        Ok(self.insert(bridge))
    }

    pub fn get(&self, id: BridgeId) -> Option<Arc<Bridge>> {
        self.bridges.read().get(&id).cloned()
    }

    /// Stop and forget a bridge; false if the id is unknown
    pub fn remove(&self, id: BridgeId) -> bool {
        let removed = self.bridges.write().remove(&id);
        match removed {
            Some(bridge) => {
                bridge.stop();
                self.logger.info(&format!("[BridgeManager] removed {}", id));
                true
            }
            None => false,
        }
    }

    /// Ids of live bridges, oldest first
    pub fn ids(&self) -> Vec<BridgeId> {
        let mut ids: Vec<BridgeId> = self.bridges.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.bridges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridges.read().is_empty()
    }

    /// Stop and forget every bridge
    pub fn stop_all(&self) {
        let drained: Vec<Arc<Bridge>> = self.bridges.write().drain().map(|(_, b)| b).collect();
        for bridge in &drained {
            bridge.stop();
        }
        if !drained.is_empty() {
            self.logger
                .info(&format!("[BridgeManager] stopped {} bridges", drained.len()));
        }
    }

    fn insert(&self, bridge: Bridge) -> BridgeId {
        let id = BridgeId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.bridges.write().insert(id, Arc::new(bridge));
        self.logger.info(&format!("[BridgeManager] created {}", id));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeState;
    use crate::error::{BoxError, ErrorKind};
    use crate::logging::NoOpLogger;
    use crate::tools::{handler_fn, Tool};
    use crate::transport::{MockReply, MockTransport};
    use crate::types::{FunctionSpec, ToolCallRequest};
    use serde_json::json;

    fn manager() -> BridgeManager {
        BridgeManager::new(Arc::new(ToolRegistry::default()), Arc::new(NoOpLogger))
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let manager = manager();
        let a = manager
            .create_with_transport(BridgeConfig::default(), Arc::new(MockTransport::new()))
            .unwrap();
        let b = manager.create(BridgeConfig::default()).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.to_string(), "bridge-1");
        assert_eq!(manager.ids(), vec![a, b]);
        assert_eq!(manager.len(), 2);

        let bridge = manager.get(a).unwrap();
        assert!(manager.remove(a));
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert!(manager.get(a).is_none());
        assert!(!manager.remove(a));

        manager.stop_all();
        assert!(manager.is_empty());
    }

    #[test]
    fn test_invalid_config_creates_nothing() {
        let manager = manager();
        let err = manager
            .create(BridgeConfig::default().with_endpoint("not a url"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_bridges_share_tools_but_not_conversations() {
        let manager = manager();
        manager.registry().register_tool(
            Tool::new("clock", "Time", handler_fn(|_, _| async { Ok::<_, BoxError>(json!("12:00")) }))
                .with_function(FunctionSpec::new("now", "Current time")),
            None,
        );

        let first = manager
            .create_with_transport(
                BridgeConfig::default(),
                Arc::new(MockTransport::with_replies([
                    MockReply::tool_call(ToolCallRequest::new("clock", "now", json!({}))),
                    MockReply::text("It is noon."),
                ])),
            )
            .unwrap();
        let second = manager
            .create_with_transport(
                BridgeConfig::default(),
                Arc::new(MockTransport::with_replies([MockReply::text("Hello.")])),
            )
            .unwrap();

        let (a, b) = (manager.get(first).unwrap(), manager.get(second).unwrap());
        a.start().unwrap();
        b.start().unwrap();
        let (ra, rb) = tokio::join!(a.send_prompt("time?"), b.send_prompt("hi"));

        assert_eq!(ra.unwrap(), "It is noon.");
        assert_eq!(rb.unwrap(), "Hello.");
        assert_eq!(a.conversation().len(), 4);
        assert_eq!(b.conversation().len(), 2);
        assert_eq!(a.conversation()[2].content, "\"12:00\"");
    }
}
