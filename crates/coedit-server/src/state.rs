//! Shared application state

use coedit_core::{EngineFactory, PushEvent, SessionRegistry, SessionSettings};
use std::sync::Arc;
use tokio::sync::broadcast;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub push: broadcast::Sender<PushEvent>,
}

impl AppState {
    /// Build the registry with a broadcast push channel of `push_buffer` slots
    pub fn new(
        settings: SessionSettings,
        engines: Arc<dyn EngineFactory>,
        push_buffer: usize,
    ) -> Self {
        let (push, _) = broadcast::channel(push_buffer.max(1));
        let registry = SessionRegistry::new(settings, engines).with_push_sink(Arc::new(push.clone()));

        Self {
            registry: Arc::new(registry),
            push,
        }
    }
}
