//! Session registry
//!
//! Process-wide owner of all sessions. Mints ids, builds sessions, hands out
//! handles and applies the eviction policy. The store lock is only held for
//! map operations; callers lock the individual session afterwards, so a slow
//! chat turn never blocks access to other sessions.

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SessionSettings;
use crate::engine::EngineFactory;
use crate::error::{Error, Result};
use crate::model::{ModelConfig, ModelSettings};
use crate::redirect::PushSink;
use crate::session::{Session, SessionHandle, SessionId, SessionInfo, SessionOptions};
use crate::store::{MemoryStore, SessionStore};
use crate::workspace::{GitRepo, SourceControl};

/// Parameters of a new session
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    /// Model name; the configured default when absent
    #[serde(default)]
    pub model_name: Option<String>,
    /// Git work tree to bind; empty or absent means none
    #[serde(default, alias = "repo_path")]
    pub workspace_path: Option<PathBuf>,
    /// Explicit model settings
    #[serde(default)]
    pub model_config: Option<ModelConfig>,
}

impl StartRequest {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: Some(model_name.into()),
            ..Default::default()
        }
    }

    pub fn with_workspace(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace_path = Some(path.into());
        self
    }

    pub fn with_model_config(mut self, config: ModelConfig) -> Self {
        self.model_config = Some(config);
        self
    }
}

/// Process-wide session registry
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    engines: Arc<dyn EngineFactory>,
    sink: Option<Arc<dyn PushSink>>,
    settings: SessionSettings,
}

impl SessionRegistry {
    /// Create a registry with an in-memory store and no push sink
    pub fn new(settings: SessionSettings, engines: Arc<dyn EngineFactory>) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            engines,
            sink: None,
            settings,
        }
    }

    /// Use a different storage backend
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    /// Forward engine output of every session to `sink`
    pub fn with_push_sink(mut self, sink: Arc<dyn PushSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn mint_id(&self) -> SessionId {
        loop {
            let id = uuid::Uuid::new_v4().simple().to_string();
            if !self.store.contains(&id) {
                return id;
            }
        }
    }

    /// Build and store a new session, returning its id
    pub async fn create(&self, request: StartRequest) -> Result<SessionId> {
        Ok(self.start(request).await?.session_id)
    }

    /// Build and store a new session, returning a snapshot taken before it
    /// became visible to other callers.
    pub async fn start(&self, request: StartRequest) -> Result<SessionInfo> {
        let model_name = request
            .model_name
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_model.clone());

        let workspace: Option<Arc<dyn SourceControl>> = match request
            .workspace_path
            .filter(|p| !p.as_os_str().is_empty())
        {
            Some(path) => Some(Arc::new(GitRepo::open(&path).await?)),
            None => None,
        };

        let settings = ModelSettings::resolve(&model_name, request.model_config.as_ref());
        let options = SessionOptions {
            strict_edit_format: self.settings.strict_edit_format,
            send_timeout: self.settings.send_timeout(),
        };

        let id = self.mint_id();
        let session = Session::new(
            id.clone(),
            settings,
            workspace,
            self.engines.as_ref(),
            self.sink.clone(),
            &options,
        )?;
        let info = session.info();

        let max = self.settings.max_sessions();
        let evicted = self
            .store
            .insert_bounded(id.clone(), Arc::new(Mutex::new(session)), max);
        for victim in &evicted {
            info!(session_id = %victim, max_sessions = ?max, "Evicted least recently used session");
        }

        info!(session_id = %id, model = %model_name, "Created session");
        Ok(info)
    }

    /// Fetch a session handle. The gate for every per-session operation.
    pub fn lookup(&self, session_id: &str) -> Result<SessionHandle> {
        self.store
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// Remove a session. Removing an unknown id is a no-op.
    pub fn remove(&self, session_id: &str) {
        if self.store.remove(session_id).is_some() {
            info!(session_id = %session_id, "Removed session");
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.store.contains(session_id)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.store.ids()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Remove sessions idle past the configured timeout, as of `now`
    pub fn evict_idle(&self, now: Instant) -> usize {
        let Some(ttl) = self.settings.idle_timeout() else {
            return 0;
        };
        let Some(cutoff) = now.checked_sub(ttl) else {
            return 0;
        };

        let idle = self.store.idle_since(cutoff);
        for id in &idle {
            debug!(session_id = %id, "Evicting idle session");
            self.store.remove(id);
        }
        if !idle.is_empty() {
            info!(count = idle.len(), "Evicted idle sessions");
        }
        idle.len()
    }
}

/// Periodically evict idle sessions. `None` when no idle timeout is configured.
pub fn spawn_reaper(registry: Arc<SessionRegistry>) -> Option<JoinHandle<()>> {
    let ttl = registry.settings().idle_timeout()?;
    let period = (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            registry.evict_idle(Instant::now());
        }
    }))
}
