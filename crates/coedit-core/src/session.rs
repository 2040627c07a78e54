//! A single chat session
//!
//! A session binds one model, one edit strategy and an optional workspace to
//! an engine instance, and keeps the conversation that engine is fed. The
//! binding is fixed at construction.
//!
//! Sessions are shared as [`SessionHandle`]s. The handle's async mutex is the
//! per-session exclusion: whoever holds the guard is the only operation in
//! flight for that session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::engine::{ChatEngine, EngineContext, EngineFactory};
use crate::error::{Error, Result};
use crate::history::{ConversationHistory, Turn};
use crate::model::{Model, ModelSettings};
use crate::redirect::{OutputRedirector, PushSink};
use crate::strategy::{select_strategy, EditFormat, EditStrategy};
use crate::workspace::SourceControl;

/// Unique identifier for a session
pub type SessionId = String;

/// Shared, exclusively-lockable session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Construction options that come from server configuration
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Fail on unknown edit formats instead of falling back
    pub strict_edit_format: bool,
    /// Upper bound on one chat turn
    pub send_timeout: Option<Duration>,
}

/// Snapshot of a session for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub model: String,
    pub edit_format: EditFormat,
    pub workspace: Option<String>,
    pub turns: usize,
    pub chat_files: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub struct Session {
    id: SessionId,
    model: Model,
    strategy: Arc<dyn EditStrategy>,
    workspace: Option<Arc<dyn SourceControl>>,
    history: ConversationHistory,
    io: Arc<OutputRedirector>,
    engine: Box<dyn ChatEngine>,
    send_timeout: Option<Duration>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Build a session. The edit strategy is selected here, once.
    pub fn new(
        id: SessionId,
        settings: ModelSettings,
        workspace: Option<Arc<dyn SourceControl>>,
        engines: &dyn EngineFactory,
        sink: Option<Arc<dyn PushSink>>,
        options: &SessionOptions,
    ) -> Result<Self> {
        let strategy: Arc<dyn EditStrategy> =
            Arc::from(select_strategy(&settings.edit_format, options.strict_edit_format)?);
        let model = Model::new(settings);
        let io = Arc::new(OutputRedirector::new(id.clone(), sink));

        let engine = engines.build(EngineContext {
            session_id: id.clone(),
            model: model.clone(),
            strategy: strategy.clone(),
            workspace: workspace.clone(),
            io: io.clone(),
        })?;

        debug!(
            session_id = %id,
            model = %model.name(),
            edit_format = %strategy.format(),
            "Session built"
        );

        Ok(Self {
            id,
            model,
            strategy,
            workspace,
            history: ConversationHistory::new(),
            io,
            engine,
            send_timeout: options.send_timeout,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn edit_format(&self) -> EditFormat {
        self.strategy.format()
    }

    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace.as_ref().map(|w| w.root())
    }

    pub fn history(&self) -> &[Turn] {
        self.history.turns()
    }

    /// Add files to the chat. The returned list, not the input, is authoritative.
    pub async fn add_files(&mut self, paths: &[String]) -> Vec<String> {
        let added = self.engine.add_files(paths).await;
        debug!(
            session_id = %self.id,
            requested = paths.len(),
            added = added.len(),
            "Added chat files"
        );
        added
    }

    /// Tracked files of the bound workspace; empty without one
    pub async fn list_repo_files(&self) -> Result<Vec<String>> {
        match &self.workspace {
            Some(workspace) => workspace.tracked_files().await,
            None => Ok(Vec::new()),
        }
    }

    /// Run one chat turn.
    ///
    /// The user turn is appended before the engine runs and stays in the
    /// history if the engine fails or times out.
    pub async fn send_message(&mut self, text: &str) -> Result<String> {
        self.history.push_user(text);
        info!(session_id = %self.id, turns = self.history.len(), "Sending message");

        let completion = self.engine.run_chat_completion(self.history.turns());
        let result = match self.send_timeout {
            Some(limit) => match tokio::time::timeout(limit, completion).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(session_id = %self.id, timeout_secs = limit.as_secs(), "Chat turn timed out");
                    Err(Error::Timeout(limit.as_secs()))
                }
            },
            None => completion.await,
        };

        match result {
            Ok(response) => {
                self.history.push_assistant(response.as_str());
                Ok(response)
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Chat turn failed");
                Err(match e {
                    Error::Engine(_) | Error::Timeout(_) => e,
                    other => Error::Engine(other.to_string()),
                })
            }
        }
    }

    /// Commit pending workspace changes. `None` without a workspace or without changes.
    pub async fn commit(&self, message: &str) -> Result<Option<String>> {
        match &self.workspace {
            Some(workspace) => workspace.commit(message).await,
            None => Ok(None),
        }
    }

    /// Buffered engine output since the last drain
    pub fn drain_output(&self) -> String {
        self.io.drain_buffer()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            model: self.model.name().to_string(),
            edit_format: self.edit_format(),
            workspace: self
                .workspace_path()
                .map(|p| p.to_string_lossy().to_string()),
            turns: self.history.len(),
            chat_files: self.engine.chat_files(),
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("model", &self.model.name())
            .field("edit_format", &self.strategy.format())
            .field("workspace", &self.workspace_path())
            .field("turns", &self.history.len())
            .finish()
    }
}
