//! Chat engine boundary
//!
//! The engine turns natural-language requests into edits. The core treats it
//! as a collaborator: a session owns one [`ChatEngine`] built by an
//! [`EngineFactory`], hands it the full history on every turn and lets it
//! report progress through the session's [`OutputRedirector`].
//!
//! [`GenaiEngine`] is the bundled implementation. It asks the model for edits
//! in the session's edit format and streams the reply through the
//! redirector; applying those edits to disk is left to downstream tooling.

use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent};
use genai::resolver::{AuthData, AuthResolver};
use genai::Client;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::history::{Role, Turn};
use crate::model::{Model, Reminder};
use crate::redirect::OutputRedirector;
use crate::session::SessionId;
use crate::strategy::EditStrategy;
use crate::workspace::{resolve_file, SourceControl};

/// Everything an engine is bound to for the life of a session
#[derive(Clone)]
pub struct EngineContext {
    pub session_id: SessionId,
    pub model: Model,
    pub strategy: Arc<dyn EditStrategy>,
    pub workspace: Option<Arc<dyn SourceControl>>,
    pub io: Arc<OutputRedirector>,
}

/// Conversational code-editing engine
#[async_trait]
pub trait ChatEngine: Send + Sync {
    /// Add files to the chat. Returns the display names actually added;
    /// missing, out-of-workspace and already-added paths are left out, and
    /// nothing is added when no workspace is bound.
    async fn add_files(&mut self, paths: &[String]) -> Vec<String>;

    /// Files currently in the chat
    fn chat_files(&self) -> Vec<String>;

    /// Run one completion with `history` as context and return the reply
    async fn run_chat_completion(&mut self, history: &[Turn]) -> Result<String>;
}

/// Builds one engine per session
pub trait EngineFactory: Send + Sync {
    fn build(&self, ctx: EngineContext) -> Result<Box<dyn ChatEngine>>;
}

/// The set of files added to a chat, keyed by display name
#[derive(Debug, Clone, Default)]
pub struct ChatFiles {
    root: Option<PathBuf>,
    files: BTreeMap<String, PathBuf>,
}

impl ChatFiles {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            files: BTreeMap::new(),
        }
    }

    /// Add each resolvable, not-yet-present path; return what was added
    pub fn add(&mut self, paths: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for requested in paths {
            let Some((abs, display)) = resolve_file(self.root.as_deref(), requested) else {
                debug!(path = %requested, "Skipping unresolvable chat file");
                continue;
            };
            if self.files.contains_key(&display) {
                continue;
            }
            self.files.insert(display.clone(), abs);
            added.push(display);
        }
        added
    }

    pub fn names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PathBuf)> {
        self.files.iter()
    }
}

const BASE_PROMPT: &str = "You are an expert software developer. \
Make the changes the user asks for to the files in the chat, \
and explain briefly what you changed.";

/// Engine backed by the genai client
pub struct GenaiEngine {
    client: Client,
    ctx: EngineContext,
    config: EngineConfig,
    files: ChatFiles,
}

impl GenaiEngine {
    pub fn new(ctx: EngineContext, config: EngineConfig) -> Self {
        let client = match config.get_api_key() {
            Some(api_key) => {
                let auth_resolver = AuthResolver::from_resolver_fn(
                    move |_model_iden| -> std::result::Result<Option<AuthData>, genai::resolver::Error> {
                        Ok(Some(AuthData::from_single(api_key.clone())))
                    },
                );
                Client::builder().with_auth_resolver(auth_resolver).build()
            }
            None => Client::default(),
        };

        let root = ctx.workspace.as_ref().map(|w| w.root().to_path_buf());
        Self {
            client,
            ctx,
            config,
            files: ChatFiles::new(root),
        }
    }

    async fn files_section(&self) -> String {
        let mut section = String::new();
        for (name, path) in self.files.iter() {
            match tokio::fs::metadata(path).await {
                Ok(meta) if meta.len() > self.config.max_file_bytes => {
                    self.ctx
                        .io
                        .tool_warning(format!("Skipping {}: file too large", name));
                    continue;
                }
                Err(e) => {
                    self.ctx.io.tool_warning(format!("Skipping {}: {}", name, e));
                    continue;
                }
                Ok(_) => {}
            }
            match tokio::fs::read_to_string(path).await {
                Ok(content) => section.push_str(&self.ctx.strategy.render_file(name, &content)),
                Err(e) => self.ctx.io.tool_warning(format!("Skipping {}: {}", name, e)),
            }
        }
        section
    }

    async fn repo_map(&self) -> Option<String> {
        if !self.ctx.model.settings().use_repo_map {
            return None;
        }
        let workspace = self.ctx.workspace.as_ref()?;
        match workspace.tracked_files().await {
            Ok(files) if !files.is_empty() => Some(files.join("\n")),
            Ok(_) => None,
            Err(e) => {
                warn!(session_id = %self.ctx.session_id, error = %e, "Repository listing failed");
                None
            }
        }
    }

    async fn build_request(&self, history: &[Turn]) -> ChatRequest {
        let settings = self.ctx.model.settings();
        let strategy = &self.ctx.strategy;

        let mut system = format!("{}\n\n{}", BASE_PROMPT, strategy.instructions());
        if settings.lazy {
            system.push_str("\n\nYou are diligent and tireless. Always complete the full change.");
        }
        let (example_request, example_reply) = strategy.example();
        if settings.examples_as_sys_msg {
            system.push_str("\n\nExample conversation:\n\nUSER: ");
            system.push_str(example_request);
            system.push_str("\n\nASSISTANT: ");
            system.push_str(example_reply);
        }
        if settings.reminder == Reminder::Sys {
            system.push_str("\n\n");
            system.push_str(strategy.reminder());
        }
        if let Some(map) = self.repo_map().await {
            system.push_str("\n\nFiles tracked in the repository:\n");
            system.push_str(&map);
        }
        let files = self.files_section().await;
        if !files.is_empty() {
            system.push_str("\n\nFiles added to the chat:\n\n");
            system.push_str(&files);
        }

        let mut chat_req = ChatRequest::default();
        if settings.use_system_prompt {
            chat_req = chat_req.with_system(system.as_str());
        } else {
            chat_req = chat_req
                .append_message(ChatMessage::user(system.as_str()))
                .append_message(ChatMessage::assistant("Ok."));
        }
        if !settings.examples_as_sys_msg {
            chat_req = chat_req
                .append_message(ChatMessage::user(example_request))
                .append_message(ChatMessage::assistant(example_reply));
        }

        let last_user = history.iter().rposition(|t| t.role == Role::User);
        for (i, turn) in history.iter().enumerate() {
            chat_req = match turn.role {
                Role::User if Some(i) == last_user && settings.reminder == Reminder::User => {
                    let content = format!("{}\n\n{}", turn.content, strategy.reminder());
                    chat_req.append_message(ChatMessage::user(content))
                }
                Role::User => chat_req.append_message(ChatMessage::user(turn.content.as_str())),
                Role::Assistant => {
                    chat_req.append_message(ChatMessage::assistant(turn.content.as_str()))
                }
            };
        }
        chat_req
    }
}

#[async_trait]
impl ChatEngine for GenaiEngine {
    async fn add_files(&mut self, paths: &[String]) -> Vec<String> {
        let added = self.files.add(paths);
        for name in &added {
            self.ctx.io.write(format!("Added {} to the chat", name));
        }
        added
    }

    fn chat_files(&self) -> Vec<String> {
        self.files.names()
    }

    async fn run_chat_completion(&mut self, history: &[Turn]) -> Result<String> {
        let settings = self.ctx.model.settings();
        let chat_req = self.build_request(history).await;

        let mut options = ChatOptions::default().with_max_tokens(self.config.max_tokens);
        if settings.use_temperature {
            options = options.with_temperature(self.config.temperature);
        }

        let stream_response = self
            .client
            .exec_chat_stream(self.ctx.model.name(), chat_req, Some(&options))
            .await
            .map_err(|e| {
                error!(error = ?e, model = %self.ctx.model.name(), "LLM request failed");
                Error::Engine(format!("GenAI error: {}", e))
            })?;

        let mut content = String::new();
        let mut stream = stream_response.stream;
        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => {
                    if settings.streaming && !chunk.content.is_empty() {
                        self.ctx.io.write(chunk.content.as_str());
                    }
                    content.push_str(&chunk.content);
                }
                Ok(ChatStreamEvent::End(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    error!(error = ?e, model = %self.ctx.model.name(), "LLM stream error");
                    self.ctx.io.tool_error(format!("Model stream failed: {}", e));
                    return Err(Error::Engine(format!("GenAI stream error: {}", e)));
                }
            }
        }

        if !settings.streaming && !content.is_empty() {
            self.ctx.io.write(content.as_str());
        }
        Ok(content)
    }
}

/// Factory for [`GenaiEngine`]
#[derive(Debug, Clone, Default)]
pub struct GenaiEngineFactory {
    config: EngineConfig,
}

impl GenaiEngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl EngineFactory for GenaiEngineFactory {
    fn build(&self, ctx: EngineContext) -> Result<Box<dyn ChatEngine>> {
        Ok(Box::new(GenaiEngine::new(ctx, self.config.clone())))
    }
}
