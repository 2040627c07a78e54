//! Shared test helpers: a scripted engine and git fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use coedit_core::{
    ChatEngine, ChatFiles, EngineContext, EngineFactory, Error, Result, Role, SessionSettings,
    Turn,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Engine that echoes the latest user message.
///
/// - messages starting with `fail` produce an engine error
/// - messages starting with `slow` sleep before answering
pub struct EchoEngine {
    ctx: EngineContext,
    files: ChatFiles,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChatEngine for EchoEngine {
    async fn add_files(&mut self, paths: &[String]) -> Vec<String> {
        self.files.add(paths)
    }

    fn chat_files(&self) -> Vec<String> {
        self.files.names()
    }

    async fn run_chat_completion(&mut self, history: &[Turn]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last = history
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.clone())
            .unwrap_or_default();

        self.ctx.io.write(format!("thinking about {}", last));

        if last.starts_with("slow") {
            tokio::time::sleep(self.delay).await;
        }
        if last.starts_with("fail") {
            self.ctx.io.tool_error("model unavailable");
            return Err(Error::Engine("model unavailable".to_string()));
        }
        Ok(format!("echo: {} ({} turns)", last, history.len()))
    }
}

#[derive(Clone)]
pub struct EchoFactory {
    pub delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl EchoFactory {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(50))
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EngineFactory for EchoFactory {
    fn build(&self, ctx: EngineContext) -> Result<Box<dyn ChatEngine>> {
        let root = ctx.workspace.as_ref().map(|w| w.root().to_path_buf());
        Ok(Box::new(EchoEngine {
            ctx,
            files: ChatFiles::new(root),
            delay: self.delay,
            calls: self.calls.clone(),
        }))
    }
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        send_timeout_secs: 0,
        ..Default::default()
    }
}

fn git(dir: &Path, args: &[&str]) {
    std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
}

pub fn setup_git_repo() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    git(dir.path(), &["init"]);
    git(dir.path(), &["config", "user.email", "test@test.com"]);
    git(dir.path(), &["config", "user.name", "Test User"]);
    std::fs::write(dir.path().join("README.md"), "# Test\n").unwrap();
    std::fs::write(dir.path().join("app.py"), "print('hi')\n").unwrap();
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-m", "Initial commit"]);
    dir
}
