//! Session integration tests
//!
//! Tests for session behaviour through the registry:
//! - Conversation history bookkeeping
//! - Output buffering
//! - Workspace operations with and without a git repository
//! - Per-session serialization of concurrent turns

mod common;

use coedit_core::{
    EditFormat, Error, ModelConfig, PushEvent, PushKind, Role, SessionRegistry, SessionSettings,
    StartRequest,
};
use common::{settings, setup_git_repo, EchoFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn registry() -> SessionRegistry {
    SessionRegistry::new(settings(), Arc::new(EchoFactory::new()))
}

mod history_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_appends_user_then_assistant() {
        let registry = registry();
        let id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();
        let handle = registry.lookup(&id).unwrap();
        let mut session = handle.lock().await;

        let response = session.send_message("hello").await.unwrap();
        assert_eq!(response, "echo: hello (1 turns)");

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, response);
    }

    #[tokio::test]
    async fn test_full_history_is_passed_each_turn() {
        let registry = registry();
        let id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();
        let handle = registry.lookup(&id).unwrap();
        let mut session = handle.lock().await;

        session.send_message("one").await.unwrap();
        let second = session.send_message("two").await.unwrap();
        // user, assistant, user visible to the engine on the second turn
        assert_eq!(second, "echo: two (3 turns)");
        assert_eq!(session.history().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_user_entry() {
        let registry = registry();
        let id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();
        let handle = registry.lookup(&id).unwrap();
        let mut session = handle.lock().await;

        let err = session.send_message("fail please").await.unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role, Role::User);

        // A retry sees the failed attempt in context
        let retry = session.send_message("hello").await.unwrap();
        assert_eq!(retry, "echo: hello (2 turns)");
        assert_eq!(session.history().len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_keeps_user_entry() {
        let settings = SessionSettings {
            send_timeout_secs: 1,
            ..Default::default()
        };
        let factory = EchoFactory::with_delay(Duration::from_secs(5));
        let registry = SessionRegistry::new(settings, Arc::new(factory));
        let id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();
        let handle = registry.lookup(&id).unwrap();
        let mut session = handle.lock().await;

        let err = session.send_message("slow down").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(1)));
        assert_eq!(session.history().len(), 1);
    }
}

mod output_tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_is_destructive() {
        let registry = registry();
        let id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();
        let handle = registry.lookup(&id).unwrap();
        let mut session = handle.lock().await;

        session.send_message("hello").await.unwrap();
        assert_eq!(session.drain_output(), "thinking about hello");
        assert_eq!(session.drain_output(), "");
    }

    #[tokio::test]
    async fn test_output_is_pushed_with_session_id() {
        let (tx, mut rx) = mpsc::channel(16);
        let registry = registry().with_push_sink(Arc::new(tx));
        let id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();
        let handle = registry.lookup(&id).unwrap();

        handle.lock().await.send_message("fail now").await.unwrap_err();

        assert_eq!(
            rx.recv().await.unwrap(),
            PushEvent::tool_output(id.clone(), "thinking about fail now")
        );
        let error = rx.recv().await.unwrap();
        assert_eq!(error.kind, PushKind::ToolError);
        assert_eq!(error.session_id, id);
    }
}

mod workspace_tests {
    use super::*;

    #[tokio::test]
    async fn test_no_workspace_defaults() {
        let registry = registry();
        let id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();
        let handle = registry.lookup(&id).unwrap();
        let session = handle.lock().await;

        assert!(session.workspace_path().is_none());
        assert!(session.list_repo_files().await.unwrap().is_empty());
        assert_eq!(session.commit("msg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_add_files_without_workspace_is_empty() {
        let registry = registry();
        let id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();
        let handle = registry.lookup(&id).unwrap();
        let mut session = handle.lock().await;

        let host_files = ["/etc/passwd".to_string(), "/etc/hostname".to_string()];
        assert!(session.add_files(&host_files).await.is_empty());
        assert!(session.add_files(&["Cargo.toml".to_string()]).await.is_empty());
        assert!(session.info().chat_files.is_empty());
    }

    #[tokio::test]
    async fn test_add_missing_file_returns_empty() {
        let repo = setup_git_repo();
        let registry = registry();
        let id = registry
            .create(StartRequest::new("gpt-4o").with_workspace(repo.path()))
            .await
            .unwrap();
        let handle = registry.lookup(&id).unwrap();
        let mut session = handle.lock().await;

        assert!(session.add_files(&["missing.py".to_string()]).await.is_empty());
    }

    #[tokio::test]
    async fn test_add_files_filters_and_dedupes() {
        let repo = setup_git_repo();
        let registry = registry();
        let id = registry
            .create(StartRequest::new("gpt-4o").with_workspace(repo.path()))
            .await
            .unwrap();
        let handle = registry.lookup(&id).unwrap();
        let mut session = handle.lock().await;

        let added = session
            .add_files(&[
                "app.py".to_string(),
                "missing.py".to_string(),
                "../outside.py".to_string(),
            ])
            .await;
        assert_eq!(added, vec!["app.py"]);

        // Already in the chat
        assert!(session.add_files(&["app.py".to_string()]).await.is_empty());
        assert_eq!(session.info().chat_files, vec!["app.py"]);
    }

    #[tokio::test]
    async fn test_repo_files_and_commit() {
        let repo = setup_git_repo();
        let registry = registry();
        let id = registry
            .create(StartRequest::new("gpt-4o").with_workspace(repo.path()))
            .await
            .unwrap();
        let handle = registry.lookup(&id).unwrap();
        let session = handle.lock().await;

        let mut files = session.list_repo_files().await.unwrap();
        files.sort();
        assert_eq!(files, vec!["README.md", "app.py"]);

        // Clean tree
        assert_eq!(session.commit("nothing to do").await.unwrap(), None);

        std::fs::write(repo.path().join("app.py"), "print('bye')\n").unwrap();
        let hash = session.commit("Update greeting").await.unwrap();
        assert!(hash.is_some());
    }
}

mod strategy_tests {
    use super::*;

    #[tokio::test]
    async fn test_strategy_follows_model_config() {
        let registry = registry();
        let config = ModelConfig {
            edit_format: Some("diff".to_string()),
            ..Default::default()
        };
        let id = registry
            .create(StartRequest::new("gpt-4o").with_model_config(config))
            .await
            .unwrap();
        let handle = registry.lookup(&id).unwrap();
        assert_eq!(handle.lock().await.edit_format(), EditFormat::LineRangeDiff);
    }

    #[tokio::test]
    async fn test_config_object_defaults_to_whole() {
        let registry = registry();
        let id = registry
            .create(StartRequest::new("gpt-4o").with_model_config(ModelConfig::default()))
            .await
            .unwrap();
        let handle = registry.lookup(&id).unwrap();
        assert_eq!(handle.lock().await.edit_format(), EditFormat::WholeFileReplace);
    }

    #[tokio::test]
    async fn test_unknown_format_falls_back() {
        let registry = registry();
        let config = ModelConfig {
            edit_format: Some("architect".to_string()),
            ..Default::default()
        };
        let id = registry
            .create(StartRequest::new("gpt-4o").with_model_config(config))
            .await
            .unwrap();
        let handle = registry.lookup(&id).unwrap();
        assert_eq!(handle.lock().await.edit_format(), EditFormat::SearchReplaceBlock);
    }

    #[tokio::test]
    async fn test_format_names_match_exactly() {
        let registry = registry();
        for near in ["udiff", "DIFF", "Whole"] {
            let config = ModelConfig {
                edit_format: Some(near.to_string()),
                ..Default::default()
            };
            let id = registry
                .create(StartRequest::new("gpt-4o").with_model_config(config))
                .await
                .unwrap();
            let handle = registry.lookup(&id).unwrap();
            assert_eq!(
                handle.lock().await.edit_format(),
                EditFormat::SearchReplaceBlock,
                "{}",
                near
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_format_rejected_when_strict() {
        let settings = SessionSettings {
            strict_edit_format: true,
            ..settings()
        };
        let registry = SessionRegistry::new(settings, Arc::new(EchoFactory::new()));
        let config = ModelConfig {
            edit_format: Some("architect".to_string()),
            ..Default::default()
        };

        let err = registry
            .create(StartRequest::new("gpt-4o").with_model_config(config))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(registry.is_empty());
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_are_serialized() {
        let registry = Arc::new(registry());
        let id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();

        let spawn_send = |text: &'static str| {
            let registry = registry.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let handle = registry.lookup(&id).unwrap();
                let mut session = handle.lock().await;
                session.send_message(text).await.unwrap()
            })
        };

        let a = spawn_send("slow A");
        let b = spawn_send("slow B");
        a.await.unwrap();
        b.await.unwrap();

        let handle = registry.lookup(&id).unwrap();
        let session = handle.lock().await;
        let contents: Vec<&str> = session.history().iter().map(|t| t.content.as_str()).collect();

        let a_first = vec!["slow A", "echo: slow A (1 turns)", "slow B", "echo: slow B (3 turns)"];
        let b_first = vec!["slow B", "echo: slow B (1 turns)", "slow A", "echo: slow A (3 turns)"];
        assert!(
            contents == a_first || contents == b_first,
            "interleaved history: {:?}",
            contents
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_slow_session_does_not_block_others() {
        let factory = EchoFactory::with_delay(Duration::from_secs(2));
        let registry = Arc::new(SessionRegistry::new(settings(), Arc::new(factory)));
        let slow_id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();
        let fast_id = registry.create(StartRequest::new("gpt-4o")).await.unwrap();

        let slow = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let handle = registry.lookup(&slow_id).unwrap();
                let mut session = handle.lock().await;
                session.send_message("slow turn").await.unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let fast = tokio::time::timeout(Duration::from_millis(500), async {
            let handle = registry.lookup(&fast_id).unwrap();
            let mut session = handle.lock().await;
            session.send_message("quick").await.unwrap()
        })
        .await
        .expect("other session was blocked");
        assert_eq!(fast, "echo: quick (1 turns)");

        // Registry operations stay available too
        assert_eq!(registry.len(), 2);
        slow.await.unwrap();
    }
}
