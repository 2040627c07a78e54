//! coedit core - session orchestration for a conversational code editor
//!
//! This crate provides:
//! - The session registry (creation, lookup, removal, eviction)
//! - Sessions binding a model, an edit strategy and an optional git workspace
//! - Output redirection from the engine to a push channel
//! - Edit strategy selection
//! - The chat engine and source-control boundaries
//!
//! # Architecture
//!
//! ```text
//! request ──▶ SessionRegistry::lookup(id) ──▶ SessionHandle (Mutex<Session>)
//!                                                   │
//!                                       ChatEngine::run_chat_completion(history)
//!                                                   │
//!                                          OutputRedirector::write
//!                                             │            │
//!                                          buffer       PushSink ──▶ push channel
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod model;
pub mod redirect;
pub mod registry;
pub mod session;
pub mod store;
pub mod strategy;
pub mod workspace;

pub use config::{Config, ConfigManager, EngineConfig, ServerConfig, SessionSettings};
pub use engine::{ChatEngine, ChatFiles, EngineContext, EngineFactory, GenaiEngine, GenaiEngineFactory};
pub use error::{Error, Result};
pub use history::{ConversationHistory, Role, Turn};
pub use model::{Model, ModelConfig, ModelSettings, Reminder};
pub use redirect::{OutputRedirector, PushEvent, PushKind, PushSink};
pub use registry::{spawn_reaper, SessionRegistry, StartRequest};
pub use session::{Session, SessionHandle, SessionId, SessionInfo, SessionOptions};
pub use store::{MemoryStore, SessionStore};
pub use strategy::{select_strategy, strategy_for, EditFormat, EditStrategy};
pub use workspace::{GitRepo, SourceControl};
