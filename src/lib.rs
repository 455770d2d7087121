// Public modules
pub mod animator;
pub mod app;
pub mod client;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod observability;
pub mod registry;
pub mod render;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports
pub use animator::{RequestId, ThinkingAnimator, Tick, thinking_text};
pub use app::{Action, AppEvent, ChatApp, EXAMPLE_PROMPTS, Flow};
pub use client::{AssistantClient, AssistantTransport};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use controller::{ERROR_MESSAGE, Outcome, RequestController, STOPPED_MESSAGE, Settlement};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use registry::{INTERRUPTED_MESSAGE, Placeholder, SessionRegistry};
pub use render::{
    Formatter, Frame, PlainFormatter, PlainTextRenderer, RecordingRenderer, Renderer, SendControl,
    View, project,
};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use types::*;
