//! Configuration for the chat client.
//!
//! Command-line arguments are parsed via `arrrg` and resolved into a
//! [`ChatConfig`], falling back to environment variables and defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::animator::DEFAULT_TICK_PERIOD;
use crate::client::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, ENDPOINT_ENV};
use crate::store::RECORD_NAME;

/// Environment variable naming the session record.
pub const STORE_ENV: &str = "FORECAST_CHAT_STORE";

/// Directory under `$HOME` that holds the session record.
const STORE_DIR: &str = ".forecast-chat";

/// Command-line arguments for the forecast-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the forecasting assistant.
    #[arrrg(optional, "Assistant base URL (default: http://localhost:8001/)", "URL")]
    pub endpoint: Option<String>,

    /// Path of the session record.
    #[arrrg(optional, "Session file (default: ~/.forecast-chat/sessions.json)", "PATH")]
    pub store: Option<String>,

    /// Seconds a request may go unanswered.
    #[arrrg(optional, "Request timeout in seconds (default: 120)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Milliseconds between thinking-animation frames.
    #[arrrg(optional, "Thinking animation period in milliseconds (default: 500)", "MILLIS")]
    pub tick_millis: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Keep sessions in memory only.
    #[arrrg(flag, "Do not read or write the session file")]
    pub ephemeral: bool,

    /// Send one message, print the reply, and exit.
    #[arrrg(optional, "Send one message and exit", "TEXT")]
    pub prompt: Option<String>,
}

/// Resolved configuration for a chat run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL of the assistant.
    pub endpoint: String,

    /// Where sessions are persisted.
    pub store_path: PathBuf,

    /// Client-side request timeout.
    pub timeout: Duration,

    /// Period of the thinking animation.
    pub tick_period: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether sessions stay in memory only.
    pub ephemeral: bool,

    /// One message to send non-interactively.
    pub prompt: Option<String>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Endpoint: `http://localhost:8001/`
    /// - Store: `~/.forecast-chat/sessions.json`
    /// - Timeout: 120 seconds
    /// - Animation period: 500 milliseconds
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            store_path: default_store_path(),
            timeout: DEFAULT_TIMEOUT,
            tick_period: DEFAULT_TICK_PERIOD,
            use_color: true,
            ephemeral: false,
            prompt: None,
        }
    }

    /// Sets the assistant endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the session record path.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the animation period.
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Keeps sessions in memory only.
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    /// Sets a one-shot prompt.
    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.prompt = prompt;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let endpoint = args
            .endpoint
            .or_else(|| env::var(ENDPOINT_ENV).ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let store_path = args
            .store
            .or_else(|| env::var(STORE_ENV).ok())
            .map(PathBuf::from)
            .unwrap_or_else(default_store_path);

        ChatConfig {
            endpoint,
            store_path,
            timeout: args
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            tick_period: args
                .tick_millis
                .filter(|millis| *millis > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TICK_PERIOD),
            use_color: !args.no_color,
            ephemeral: args.ephemeral,
            prompt: args.prompt,
        }
    }
}

/// `$HOME/.forecast-chat/sessions.json`, or `sessions.json` in the working
/// directory when `HOME` is unset.
pub fn default_store_path() -> PathBuf {
    match env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(STORE_DIR).join(RECORD_NAME),
        _ => PathBuf::from(RECORD_NAME),
    }
}
