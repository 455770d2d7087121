//! Terminal chat client for the forecasting assistant.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the assistant on localhost:8001, keeping chats in ~/.forecast-chat
//! forecast-chat
//!
//! # Another assistant, and a throwaway session list
//! forecast-chat --endpoint http://forecast.internal:8001/ --ephemeral
//!
//! # One question, answer on stdout
//! forecast-chat --prompt "Forecast Q3 sales"
//! ```
//!
//! Ctrl+C stops the reply being generated; Ctrl+D or `/quit` exits. Set
//! `RUST_LOG` to see diagnostics on stderr.

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing_subscriber::EnvFilter;

use forecast_chat::{
    Action, AssistantClient, AssistantTransport, ChatApp, ChatArgs, ChatConfig, FileStore,
    MemoryStore, Outcome, PlainTextRenderer, RecordingRenderer, SessionStore,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn open_store(config: &ChatConfig) -> Box<dyn SessionStore> {
    if config.ephemeral {
        Box::new(MemoryStore::new())
    } else {
        tracing::debug!(path = %config.store_path.display(), "using session file");
        Box::new(FileStore::new(&config.store_path))
    }
}

/// Read lines on a dedicated thread and forward them as actions.
fn spawn_input(actions: UnboundedSender<Action>) {
    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(err) => {
                eprintln!("Error: cannot read input: {err}");
                let _ = actions.send(Action::Quit);
                return;
            }
        };
        loop {
            let action = match rl.readline("> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);
                    Action::from_input(line)
                }
                Err(ReadlineError::Interrupted) => Action::Stop,
                Err(ReadlineError::Eof) => Action::Quit,
                Err(err) => {
                    eprintln!("Error: {err:?}");
                    Action::Quit
                }
            };
            let quit = action == Action::Quit;
            if actions.send(action).is_err() || quit {
                break;
            }
        }
    });
}

async fn run_once(
    config: &ChatConfig,
    transport: Arc<dyn AssistantTransport>,
    prompt: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = ChatApp::with_tick_period(
        open_store(config),
        transport,
        RecordingRenderer::new(),
        config.tick_period,
    );
    app.dispatch(Action::Send(prompt.to_string()));
    for error in app.renderer().errors() {
        eprintln!("Error: {error}");
    }
    let Some(settlement) = app.wait_for_settlement().await else {
        return Err("message was not sent".into());
    };
    let reply = app
        .registry()
        .get(&settlement.session)
        .and_then(|session| session.messages.last())
        .map(|message| message.content.clone())
        .unwrap_or_default();
    println!("{reply}");
    match settlement.outcome {
        Outcome::Answered => Ok(()),
        Outcome::Stopped | Outcome::Errored => Err("the assistant did not answer".into()),
    }
}

/// Main entry point for the forecast-chat application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("forecast-chat [OPTIONS]");
    let config = ChatConfig::from(args);
    init_tracing();

    let client = AssistantClient::with_options(Some(config.endpoint.clone()), Some(config.timeout))?;
    let transport: Arc<dyn AssistantTransport> = Arc::new(client);

    if let Some(prompt) = config.prompt.clone() {
        return run_once(&config, transport, &prompt).await;
    }

    let mut app = ChatApp::with_tick_period(
        open_store(&config),
        transport,
        PlainTextRenderer::with_color(config.use_color),
        config.tick_period,
    );
    println!("Forecast Chat (assistant: {})", config.endpoint);
    println!("Type /help for commands, /quit to exit");

    let (tx, rx) = unbounded_channel();
    spawn_input(tx);
    app.run(rx).await;
    println!("Goodbye!");
    Ok(())
}
