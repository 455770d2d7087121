//! Slash command parsing for the chat REPL.
//!
//! Input starting with `/` controls sessions and the pending request;
//! anything else is sent to the assistant.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start a new session.
    New,

    /// List sessions, newest first.
    Sessions,

    /// Switch to a session by its 1-based position in the list.
    ///
    /// Numbers past the end of the list are tried as session ids, since ids
    /// are themselves numeric.
    SwitchIndex(usize),

    /// Switch to a session by its identifier.
    SwitchId(String),

    /// Stop the pending request.
    Stop,

    /// List the example prompts.
    Examples,

    /// Send the example prompt at this 1-based position.
    Example(usize),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a message.
///
/// # Examples
///
/// ```
/// # use forecast_chat::commands::{parse_command, ChatCommand};
/// assert_eq!(parse_command("/stop"), Some(ChatCommand::Stop));
/// assert_eq!(parse_command("/switch 2"), Some(ChatCommand::SwitchIndex(2)));
/// assert!(parse_command("Forecast Q3 sales").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" => ChatCommand::New,
        "sessions" | "ls" => ChatCommand::Sessions,
        "switch" | "s" => match argument {
            Some(arg) => match arg.parse::<usize>() {
                Ok(0) => ChatCommand::Invalid("/switch positions start at 1".to_string()),
                Ok(index) => ChatCommand::SwitchIndex(index),
                Err(_) => ChatCommand::SwitchId(arg.to_string()),
            },
            None => ChatCommand::Invalid("/switch requires a position or session id".to_string()),
        },
        "stop" => ChatCommand::Stop,
        "examples" => ChatCommand::Examples,
        "example" => match argument.map(str::parse::<usize>) {
            Some(Ok(index)) if index > 0 => ChatCommand::Example(index),
            Some(_) => ChatCommand::Invalid("/example expects a positive integer".to_string()),
            None => ChatCommand::Invalid("/example requires a number".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new chat
  /sessions              List chats, newest first
  /switch <n|id>         Switch to chat n from /sessions, or by id
  /stop                  Stop the reply being generated
  /examples              List example prompts
  /example <n>           Send example prompt n
  /help                  Show this help message
  /quit                  Exit the chat
Anything else is sent to the assistant."#
}
