//! Projection of registry state into a displayable frame, and terminal output.
//!
//! [`project`] is pure: the same sessions, selection, and active fetch always
//! yield the same [`Frame`]. A [`Renderer`] turns frames into output.

use std::io::{self, Stdout, Write};

use crate::types::{Role, Session, SessionId};

/// ANSI escape code for dim text (used for the thinking placeholder).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for the thinking placeholder).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code for bold text (used for titles).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the user label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the assistant label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Return to column zero and erase the line.
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Heading shown when there is nothing to read yet.
pub const WELCOME_TITLE: &str = "Forecasting Assistant";

/// Line shown under [`WELCOME_TITLE`].
pub const WELCOME_SUBTITLE: &str =
    "Your AI-powered forecasting companion. Get financial predictions for different products.";

/// Sidebar text when there are no sessions.
pub const NO_SESSIONS: &str = "No sessions yet.";

/////////////////////////////////////////////// Frame //////////////////////////////////////////////

/// One row of the session list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    /// Session identifier.
    pub id: SessionId,
    /// Session name.
    pub name: String,
    /// True for the session being viewed.
    pub active: bool,
    /// True for the session waiting on the assistant.
    pub awaiting_reply: bool,
}

/// A message ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Who wrote it.
    pub role: Role,
    /// Rendered content.
    pub content: String,
    /// True for the thinking placeholder.
    pub pending: bool,
}

/// What the main pane shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// The welcome banner.
    Welcome,
    /// The current session's messages, in order.
    Transcript(Vec<DisplayMessage>),
}

/// State of the send/stop control.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SendControl {
    /// Sending is allowed.
    Send,
    /// The viewed session is waiting; the control stops the request.
    Stop,
    /// Another session is waiting; sending is not allowed.
    Disabled,
}

/// Where the transcript is scrolled after drawing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Scroll {
    /// The newest message is visible.
    Bottom,
}

/// Everything needed to draw the screen once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The session being viewed.
    pub current: Option<SessionId>,
    /// Session list, newest first.
    pub sidebar: Vec<SidebarEntry>,
    /// Title bar text; hidden when `None`.
    pub title: Option<String>,
    /// Main pane.
    pub view: View,
    /// Send/stop control.
    pub send_control: SendControl,
    /// Scroll position.
    pub scroll: Scroll,
}

impl Frame {
    /// The transcript's messages, or nothing for the welcome view.
    pub fn messages(&self) -> &[DisplayMessage] {
        match &self.view {
            View::Welcome => &[],
            View::Transcript(messages) => messages,
        }
    }

    /// Sidebar rows as numbered lines, or [`NO_SESSIONS`].
    pub fn sidebar_lines(&self) -> Vec<String> {
        if self.sidebar.is_empty() {
            return vec![NO_SESSIONS.to_string()];
        }
        self.sidebar
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let marker = if entry.active { '*' } else { ' ' };
                let waiting = if entry.awaiting_reply { " (thinking)" } else { "" };
                format!("{marker} {:>2}. {}{waiting}  [{}]", i + 1, entry.name, entry.id)
            })
            .collect()
    }
}

///////////////////////////////////////////// Formatter ////////////////////////////////////////////

/// Converts assistant text into display text.
pub trait Formatter: Send {
    /// Format one assistant message.
    fn format(&self, content: &str) -> String;
}

/// Shows assistant text as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFormatter;

impl Formatter for PlainFormatter {
    fn format(&self, content: &str) -> String {
        content.to_string()
    }
}

////////////////////////////////////////////// project /////////////////////////////////////////////

/// Build the frame for `sessions` with `current` selected.
pub fn project(
    sessions: &[Session],
    current: Option<&SessionId>,
    active_fetch: Option<&SessionId>,
    formatter: &dyn Formatter,
) -> Frame {
    let sidebar = sessions
        .iter()
        .map(|session| SidebarEntry {
            id: session.id.clone(),
            name: session.name.clone(),
            active: Some(&session.id) == current,
            awaiting_reply: Some(&session.id) == active_fetch,
        })
        .collect();
    let selected = current.and_then(|id| sessions.iter().find(|s| &s.id == id));

    let view = match selected {
        Some(session) if !session.messages.is_empty() => View::Transcript(
            session
                .messages
                .iter()
                .map(|message| DisplayMessage {
                    role: message.role,
                    content: match message.role {
                        Role::Assistant => formatter.format(&message.content),
                        Role::User => message.content.clone(),
                    },
                    pending: message.pending,
                })
                .collect(),
        ),
        _ => View::Welcome,
    };

    let send_control = match (active_fetch, selected) {
        (None, _) => SendControl::Send,
        (Some(fetch), Some(session)) if fetch == &session.id => SendControl::Stop,
        (Some(_), _) => SendControl::Disabled,
    };

    Frame {
        current: selected.map(|s| s.id.clone()),
        sidebar,
        title: selected.map(|s| s.name.clone()),
        view,
        send_control,
        scroll: Scroll::Bottom,
    }
}

///////////////////////////////////////////// Renderer /////////////////////////////////////////////

/// Trait for drawing frames.
pub trait Renderer: Send {
    /// Draw `frame`.
    fn render(&mut self, frame: &Frame);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, frame: &Frame) {
        (**self).render(frame)
    }

    fn print_info(&mut self, info: &str) {
        (**self).print_info(info)
    }

    fn print_error(&mut self, error: &str) {
        (**self).print_error(error)
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// Switching sessions redraws the whole transcript. Otherwise only new
/// messages are printed, and the thinking placeholder is rewritten in place.
/// Without color no control sequences are written, so the placeholder is
/// printed once and later frames of it are skipped.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    shown: Option<Option<SessionId>>,
    printed: usize,
    live: Option<String>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            shown: None,
            printed: 0,
            live: None,
        }
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn label(&self, role: Role) -> String {
        let (name, color) = match role {
            Role::User => ("You", ANSI_CYAN),
            Role::Assistant => ("SA", ANSI_GREEN),
        };
        if self.use_color {
            format!("{color}{ANSI_BOLD}{name}{ANSI_RESET}")
        } else {
            name.to_string()
        }
    }

    fn print_header(&mut self, frame: &Frame) {
        println!();
        match (&frame.title, &frame.view) {
            (Some(title), View::Transcript(_)) => {
                if self.use_color {
                    println!("{ANSI_BOLD}== {title} =={ANSI_RESET}");
                } else {
                    println!("== {title} ==");
                }
            }
            _ => {
                if self.use_color {
                    println!("{ANSI_BOLD}{WELCOME_TITLE}{ANSI_RESET}");
                    println!("{ANSI_DIM}{WELCOME_SUBTITLE}{ANSI_RESET}");
                } else {
                    println!("{WELCOME_TITLE}");
                    println!("{WELCOME_SUBTITLE}");
                }
            }
        }
    }

    fn print_message(&mut self, message: &DisplayMessage) {
        if self.live.take().is_some() && self.use_color {
            print!("{CLEAR_LINE}");
        }
        println!("{}: {}", self.label(message.role), message.content);
    }

    fn print_live(&mut self, message: &DisplayMessage) {
        if self.live.as_deref() == Some(message.content.as_str()) {
            return;
        }
        let label = self.label(message.role);
        if self.use_color {
            print!(
                "{CLEAR_LINE}{label}: {ANSI_DIM}{ANSI_ITALIC}{}{ANSI_RESET}",
                message.content
            );
        } else if self.live.is_none() {
            println!("{label}: {}", message.content);
        }
        self.live = Some(message.content.clone());
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn render(&mut self, frame: &Frame) {
        if self.shown.as_ref() != Some(&frame.current) {
            if self.live.take().is_some() && self.use_color {
                println!();
            }
            self.print_header(frame);
            self.shown = Some(frame.current.clone());
            self.printed = 0;
        }
        let messages = frame.messages();
        while self.printed < messages.len() {
            let message = &messages[self.printed];
            if message.pending {
                self.print_live(message);
                break;
            }
            self.print_message(message);
            self.printed += 1;
        }
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        if self.live.is_some() && self.use_color {
            println!();
            self.live = None;
        }
        println!("{info}");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        if self.live.is_some() && self.use_color {
            println!();
            self.live = None;
        }
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

/// Renderer that keeps everything it was given.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    frames: Vec<Frame>,
    info: Vec<String>,
    errors: Vec<String>,
}

impl RecordingRenderer {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every frame, oldest first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The most recent frame.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Informational messages, oldest first.
    pub fn info(&self) -> &[String] {
        &self.info
    }

    /// Error messages, oldest first.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, frame: &Frame) {
        self.frames.push(frame.clone());
    }

    fn print_info(&mut self, info: &str) {
        self.info.push(info.to_string());
    }

    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }
}
