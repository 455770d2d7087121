//! The chat application: user actions and background events in one loop.
//!
//! All state lives in [`ChatApp`] and is only touched from its loop. The
//! remote call and the animator timer run as tasks that report back through
//! [`AppEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use crate::animator::{DEFAULT_TICK_PERIOD, RequestId, ThinkingAnimator, Tick};
use crate::client::AssistantTransport;
use crate::commands::{ChatCommand, help_text, parse_command};
use crate::controller::{RequestController, Settlement};
use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::render::{Formatter, Frame, PlainFormatter, Renderer, project};
use crate::store::SessionStore;
use crate::types::{ChatResponse, SessionId};

/// Prompts offered by `/examples`.
pub const EXAMPLE_PROMPTS: [&str; 3] = [
    "Forecast weekly sales for store 1 over the next quarter",
    "Which department is expected to grow fastest next month?",
    "How will the holiday season affect sales for store 20?",
];

/// Something a background task reports to the app loop.
#[derive(Debug)]
pub enum AppEvent {
    /// An animation frame for a pending request.
    Tick(Tick),
    /// A request finished, one way or another.
    Settled {
        /// The request that finished.
        request: RequestId,
        /// Its result. A user stop arrives as [`crate::Error::Cancelled`].
        result: Result<ChatResponse>,
    },
}

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start a new session.
    NewSession,
    /// View the session with this id.
    SelectSession(SessionId),
    /// View the session at this 1-based position in the list.
    SelectIndex(usize),
    /// Send this text.
    Send(String),
    /// Stop the pending request.
    Stop,
    /// Text submitted with Enter; same as [`Action::Send`].
    SubmitOnEnter(String),
    /// Send the example prompt at this 0-based index.
    PickExample(usize),
    /// Show the session list.
    ListSessions,
    /// Show the example prompts.
    ListExamples,
    /// Show help.
    Help,
    /// Leave the app.
    Quit,
    /// A malformed command; the text says what was wrong.
    Unrecognized(String),
}

impl Action {
    /// Turn one line of REPL input into an action.
    pub fn from_input(line: &str) -> Self {
        let Some(command) = parse_command(line) else {
            return Action::SubmitOnEnter(line.to_string());
        };
        match command {
            ChatCommand::New => Action::NewSession,
            ChatCommand::Sessions => Action::ListSessions,
            ChatCommand::SwitchIndex(index) => Action::SelectIndex(index),
            ChatCommand::SwitchId(id) => Action::SelectSession(SessionId::new(id)),
            ChatCommand::Stop => Action::Stop,
            ChatCommand::Examples => Action::ListExamples,
            ChatCommand::Example(number) => Action::PickExample(number - 1),
            ChatCommand::Help => Action::Help,
            ChatCommand::Quit => Action::Quit,
            ChatCommand::Invalid(message) => Action::Unrecognized(message),
        }
    }
}

/// Whether the loop keeps going after an action.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading actions.
    Continue,
    /// Leave the loop.
    Quit,
}

/// The app: registry, request controller, and renderer.
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use forecast_chat::*;
/// # use tokio_util::sync::CancellationToken;
/// struct Canned;
///
/// #[async_trait::async_trait]
/// impl AssistantTransport for Canned {
///     async fn chat(&self, _: &ChatRequest, _: &CancellationToken) -> Result<ChatResponse> {
///         Ok(ChatResponse::new("Q3 forecast: 12000 units", "llm"))
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let mut app = ChatApp::new(MemoryStore::new(), Arc::new(Canned), RecordingRenderer::new());
/// app.dispatch(Action::Send("Forecast Q3 sales".to_string()));
/// let settlement = app.wait_for_settlement().await.unwrap();
/// assert_eq!(settlement.outcome, Outcome::Answered);
/// assert_eq!(app.registry().current().unwrap().name, "Forecast Q3 sales");
/// # });
/// ```
pub struct ChatApp<S: SessionStore, R: Renderer> {
    registry: SessionRegistry<S>,
    controller: RequestController,
    renderer: R,
    formatter: Box<dyn Formatter>,
    events: UnboundedReceiver<AppEvent>,
}

impl<S: SessionStore, R: Renderer> ChatApp<S, R> {
    /// Open the sessions in `store` and talk to the assistant via `transport`.
    pub fn new(store: S, transport: Arc<dyn AssistantTransport>, renderer: R) -> Self {
        Self::with_tick_period(store, transport, renderer, DEFAULT_TICK_PERIOD)
    }

    /// Like [`ChatApp::new`] with a custom animation period.
    pub fn with_tick_period(
        store: S,
        transport: Arc<dyn AssistantTransport>,
        renderer: R,
        tick_period: Duration,
    ) -> Self {
        let (tx, events) = unbounded_channel();
        let animator = ThinkingAnimator::with_period(tx.clone(), tick_period);
        Self {
            registry: SessionRegistry::open(store),
            controller: RequestController::new(transport, tx, animator),
            renderer,
            formatter: Box::new(PlainFormatter),
            events,
        }
    }

    /// Use `formatter` for assistant text.
    pub fn with_formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    /// The frame for the current state.
    pub fn frame(&self) -> Frame {
        project(
            self.registry.sessions(),
            self.registry.current_id(),
            self.controller.active_fetch(),
            self.formatter.as_ref(),
        )
    }

    /// Draw the current frame.
    pub fn redraw(&mut self) {
        let frame = self.frame();
        self.renderer.render(&frame);
    }

    /// Apply one user action.
    pub fn dispatch(&mut self, action: Action) -> Flow {
        tracing::debug!(action = ?action, "dispatch");
        match action {
            Action::NewSession => {
                self.registry.create_session();
                self.redraw();
            }
            Action::SelectSession(id) => self.select(&id),
            Action::SelectIndex(position) => {
                let by_position = position
                    .checked_sub(1)
                    .and_then(|i| self.registry.sessions().get(i))
                    .map(|s| s.id.clone());
                let id = by_position.unwrap_or_else(|| SessionId::new(position.to_string()));
                self.select(&id);
            }
            Action::Send(text) | Action::SubmitOnEnter(text) => self.send(&text),
            Action::Stop => {
                if !self.controller.stop() {
                    self.renderer.print_info("Nothing to stop.");
                }
            }
            Action::PickExample(index) => match EXAMPLE_PROMPTS.get(index) {
                Some(prompt) => self.send(prompt),
                None => self.renderer.print_error(&format!(
                    "No example {}; there are {}.",
                    index.saturating_add(1),
                    EXAMPLE_PROMPTS.len()
                )),
            },
            Action::ListSessions => {
                for line in self.frame().sidebar_lines() {
                    self.renderer.print_info(&line);
                }
            }
            Action::ListExamples => {
                for (i, prompt) in EXAMPLE_PROMPTS.iter().enumerate() {
                    self.renderer.print_info(&format!("  {}. {prompt}", i + 1));
                }
            }
            Action::Help => {
                for line in help_text().lines() {
                    self.renderer.print_info(&format!("    {line}"));
                }
            }
            Action::Quit => {
                if self.controller.is_pending() {
                    tracing::info!("quitting with a request still pending");
                }
                return Flow::Quit;
            }
            Action::Unrecognized(message) => self.renderer.print_error(&message),
        }
        Flow::Continue
    }

    fn select(&mut self, id: &SessionId) {
        if !self.registry.select_session(id) {
            self.renderer
                .print_error(&format!("No chat matches {id}; see /sessions."));
            return;
        }
        self.controller.resume_animation(id);
        self.redraw();
    }

    fn send(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.controller.is_pending() {
            self.renderer
                .print_info("Still waiting on the assistant; use /stop to cancel.");
            return;
        }
        let session = match self.registry.current_id() {
            Some(id) => id.clone(),
            None => self.registry.create_session(),
        };
        match self.controller.send(&mut self.registry, &session, text) {
            Ok(_) => self.redraw(),
            Err(err) => self.renderer.print_error(&err.to_string()),
        }
    }

    /// Apply one background event.
    ///
    /// Returns the settlement when the event finished the pending request.
    pub fn handle_event(&mut self, event: AppEvent) -> Option<Settlement> {
        match event {
            AppEvent::Tick(tick) => {
                let owner = self.controller.active_fetch().cloned();
                if self.controller.on_tick(&mut self.registry, tick)
                    && owner.as_ref() == self.registry.current_id()
                {
                    self.redraw();
                }
                None
            }
            AppEvent::Settled { request, result } => {
                let settlement = self.controller.settle(&mut self.registry, request, result)?;
                if Some(&settlement.session) != self.registry.current_id() {
                    if let Some(session) = self.registry.get(&settlement.session) {
                        let note = format!("\"{}\" has a reply; see /sessions.", session.name);
                        self.renderer.print_info(&note);
                    }
                }
                self.redraw();
                Some(settlement)
            }
        }
    }

    /// Wait for the next background event.
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.events.recv().await
    }

    /// Process events until the pending request settles.
    ///
    /// Returns `None` right away when nothing is pending.
    pub async fn wait_for_settlement(&mut self) -> Option<Settlement> {
        while self.controller.is_pending() {
            let event = self.events.recv().await?;
            if let Some(settlement) = self.handle_event(event) {
                return Some(settlement);
            }
        }
        None
    }

    /// Run until [`Action::Quit`] or until `actions` closes.
    pub async fn run(&mut self, mut actions: UnboundedReceiver<Action>) {
        self.redraw();
        loop {
            tokio::select! {
                action = actions.recv() => match action {
                    Some(action) => {
                        if self.dispatch(action) == Flow::Quit {
                            break;
                        }
                    }
                    None => break,
                },
                Some(event) = self.events.recv() => {
                    self.handle_event(event);
                }
            }
        }
    }

    /// The session registry.
    pub fn registry(&self) -> &SessionRegistry<S> {
        &self.registry
    }

    /// The request controller.
    pub fn controller(&self) -> &RequestController {
        &self.controller
    }

    /// The renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ERROR_MESSAGE, Outcome, STOPPED_MESSAGE};
    use crate::render::{RecordingRenderer, SendControl, View};
    use crate::store::MemoryStore;
    use crate::types::DEFAULT_SESSION_NAME;
    use tokio_util::sync::CancellationToken;

    use crate::Error;
    use crate::types::ChatRequest;

    /// Echoes the request back, or fails for text starting with "fail".
    struct Echo;

    #[async_trait::async_trait]
    impl AssistantTransport for Echo {
        async fn chat(
            &self,
            request: &ChatRequest,
            _cancel: &CancellationToken,
        ) -> Result<ChatResponse> {
            if request.message.starts_with("fail") {
                Err(Error::non_success_status(500, ""))
            } else {
                Ok(ChatResponse::new(format!("echo: {}", request.message), "llm"))
            }
        }
    }

    /// Waits until cancelled.
    struct UntilCancelled;

    #[async_trait::async_trait]
    impl AssistantTransport for UntilCancelled {
        async fn chat(
            &self,
            _request: &ChatRequest,
            cancel: &CancellationToken,
        ) -> Result<ChatResponse> {
            cancel.cancelled().await;
            Err(Error::cancelled("aborted"))
        }
    }

    fn app(transport: impl AssistantTransport + 'static) -> ChatApp<MemoryStore, RecordingRenderer> {
        ChatApp::new(MemoryStore::new(), Arc::new(transport), RecordingRenderer::new())
    }

    fn last_message<R: Renderer>(app: &ChatApp<MemoryStore, R>) -> String {
        app.registry()
            .current()
            .and_then(|s| s.messages.last())
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    #[test]
    fn input_lines_map_to_actions() {
        assert_eq!(Action::from_input("/new"), Action::NewSession);
        assert_eq!(Action::from_input("/switch 2"), Action::SelectIndex(2));
        assert_eq!(
            Action::from_input("/switch abc"),
            Action::SelectSession(SessionId::new("abc"))
        );
        assert_eq!(Action::from_input("/example 1"), Action::PickExample(0));
        assert_eq!(
            Action::from_input("hello"),
            Action::SubmitOnEnter("hello".to_string())
        );
        assert!(matches!(
            Action::from_input("/bogus"),
            Action::Unrecognized(_)
        ));
    }

    #[tokio::test]
    async fn starts_on_the_welcome_view() {
        let mut app = app(Echo);
        app.redraw();
        let frame = app.renderer().last_frame().unwrap();
        assert_eq!(frame.view, View::Welcome);
        assert_eq!(frame.title.as_deref(), Some(DEFAULT_SESSION_NAME));
        assert_eq!(frame.send_control, SendControl::Send);
    }

    #[tokio::test]
    async fn send_then_settle() {
        let mut app = app(Echo);
        app.dispatch(Action::Send("  Forecast Q3 sales ".to_string()));
        assert_eq!(
            app.renderer().last_frame().unwrap().send_control,
            SendControl::Stop
        );
        let settlement = app.wait_for_settlement().await.unwrap();
        assert_eq!(settlement.outcome, Outcome::Answered);
        assert_eq!(last_message(&app), "echo: Forecast Q3 sales");
        let frame = app.renderer().last_frame().unwrap();
        assert_eq!(frame.send_control, SendControl::Send);
        assert_eq!(frame.title.as_deref(), Some("Forecast Q3 sales"));
    }

    #[tokio::test]
    async fn blank_text_is_ignored() {
        let mut app = app(Echo);
        app.dispatch(Action::SubmitOnEnter("   ".to_string()));
        assert!(app.controller().is_idle());
        assert!(app.registry().current().unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn sending_while_pending_is_refused() {
        let mut app = app(UntilCancelled);
        app.dispatch(Action::Send("one".to_string()));
        app.dispatch(Action::NewSession);
        app.dispatch(Action::Send("two".to_string()));
        assert!(app.registry().current().unwrap().messages.is_empty());
        assert_eq!(
            app.renderer().last_frame().unwrap().send_control,
            SendControl::Disabled
        );
        assert!(
            app.renderer()
                .info()
                .iter()
                .any(|line| line.contains("/stop"))
        );
    }

    #[tokio::test]
    async fn stop_finalizes_on_settlement() {
        let mut app = app(UntilCancelled);
        app.dispatch(Action::Send("slow question".to_string()));
        app.dispatch(Action::Stop);
        let settlement = app.wait_for_settlement().await.unwrap();
        assert_eq!(settlement.outcome, Outcome::Stopped);
        assert_eq!(last_message(&app), STOPPED_MESSAGE);
    }

    #[tokio::test]
    async fn errors_show_the_fixed_message() {
        let mut app = app(Echo);
        app.dispatch(Action::Send("fail please".to_string()));
        app.wait_for_settlement().await;
        assert_eq!(last_message(&app), ERROR_MESSAGE);
        assert!(app.controller().is_idle());
    }

    #[tokio::test]
    async fn settling_in_a_background_session_reenables_send() {
        let mut app = app(Echo);
        app.dispatch(Action::Send("question".to_string()));
        app.dispatch(Action::NewSession);
        let viewing = app.registry().current_id().unwrap().clone();
        assert_eq!(
            app.renderer().last_frame().unwrap().send_control,
            SendControl::Disabled
        );

        let settlement = app.wait_for_settlement().await.unwrap();
        assert_ne!(settlement.session, viewing);
        let frame = app.renderer().last_frame().unwrap();
        assert_eq!(frame.send_control, SendControl::Send);
        assert_eq!(frame.current.as_ref(), Some(&viewing));
        assert_eq!(frame.view, View::Welcome);
        assert!(frame.sidebar.iter().all(|entry| !entry.awaiting_reply));
        assert!(app.registry().current().unwrap().messages.is_empty());
        assert!(
            app.renderer()
                .info()
                .last()
                .is_some_and(|line| line.contains("\"question\" has a reply"))
        );
        let answered = app.registry().get(&settlement.session).unwrap();
        assert_eq!(answered.messages[1].content, "echo: question");
    }

    #[tokio::test]
    async fn select_by_position_and_id() {
        let mut app = app(Echo);
        let oldest = app.registry().current_id().unwrap().clone();
        app.dispatch(Action::NewSession);
        app.dispatch(Action::SelectIndex(2));
        assert_eq!(app.registry().current_id(), Some(&oldest));

        let newest = app.registry().sessions()[0].id.clone();
        app.dispatch(Action::SelectSession(newest.clone()));
        assert_eq!(app.registry().current_id(), Some(&newest));

        app.dispatch(Action::SelectIndex(99));
        assert_eq!(app.registry().current_id(), Some(&newest));
        assert_eq!(app.renderer().errors().len(), 1);

        let millis = oldest.millis().unwrap() as usize;
        app.dispatch(Action::SelectIndex(millis));
        assert_eq!(app.registry().current_id(), Some(&oldest));
    }

    #[tokio::test]
    async fn pick_example_sends_the_prompt() {
        let mut app = app(Echo);
        app.dispatch(Action::PickExample(0));
        app.wait_for_settlement().await;
        assert_eq!(
            app.registry().current().unwrap().name,
            crate::types::session_name_from(EXAMPLE_PROMPTS[0])
        );
        assert_eq!(last_message(&app), format!("echo: {}", EXAMPLE_PROMPTS[0]));
        app.dispatch(Action::PickExample(EXAMPLE_PROMPTS.len()));
        app.dispatch(Action::PickExample(usize::MAX));
        assert_eq!(app.renderer().errors().len(), 2);
        assert!(app.renderer().errors()[1].starts_with("No example "));
    }

    /// Upper-cases assistant text.
    struct Shouting;

    impl Formatter for Shouting {
        fn format(&self, content: &str) -> String {
            content.to_uppercase()
        }
    }

    #[tokio::test]
    async fn formatter_applies_to_assistant_text() {
        let mut app = app(Echo).with_formatter(Shouting);
        app.dispatch(Action::Send("hi".to_string()));
        app.wait_for_settlement().await;
        let frame = app.renderer().last_frame().unwrap();
        let texts: Vec<&str> = frame.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["hi", "ECHO: HI"]);
    }

    #[tokio::test]
    async fn informational_actions_print() {
        let mut app = app(Echo);
        app.dispatch(Action::ListSessions);
        app.dispatch(Action::ListExamples);
        app.dispatch(Action::Stop);
        let info = app.renderer().info();
        assert!(info[0].contains(DEFAULT_SESSION_NAME));
        assert!(info.iter().any(|line| line.contains(EXAMPLE_PROMPTS[2])));
        assert_eq!(info.last().unwrap(), "Nothing to stop.");
        assert_eq!(app.dispatch(Action::Quit), Flow::Quit);
    }

    /// Asks the loop to quit once an assistant reply is on screen.
    struct QuitWhenAnswered {
        actions: tokio::sync::mpsc::UnboundedSender<Action>,
        frames: usize,
    }

    impl Renderer for QuitWhenAnswered {
        fn render(&mut self, frame: &Frame) {
            self.frames += 1;
            let answered = frame
                .messages()
                .last()
                .is_some_and(|m| m.role == crate::types::Role::Assistant && !m.pending);
            if answered {
                let _ = self.actions.send(Action::Quit);
            }
        }

        fn print_info(&mut self, _info: &str) {}

        fn print_error(&mut self, _error: &str) {}
    }

    #[tokio::test]
    async fn run_processes_actions_and_events() {
        let (tx, rx) = unbounded_channel();
        let renderer = QuitWhenAnswered {
            actions: tx.clone(),
            frames: 0,
        };
        let mut app = ChatApp::new(MemoryStore::new(), Arc::new(Echo), renderer);
        tx.send(Action::Send("hello".to_string())).unwrap();
        app.run(rx).await;
        assert!(app.controller().is_idle());
        assert_eq!(last_message(&app), "echo: hello");
        assert!(app.renderer().frames >= 3);
    }

    #[tokio::test]
    async fn run_ends_when_input_closes() {
        let (tx, rx) = unbounded_channel();
        let mut app = app(Echo);
        tx.send(Action::NewSession).unwrap();
        drop(tx);
        app.run(rx).await;
        assert_eq!(app.registry().len(), 2);
    }
}
