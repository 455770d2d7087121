//! The single in-flight assistant request.
//!
//! [`RequestController`] is the only place that knows whether a request is
//! outstanding, which session is waiting on it, and whether the user asked
//! to stop it. The remote call runs on its own task; its result comes back
//! as an [`AppEvent::Settled`] and [`RequestController::settle`] is the one
//! place that finalizes the placeholder.
//!
//! ```text
//! Idle --send--> Pending --settle--> (Answered | Stopped | Errored) --> Idle
//!                   |
//!                 stop (requests cancellation; settle still finalizes)
//! ```

use std::sync::Arc;
use std::time::Instant;

use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::AppEvent;
use crate::animator::{RequestId, THINKING_PREFIX, ThinkingAnimator, Tick, thinking_text};
use crate::client::AssistantTransport;
use crate::error::{Error, Result};
use crate::observability::{
    ASSISTANT_ERRORS, ASSISTANT_REQUEST_DURATION, ASSISTANT_REQUESTS, ASSISTANT_STALE_SETTLEMENTS,
    ASSISTANT_STOPPED,
};
use crate::registry::{Placeholder, SessionRegistry};
use crate::store::SessionStore;
use crate::types::{ChatRequest, ChatResponse, Exchange, Message, SessionId};

/// Final text of a placeholder whose request the user stopped.
pub const STOPPED_MESSAGE: &str = "⏹️ Response stopped by user.";

/// Final text of a placeholder whose request failed.
pub const ERROR_MESSAGE: &str = "Error from assistant.";

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The assistant replied; the placeholder holds the reply.
    Answered,
    /// The user stopped the request; the placeholder holds [`STOPPED_MESSAGE`].
    Stopped,
    /// The request failed; the placeholder holds [`ERROR_MESSAGE`].
    Errored,
}

/// Result of applying a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// The request that settled.
    pub request: RequestId,
    /// The session that was waiting on it.
    pub session: SessionId,
    /// How it ended.
    pub outcome: Outcome,
}

/// The outstanding request.
#[derive(Debug)]
pub struct PendingRequest {
    id: RequestId,
    placeholder: Placeholder,
    user_text: String,
    cancel: CancellationToken,
    stop_requested: bool,
    started: Instant,
}

impl PendingRequest {
    /// The request's identifier.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The session waiting on the request.
    pub fn session(&self) -> &SessionId {
        &self.placeholder.session
    }

    /// Where the placeholder lives.
    pub fn placeholder(&self) -> &Placeholder {
        &self.placeholder
    }

    /// True once the user asked to stop.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}

/// Controller state.
#[derive(Debug, Default)]
pub enum ControllerState {
    /// No request is outstanding; sending is allowed.
    #[default]
    Idle,
    /// One request is outstanding.
    Pending(PendingRequest),
}

/// Owner of the single in-flight request and of the animator bound to it.
pub struct RequestController {
    transport: Arc<dyn AssistantTransport>,
    events: UnboundedSender<AppEvent>,
    animator: ThinkingAnimator,
    state: ControllerState,
    next_request: u64,
    last_outcome: Option<Outcome>,
}

impl RequestController {
    /// Create an idle controller.
    pub fn new(
        transport: Arc<dyn AssistantTransport>,
        events: UnboundedSender<AppEvent>,
        animator: ThinkingAnimator,
    ) -> Self {
        Self {
            transport,
            events,
            animator,
            state: ControllerState::Idle,
            next_request: 1,
            last_outcome: None,
        }
    }

    /// Send `text` on behalf of `session`.
    ///
    /// Appends the user message and a pending placeholder, starts the
    /// animator, and spawns the remote call. Fails with [`Error::Busy`] when
    /// a request is already pending.
    pub fn send<S: SessionStore>(
        &mut self,
        registry: &mut SessionRegistry<S>,
        session: &SessionId,
        text: &str,
    ) -> Result<RequestId> {
        if let ControllerState::Pending(pending) = &self.state {
            return Err(Error::busy(format!(
                "request {} is still pending",
                pending.id
            )));
        }
        registry.append_message(session, Message::user(text))?;
        let placeholder = registry.append_placeholder(session, THINKING_PREFIX)?;

        let id = RequestId(self.next_request);
        self.next_request += 1;
        let cancel = CancellationToken::new();
        self.animator.start(id);
        self.state = ControllerState::Pending(PendingRequest {
            id,
            placeholder,
            user_text: text.to_string(),
            cancel: cancel.clone(),
            stop_requested: false,
            started: Instant::now(),
        });
        ASSISTANT_REQUESTS.click();
        tracing::info!(request = %id, session = %session, "sending to assistant");

        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        let request = ChatRequest::new(text);
        tokio::spawn(async move {
            let child = cancel.child_token();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::cancelled("stopped by user")),
                result = transport.chat(&request, &child) => result,
            };
            // The receiver is gone only when the app is shutting down.
            let _ = events.send(AppEvent::Settled { request: id, result });
        });
        Ok(id)
    }

    /// Ask the pending request to stop.
    ///
    /// Returns `false` when nothing is pending. The placeholder is finalized
    /// later, when the request settles.
    pub fn stop(&mut self) -> bool {
        let ControllerState::Pending(pending) = &mut self.state else {
            return false;
        };
        if !pending.stop_requested {
            tracing::info!(request = %pending.id, "stop requested");
            pending.stop_requested = true;
            pending.cancel.cancel();
        }
        self.animator.stop();
        true
    }

    /// Apply the result of a request.
    ///
    /// Returns `None` when `request` is not the pending request, which makes
    /// duplicate or stale settlements harmless.
    pub fn settle<S: SessionStore>(
        &mut self,
        registry: &mut SessionRegistry<S>,
        request: RequestId,
        result: Result<ChatResponse>,
    ) -> Option<Settlement> {
        match &self.state {
            ControllerState::Pending(pending) if pending.id == request => {}
            _ => {
                ASSISTANT_STALE_SETTLEMENTS.click();
                tracing::debug!(request = %request, "ignoring stale settlement");
                return None;
            }
        }
        let ControllerState::Pending(pending) = std::mem::take(&mut self.state) else {
            return None;
        };
        self.animator.stop();
        ASSISTANT_REQUEST_DURATION.add(pending.started.elapsed().as_secs_f64());

        let session = pending.placeholder.session.clone();
        let outcome = match result {
            _ if pending.stop_requested => {
                ASSISTANT_STOPPED.click();
                Self::finalize(registry, &pending.placeholder, STOPPED_MESSAGE);
                Outcome::Stopped
            }
            Err(err) if err.is_cancelled() => {
                ASSISTANT_STOPPED.click();
                Self::finalize(registry, &pending.placeholder, STOPPED_MESSAGE);
                Outcome::Stopped
            }
            Ok(reply) => {
                Self::finalize(registry, &pending.placeholder, &reply.response);
                let exchange = Exchange {
                    user: pending.user_text,
                    assistant: reply.response,
                    source: reply.source,
                    answered: OffsetDateTime::now_utc(),
                };
                if let Err(err) = registry.record_exchange(&session, exchange) {
                    tracing::warn!(error = %err, "exchange not recorded");
                }
                Outcome::Answered
            }
            Err(err) => {
                ASSISTANT_ERRORS.click();
                tracing::warn!(request = %request, error = %err, "assistant request failed");
                Self::finalize(registry, &pending.placeholder, ERROR_MESSAGE);
                Outcome::Errored
            }
        };
        tracing::info!(request = %request, session = %session, outcome = ?outcome, "request settled");
        self.last_outcome = Some(outcome.clone());
        Some(Settlement {
            request,
            session,
            outcome,
        })
    }

    fn finalize<S: SessionStore>(
        registry: &mut SessionRegistry<S>,
        placeholder: &Placeholder,
        content: &str,
    ) {
        if let Err(err) = registry.finalize_placeholder(placeholder, content) {
            tracing::warn!(error = %err, "placeholder not finalized");
        }
    }

    /// Apply an animation frame to the pending placeholder.
    ///
    /// Returns `true` when the frame was written. Frames for other requests,
    /// or arriving after a stop, are dropped.
    pub fn on_tick<S: SessionStore>(
        &mut self,
        registry: &mut SessionRegistry<S>,
        tick: Tick,
    ) -> bool {
        let ControllerState::Pending(pending) = &self.state else {
            return false;
        };
        if pending.id != tick.request || pending.stop_requested {
            return false;
        }
        registry
            .update_placeholder(&pending.placeholder, &thinking_text(tick.dots))
            .is_ok()
    }

    /// Restart the animation when `session` is the one awaiting a reply.
    pub fn resume_animation(&mut self, session: &SessionId) -> bool {
        match &self.state {
            ControllerState::Pending(pending)
                if pending.session() == session && !pending.stop_requested =>
            {
                self.animator.start(pending.id);
                true
            }
            _ => false,
        }
    }

    /// True when no request is outstanding.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ControllerState::Idle)
    }

    /// True while a request is outstanding.
    pub fn is_pending(&self) -> bool {
        !self.is_idle()
    }

    /// The outstanding request, if any.
    pub fn pending(&self) -> Option<&PendingRequest> {
        match &self.state {
            ControllerState::Pending(pending) => Some(pending),
            ControllerState::Idle => None,
        }
    }

    /// The session awaiting a reply, if any.
    pub fn active_fetch(&self) -> Option<&SessionId> {
        self.pending().map(PendingRequest::session)
    }

    /// How the most recent request ended.
    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    /// The animator bound to the pending request.
    pub fn animator(&self) -> &ThinkingAnimator {
        &self.animator
    }
}
