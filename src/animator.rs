//! The "thinking" ticker shown while a reply is pending.
//!
//! The animator owns at most one timer task. Each period it emits an
//! [`AppEvent::Tick`] carrying the request it is bound to and a dot count
//! cycling 0, 1, 2, 3, 0, ... It never touches messages itself; whoever
//! consumes the tick decides what to write and whether to render.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::AppEvent;
use crate::observability::{ANIMATOR_STARTS, ANIMATOR_TICKS};

/// Default time between animation frames.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(500);

/// Highest dot count before the cycle wraps to zero.
pub const MAX_DOTS: usize = 3;

/// Identifier of one assistant request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One animation frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tick {
    /// The request whose placeholder this frame belongs to.
    pub request: RequestId,
    /// Number of dots to show, `0..=MAX_DOTS`.
    pub dots: usize,
}

struct Running {
    request: RequestId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Animation state machine: idle or running one timer.
pub struct ThinkingAnimator {
    events: UnboundedSender<AppEvent>,
    period: Duration,
    running: Option<Running>,
}

impl ThinkingAnimator {
    /// Create an idle animator that sends frames on `events`.
    pub fn new(events: UnboundedSender<AppEvent>) -> Self {
        Self::with_period(events, DEFAULT_TICK_PERIOD)
    }

    /// Create an idle animator with a custom frame period.
    pub fn with_period(events: UnboundedSender<AppEvent>, period: Duration) -> Self {
        Self {
            events,
            period,
            running: None,
        }
    }

    /// Start animating for `request`, replacing any timer already running.
    ///
    /// The first frame arrives one period after the call.
    pub fn start(&mut self, request: RequestId) {
        self.stop();
        ANIMATOR_STARTS.click();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_ticker(
            request,
            self.period,
            cancel.clone(),
            self.events.clone(),
        ));
        self.running = Some(Running {
            request,
            cancel,
            task,
        });
    }

    /// Stop the timer, if any.  Calling this while idle does nothing.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            running.task.abort();
        }
    }

    /// True while a timer is running.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// The request the running timer is bound to.
    pub fn bound_to(&self) -> Option<RequestId> {
        self.running.as_ref().map(|r| r.request)
    }

    /// The frame period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for ThinkingAnimator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_ticker(
    request: RequestId,
    period: Duration,
    cancel: CancellationToken,
    events: UnboundedSender<AppEvent>,
) {
    let mut interval = interval_at(Instant::now() + period, period);
    let mut dots = 0;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if dots > MAX_DOTS {
                    dots = 0;
                }
                ANIMATOR_TICKS.click();
                if events.send(AppEvent::Tick(Tick { request, dots })).is_err() {
                    break;
                }
                dots += 1;
            }
        }
    }
}

/// Placeholder text for a frame with `dots` dots.
pub fn thinking_text(dots: usize) -> String {
    format!("{THINKING_PREFIX}{}", ".".repeat(dots))
}

/// Text every placeholder frame starts with.
pub const THINKING_PREFIX: &str = "🤖 Thinking";
