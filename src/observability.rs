use biometrics::{Collector, Counter, Moments};

pub(crate) static ASSISTANT_REQUESTS: Counter = Counter::new("forecast_chat.assistant.requests");
pub(crate) static ASSISTANT_ERRORS: Counter = Counter::new("forecast_chat.assistant.errors");
pub(crate) static ASSISTANT_STOPPED: Counter = Counter::new("forecast_chat.assistant.stopped");
pub(crate) static ASSISTANT_STALE_SETTLEMENTS: Counter =
    Counter::new("forecast_chat.assistant.stale_settlements");
pub(crate) static ASSISTANT_REQUEST_DURATION: Moments =
    Moments::new("forecast_chat.assistant.request_duration_seconds");

pub(crate) static STORE_SAVES: Counter = Counter::new("forecast_chat.store.saves");
pub(crate) static STORE_SAVE_ERRORS: Counter = Counter::new("forecast_chat.store.save_errors");
pub(crate) static STORE_LOAD_ERRORS: Counter = Counter::new("forecast_chat.store.load_errors");

pub(crate) static ANIMATOR_STARTS: Counter = Counter::new("forecast_chat.animator.starts");
pub(crate) static ANIMATOR_TICKS: Counter = Counter::new("forecast_chat.animator.ticks");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&ASSISTANT_REQUESTS);
    collector.register_counter(&ASSISTANT_ERRORS);
    collector.register_counter(&ASSISTANT_STOPPED);
    collector.register_counter(&ASSISTANT_STALE_SETTLEMENTS);
    collector.register_moments(&ASSISTANT_REQUEST_DURATION);

    collector.register_counter(&STORE_SAVES);
    collector.register_counter(&STORE_SAVE_ERRORS);
    collector.register_counter(&STORE_LOAD_ERRORS);

    collector.register_counter(&ANIMATOR_STARTS);
    collector.register_counter(&ANIMATOR_TICKS);
}
