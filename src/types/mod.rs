// Public modules
pub mod chat_request;
pub mod chat_response;
pub mod exchange;
pub mod message;
pub mod session;

// Re-exports
pub use chat_request::ChatRequest;
pub use chat_response::ChatResponse;
pub use exchange::Exchange;
pub use message::{Message, Role};
pub use session::{DEFAULT_SESSION_NAME, Session, SessionId, session_name_from};
