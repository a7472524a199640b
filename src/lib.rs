pub mod chat;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod logging;
pub mod prompts;
pub mod providers;
pub mod session;
pub mod slash;
pub mod storage;
pub mod streaming;

#[cfg(test)]
mod test_support;

pub use chat::{ChatSession, TurnOutcome};
pub use config::{AppConfig, Provider, ProviderSettings};
pub use conversation::{Conversation, Message, Role};
pub use error::StreamError;
pub use llm::{ChatTurn, LlmClient};
pub use session::ConversationStore;
pub use storage::StorageManager;
pub use streaming::{FragmentStream, echo_cumulative};
