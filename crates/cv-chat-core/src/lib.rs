pub mod ai;
pub mod config;
pub mod conversation;
pub mod credentials;
pub mod profile;
pub mod state;

// Re-export main types for convenience
pub use ai::{CompletionError, CompletionRequest, OpenAIClient};
pub use config::Config;
pub use conversation::{
    CompletionSettings, ControllerState, Conversation, FeedItem, Notice, NoticeKind, SendOutcome,
};
pub use credentials::CredentialStore;
pub use state::{ChatMessage, ChatRole, Transcript};
