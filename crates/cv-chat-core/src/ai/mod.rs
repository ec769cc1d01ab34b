pub mod openai;

pub use openai::{CompletionError, CompletionRequest, OpenAIClient};
