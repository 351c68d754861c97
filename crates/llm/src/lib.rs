//! Proof Cascade LLM
//!
//! Provides a unified interface for the chat-completion services that propose
//! proof plans:
//! - OpenAI (and any OpenAI-compatible endpoint via `base_url`)
//! - DeepSeek
//!
//! Also includes the HTTP client factory and the provider factory.

pub mod deepseek;
pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use deepseek::DeepSeekProvider;
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::{create_provider, LlmProvider};
pub use types::*;
