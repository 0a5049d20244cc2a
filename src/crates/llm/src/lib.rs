//! Chat-completion client for the ingestion pipeline.
//!
//! A thin, typed wrapper over an OpenAI-compatible `/chat/completions`
//! endpoint. Each call is a one-shot HTTP round trip; errors propagate to
//! the caller, which owns any retry or fallback policy. The model name is a
//! parameter of every call so different pipeline stages can run on
//! different models.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::{ChatClient, ChatMessage, LlmConfig};
//!
//! let config = LlmConfig::from_env()?;
//! let client = ChatClient::new(config);
//!
//! let content = client
//!     .chat(
//!         "gpt-5-mini",
//!         vec![ChatMessage::user("Summarise this sentence.")],
//!         None,
//!     )
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::{
    AssistantMessage, ChatClient, ChatMessage, FunctionCall, ResponseFormat, Role, ToolCall,
    ToolDefinition,
};
pub use config::LlmConfig;
pub use error::{LlmError, Result};
