//! # engage-providers
//!
//! Concrete `ModelClient` implementations.
//!
//! - [`OpenAiChatClient`] speaks the OpenAI chat-completions protocol with
//!   function calling. Ollama exposes the same protocol under `/v1`, so both
//!   providers share one client.
//! - [`GeminiClient`] speaks Gemini `generateContent`, either with an API key
//!   or through Vertex AI.

pub mod gemini;
pub mod openai;

pub use gemini::{GeminiAuth, GeminiClient};
pub use openai::OpenAiChatClient;
