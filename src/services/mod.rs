//! Services module - remote inference and local image I/O.
//!
//! The services are **framework-agnostic** and have no dependencies on the UI layer.
//! Controllers in [`crate::ui`] depend only on the [`InferenceClient`] and
//! [`ChatSession`] traits, so tests substitute fakes or `mockall` mocks and the
//! binary wires in [`GeminiClient`].
//!
//! # Components
//!
//! - [`InferenceClient`]: edit / analyze / generate, plus creation of a chat session
//! - [`ChatSession`]: a stateful conversation; context is kept across `send` calls
//! - [`GeminiClient`]: the Gemini REST implementation of both traits
//! - [`image_io`]: reading uploads and writing downloads
//! - [`ServiceError`] / [`LocalIoError`]: the two error kinds the UI turns into messages

pub mod error;
pub mod gemini;
pub mod image_io;

use crate::models::{AspectRatio, Image};
use async_trait::async_trait;
use std::sync::Arc;

pub use error::{LocalIoError, ServiceError};
pub use gemini::{GeminiChatSession, GeminiClient, api_key_from_env};

/// The remote multimodal model, as seen by the editor and generation panels.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Apply a natural-language edit to `image` and return the edited image
    async fn edit(&self, image: &Image, instruction: &str) -> Result<Image, ServiceError>;

    /// Describe `image`, or answer `question` about it when one is given
    async fn analyze(&self, image: &Image, question: Option<String>) -> Result<String, ServiceError>;

    /// Create a new image from a text prompt
    async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<Image, ServiceError>;

    /// Open a conversation. Called once per application lifetime.
    fn create_session(&self) -> Arc<dyn ChatSession>;
}

/// A conversation whose context accumulates across turns.
#[async_trait]
pub trait ChatSession: Send + Sync {
    async fn send(&self, message: &str) -> Result<String, ServiceError>;
}
