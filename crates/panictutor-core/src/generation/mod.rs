//! Text generation collaborator.
//!
//! The core only ever sees [`TextGenerator`]: a prompt goes in, text or a
//! [`GenerationError`] comes out. Parsing the text into a quiz question or a
//! batch of lines is the caller's job (see [`parse`]), as is falling back
//! when anything goes wrong.

mod gemini;
pub mod parse;
pub mod prompts;

pub use gemini::GeminiGenerator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// What kind of text the caller hopes to get back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "count", rename_all = "snake_case")]
pub enum ResponseShape {
    ShortMessage,
    QuestionAnswer,
    Lines(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub shape: ResponseShape,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, shape: ResponseShape) -> Self {
        Self {
            prompt: prompt.into(),
            shape,
        }
    }
}

/// Turns a prompt into text. Makes no format guarantees.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// A generator that is never configured. Every call fails with
/// [`GenerationError::NotConfigured`], so callers always use fallbacks.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGenerator;

#[async_trait]
impl TextGenerator for OfflineGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_generator_is_object_safe() {
        fn _takes_boxed(_: Box<dyn TextGenerator>) {}
    }

    #[tokio::test]
    async fn offline_generator_always_fails() {
        let err = OfflineGenerator
            .generate(GenerationRequest::new("hi", ResponseShape::ShortMessage))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured));
    }
}
