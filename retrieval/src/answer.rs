//! Grounded answering on top of retrieval.

use std::sync::Arc;

use recall_embeddings::{GenerationRequest, OpenAIGenerator, TextGenerator};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::engine::{RetrievalEngine, SimilarityResult};
use crate::error::{Result, RetrievalError};

/// Reply used when nothing relevant was retrieved.
pub const NO_RELEVANT_ANSWER: &str = "No relevant information was found for this question.";

/// An answer together with the passages it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub passages: Vec<SimilarityResult>,
}

/// Answers questions with a text generator, using retrieved passages as
/// context.
pub struct AnswerComposer {
    generator: Arc<dyn TextGenerator>,
    system_prompt: Option<String>,
    model: Option<String>,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            system_prompt: None,
            model: None,
        }
    }

    /// Answer with an OpenAI-compatible chat endpoint configured by `config`.
    pub fn from_config(config: &GenerationConfig) -> Self {
        let mut generator = OpenAIGenerator::new();
        if let Some(url) = &config.base_url {
            generator = generator.with_base_url(url.clone());
        }
        if let Some(key) = &config.api_key {
            generator = generator.with_api_key(key.clone());
        }

        Self::new(Arc::new(generator))
            .with_system_prompt(config.system_prompt.clone())
            .with_model(config.model.clone())
    }

    /// Set the system instruction sent with every prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Request a specific chat model.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Retrieve passages for `question` and ask the generator to answer from
    /// them. The generator is not called when nothing is retrieved.
    pub async fn answer(&self, engine: &RetrievalEngine, question: &str) -> Result<Answer> {
        let passages = engine.find_relevant(question).await?;

        if passages.is_empty() {
            debug!("No passages retrieved, skipping generation");
            return Ok(Answer {
                text: NO_RELEVANT_ANSWER.to_string(),
                passages,
            });
        }

        let mut request = GenerationRequest::new(build_prompt(&passages, question));
        if let Some(system) = &self.system_prompt {
            request = request.with_system(system.clone());
        }
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        debug!(
            "Generating answer with {} from {} passages",
            self.generator.name(),
            passages.len()
        );

        let text = self
            .generator
            .generate(request)
            .await
            .map_err(RetrievalError::Generation)?;

        Ok(Answer { text, passages })
    }
}

/// Lay out retrieved passages, then the question.
pub fn build_prompt(passages: &[SimilarityResult], question: &str) -> String {
    let listed: String = passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] ({}) {}\n", i + 1, p.source, p.content))
        .collect();
    format!("Passages:\n{listed}\nQuestion: {question}")
}
