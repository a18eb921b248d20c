//! Grounded answer synthesis

use std::sync::Arc;

use blograg_cache::normalize;
use tracing::debug;

use crate::error::{RagError, Result};
use crate::llm::TextGenerator;

/// Reply when the retrieved context holds nothing relevant
pub const NOT_FOUND: &str = "Not found in the provided blog.";

/// Reply when there is neither a document nor inline context
pub const NO_INFORMATION: &str = "No information available for this blog.";

/// Reply when an upstream capability fails while answering
pub const DEGRADED: &str =
    "Sorry, I couldn't answer that right now. Please try again in a moment.";

pub const RAG_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on the provided blog content.

INSTRUCTIONS:
- Use the provided context to answer the question accurately.
- If the answer is not explicitly stated but can be inferred from the context, provide the inference clearly.
- Only if there is absolutely no relevant information, say: \"Not found in the provided blog.\"
- Keep responses concise and professional.";

const GREETING: &str =
    "Greetings! How may I assist you today with information regarding this blog post?";
const WELLBEING: &str = "I am functioning optimally and ready to assist you with your inquiries. How can I help you regarding this blog?";
const IDENTITY: &str = "I am the AI Blog Assistant, dedicated to helping you understand and explore the content of this platform.";
const THANKS: &str =
    "You are most welcome. Is there anything else you would like to know about the blog?";

/// Fixed reply for small talk, matched on the normalized question
pub fn canned_response(question: &str) -> Option<&'static str> {
    match normalize(question).as_str() {
        "hello" | "hey" | "hi" => Some(GREETING),
        "how are you" => Some(WELLBEING),
        "who are you" => Some(IDENTITY),
        "thanks" | "thank you" => Some(THANKS),
        _ => None,
    }
}

/// Build the user turn: passages in rank order, blank-line separated
pub fn build_prompt(question: &str, context: &[String]) -> String {
    format!("Blog context:\n{}\n\nQuestion: {}", context.join("\n\n"), question)
}

#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Answer from the given passages only
    ///
    /// Empty context short-circuits to [`NOT_FOUND`] without generating.
    pub async fn synthesize(&self, question: &str, context: &[String]) -> Result<String> {
        let context: Vec<String> = context
            .iter()
            .filter(|passage| !passage.trim().is_empty())
            .cloned()
            .collect();
        if context.is_empty() {
            debug!("No context for question, skipping generation");
            return Ok(NOT_FOUND.to_string());
        }

        let answer = self
            .generator
            .generate(RAG_SYSTEM_PROMPT, &build_prompt(question, &context))
            .await?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(RagError::Generation("empty completion".into()));
        }
        Ok(answer.to_string())
    }
}
