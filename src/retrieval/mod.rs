//! Embedding retrieval agent
//!
//! Answers lookup-flavored questions by nearest-neighbor search over row
//! embeddings, then narrates the retrieved rows with three sequential LLM
//! calls. When nothing is retrievable it short-circuits with a fixed
//! response and never touches the LLM.

pub mod embedder;
pub mod index;

use crate::llm::LlmClient;
use embedder::Embedder;
use index::RowIndex;
use tracing::info;

const NARRATION_MAX_TOKENS: u32 = 300;

pub const NO_DATA_RESPONSE: &str = "No relevant data rows found.";

#[derive(Debug, Clone)]
pub struct RetrievalResponse {
    pub answer: String,
    pub explanation: String,
    pub reasoning: String,
    pub context_rows: Vec<String>,
}

impl RetrievalResponse {
    fn no_data() -> Self {
        Self {
            answer: NO_DATA_RESPONSE.to_string(),
            explanation: "N/A".to_string(),
            reasoning: "N/A".to_string(),
            context_rows: Vec::new(),
        }
    }
}

pub struct RetrievalAgent {
    llm: LlmClient,
}

impl RetrievalAgent {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    pub async fn ask(
        &self,
        index: &RowIndex,
        embedder: &dyn Embedder,
        question: &str,
        top_k: usize,
    ) -> RetrievalResponse {
        if index.is_empty() {
            return RetrievalResponse::no_data();
        }

        let query = match embedder.embed(&[question.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => return RetrievalResponse::no_data(),
            Err(e) => {
                return RetrievalResponse {
                    answer: format!("Error embedding question: {}", e),
                    explanation: "N/A".to_string(),
                    reasoning: "N/A".to_string(),
                    context_rows: Vec::new(),
                }
            }
        };

        let hits = index.search(&query, top_k);
        let retrieved = index.texts_for(&hits);
        if retrieved.is_empty() {
            return RetrievalResponse::no_data();
        }
        info!(rows = retrieved.len(), "Retrieved context rows");

        let context = retrieved
            .iter()
            .map(|row| format!("- {}", row))
            .collect::<Vec<_>>()
            .join("\n");

        let answer = self
            .llm
            .complete_or_error_text(&answer_prompt(question, &context), NARRATION_MAX_TOKENS)
            .await;
        let explanation = self
            .llm
            .complete_or_error_text(
                &explanation_prompt(question, &context, &answer),
                NARRATION_MAX_TOKENS,
            )
            .await;
        let reasoning = self
            .llm
            .complete_or_error_text(
                &reasoning_prompt(question, &context, &answer),
                NARRATION_MAX_TOKENS,
            )
            .await;

        RetrievalResponse {
            answer,
            explanation,
            reasoning,
            context_rows: retrieved,
        }
    }
}

fn answer_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are a helpful analyst. Use the following context rows to answer the user's question in one line.

Context rows:
{context}

Question: {question}

Answer:"#,
        context = context,
        question = question,
    )
}

fn explanation_prompt(question: &str, context: &str, answer: &str) -> String {
    format!(
        r#"Explain how the following context helps answer the question.

Question: {question}
Context rows:
{context}
Answer:
{answer}

Explanation:"#,
        question = question,
        context = context,
        answer = answer,
    )
}

fn reasoning_prompt(question: &str, context: &str, answer: &str) -> String {
    format!(
        r#"Think through the logic step-by-step as an expert data analyst.

1. What is the user asking?
2. What clues do the retrieved rows provide?
3. How do those rows relate to the question?
4. Finally, explain why the answer is correct.

Question: {question}
Context rows:
{context}
Answer: {answer}

Chain-of-Thought:"#,
        question = question,
        context = context,
        answer = answer,
    )
}
