//! Code-generation Q&A agent
//!
//! Turns a natural-language question plus the dataset schema into a
//! generated analysis program, executes it against a copy of the dataset in
//! the restricted executor, then narrates the result with three follow-up
//! LLM calls (answer, explanation, chain-of-thought). Every failure mode is
//! absorbed into the returned response; nothing raises out of `ask`.

pub mod codegen;
pub mod interpreter;
pub mod prompts;

use crate::charts::ChartSpec;
use crate::llm::LlmClient;
use crate::schema;
use crate::stats;
use interpreter::{ExecValue, ScalarResult};
use polars::prelude::*;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const CODE_MAX_TOKENS: u32 = 300;
const ANSWER_MAX_TOKENS: u32 = 200;
const NARRATION_MAX_TOKENS: u32 = 300;
const MAX_RECORDS_IN_PROMPT: usize = 20;

/// Everything the agent produced for one question.
#[derive(Debug, Clone)]
pub struct QaResponse {
    pub answer: String,
    pub explanation: String,
    pub reasoning: String,
    pub code: String,
    /// Always tabular: scalars are wrapped in a single-column frame and
    /// failures produce a one-row `error` frame.
    pub result: DataFrame,
    pub chart: Option<ChartSpec>,
}

pub struct QaAgent {
    llm: LlmClient,
    max_rows: usize,
    timeout: Duration,
}

impl QaAgent {
    pub fn new(llm: LlmClient, max_rows: usize, timeout_secs: u64) -> Self {
        Self {
            llm,
            max_rows,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn ask(&self, df: &DataFrame, question: &str) -> QaResponse {
        let query_id = uuid::Uuid::new_v4();
        info!(query_id = %query_id, question = question, "Q&A agent processing question");

        // Step 1: generate the analysis program.
        let schema_summary = match schema::summarize_schema(df) {
            Ok(s) => s,
            Err(e) => return failure_response(format!("Schema error: {}", e), String::new()),
        };
        let code_raw = match self
            .llm
            .complete(&prompts::code_prompt(&schema_summary, question), CODE_MAX_TOKENS)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                return failure_response(format!("Error calling model: {}", e), String::new())
            }
        };
        let code = codegen::clean_generated_code(&codegen::extract_code_block(&code_raw));

        // Step 2: security screen, then sandboxed execution.
        if let Err(e) = codegen::screen_code(&code) {
            warn!(error = %e, "Generated code rejected before execution");
            return blocked_response(e.to_string(), code);
        }

        let outcome = {
            let df_copy = df.clone();
            let code_copy = code.clone();
            let max_rows = self.max_rows;
            let deadline = Instant::now() + self.timeout;
            let handle = tokio::task::spawn_blocking(move || {
                interpreter::run(&df_copy, &code_copy, max_rows, deadline)
            });
            match tokio::time::timeout(self.timeout, handle).await {
                Err(_) => {
                    return failure_response("Execution error: analysis timed out".to_string(), code)
                }
                Ok(Err(join_err)) => {
                    return failure_response(
                        format!("Execution error: worker failed: {}", join_err),
                        code,
                    )
                }
                Ok(Ok(Err(e))) => return failure_response(e.to_string(), code),
                Ok(Ok(Ok(outcome))) => outcome,
            }
        };

        // Steps 3-5: narrate. Each call is conditioned on the previous
        // step's text; failures substitute their error message in place.
        let formatted = format_result_for_answer(&outcome.value);
        let answer = self
            .llm
            .complete_or_error_text(&prompts::answer_prompt(question, &formatted), ANSWER_MAX_TOKENS)
            .await;

        let clean_code = codegen::strip_print_statements(&code);
        let explanation = self
            .llm
            .complete_or_error_text(
                &prompts::explanation_prompt(question, &clean_code, &answer),
                NARRATION_MAX_TOKENS,
            )
            .await;
        let reasoning = self
            .llm
            .complete_or_error_text(
                &prompts::reasoning_prompt(question, &clean_code, &answer),
                NARRATION_MAX_TOKENS,
            )
            .await;

        QaResponse {
            answer,
            explanation,
            reasoning,
            code,
            result: value_to_frame(&outcome.value),
            chart: outcome.chart,
        }
    }
}

/// Response for execution failures: error text in place of the answer, a
/// diagnostic one-row frame as the result, narration skipped.
fn failure_response(message: String, code: String) -> QaResponse {
    QaResponse {
        answer: message.clone(),
        explanation: "Code execution failed.".to_string(),
        reasoning: "N/A".to_string(),
        code,
        result: error_frame(&message),
        chart: None,
    }
}

/// Response for security rejections, reported distinctly from execution
/// errors: the code never ran.
fn blocked_response(message: String, code: String) -> QaResponse {
    QaResponse {
        answer: message.clone(),
        explanation: "The generated code was refused before execution.".to_string(),
        reasoning: "N/A".to_string(),
        code,
        result: error_frame(&message),
        chart: None,
    }
}

fn error_frame(message: &str) -> DataFrame {
    df!("error" => [message]).unwrap_or_else(|_| DataFrame::empty())
}

/// Uniform tabular shape for callers: scalars become a one-row `value`
/// column.
fn value_to_frame(value: &ExecValue) -> DataFrame {
    match value {
        ExecValue::Table(table) => table.clone(),
        ExecValue::Scalar(ScalarResult::Int(v)) => {
            df!("value" => [*v]).unwrap_or_else(|_| DataFrame::empty())
        }
        ExecValue::Scalar(ScalarResult::Float(v)) => {
            df!("value" => [*v]).unwrap_or_else(|_| DataFrame::empty())
        }
    }
}

/// Format the execution result for the answer prompt: thousands separators
/// on numbers, tables rendered as row records.
fn format_result_for_answer(value: &ExecValue) -> String {
    match value {
        ExecValue::Scalar(ScalarResult::Int(v)) => stats::format_thousands(*v as f64),
        ExecValue::Scalar(ScalarResult::Float(v)) => stats::format_thousands(*v),
        ExecValue::Table(table) => {
            let limited = table.head(Some(MAX_RECORDS_IN_PROMPT));
            let names = limited.get_column_names();
            let mut records = Vec::new();
            for row_idx in 0..limited.height() {
                let mut fields = Vec::new();
                for name in &names {
                    let rendered = limited
                        .column(name)
                        .and_then(|s| s.get(row_idx))
                        .map(|av| match av.try_extract::<f64>() {
                            Ok(v) => stats::format_thousands(v),
                            Err(_) => stats::any_value_to_display(&av),
                        })
                        .unwrap_or_else(|_| "null".to_string());
                    fields.push(format!("{}: {}", name, rendered));
                }
                records.push(format!("{{{}}}", fields.join(", ")));
            }
            format!("[{}]", records.join(", "))
        }
    }
}
