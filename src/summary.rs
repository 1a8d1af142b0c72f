//! Narrative summarizer
//!
//! Assembles dataset statistics, proactive signals and recent session
//! context into one prompt and asks the LLM for a fixed four-section
//! executive summary. Short outputs get exactly one expand-and-retry; the
//! final text is persisted to a timestamped file as a side effect.

use crate::error::Result;
use crate::llm::LlmClient;
use crate::memory::{render_records, SessionLog};
use crate::schema;
use crate::signals;
use crate::stats;
use chrono::Local;
use lazy_static::lazy_static;
use polars::prelude::*;
use std::path::PathBuf;
use tracing::{info, warn};

const MIN_SUMMARY_LEN: usize = 100;
const SUMMARY_MAX_TOKENS: u32 = 900;
const RECENT_SESSIONS: usize = 3;
const TOP_CATEGORICAL_COLUMNS: usize = 3;

lazy_static! {
    /// Domain keyword table, evaluated in fixed order so ties resolve
    /// deterministically.
    static ref DOMAIN_KEYWORDS: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("finance", vec!["revenue", "profit", "cost", "margin"]),
        ("marketing", vec!["campaign", "click", "conversion", "impression"]),
        ("healthcare", vec!["patient", "diagnosis", "treatment", "medication"]),
        ("retail", vec!["product", "sales", "inventory", "price"]),
        ("hr", vec!["employee", "attrition", "satisfaction", "department"]),
    ];
}

/// Infer a domain label by counting keyword hits across column names.
pub fn infer_domain(df: &DataFrame) -> String {
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|c| c.to_lowercase())
        .collect();

    let mut best = ("general", 0usize);
    for (domain, keywords) in DOMAIN_KEYWORDS.iter() {
        let score = keywords
            .iter()
            .filter(|kw| columns.iter().any(|c| c.contains(*kw)))
            .count();
        if score > best.1 {
            best = (*domain, score);
        }
    }
    best.0.to_string()
}

pub fn persona_for(domain: &str) -> &'static str {
    match domain {
        "finance" => "You are a senior financial analyst at a Fortune 500 firm.",
        "marketing" => "You are a senior marketing analyst specializing in ROI and performance campaigns.",
        "healthcare" => "You are a healthcare data analyst helping improve clinical outcomes.",
        "retail" => "You are a retail business analyst focused on inventory, sales, and demand trends.",
        "hr" => "You are an HR data specialist tracking performance, satisfaction, and retention.",
        _ => "You are a business analyst generating insights for strategic decisions.",
    }
}

/// Render the statistics block embedded in the summary prompt: shape,
/// column types, missing values, numeric key stats and top categories.
pub fn format_stats_block(df: &DataFrame) -> Result<String> {
    let mut lines = vec![format!("Total Rows: {}", df.height()), String::new()];

    lines.push("Column Types:".to_string());
    for name in df.get_column_names() {
        lines.push(format!(" - {}: {}", name, df.column(name)?.dtype()));
    }

    let mut missing_lines = Vec::new();
    for name in df.get_column_names() {
        let count = df.column(name)?.null_count();
        if count > 0 {
            let pct = count as f64 / df.height().max(1) as f64 * 100.0;
            missing_lines.push(format!("  - {}: {} ({:.1}%)", name, count, pct));
        }
    }
    if missing_lines.is_empty() {
        lines.push("\nNo Missing Values".to_string());
    } else {
        lines.push("\nMissing Values:".to_string());
        lines.extend(missing_lines);
    }

    let mut stat_lines = Vec::new();
    for name in df.get_column_names() {
        let series = df.column(name)?;
        if !stats::is_numeric(series) {
            continue;
        }
        let values = stats::numeric_values(series)?;
        if values.is_empty() {
            continue;
        }
        stat_lines.push(format!(
            "- {}: Mean={:.2}, Std={:.2}, Min={:.2}, Max={:.2}",
            name,
            stats::mean(&values).unwrap_or(0.0),
            stats::std_dev(&values).unwrap_or(0.0),
            stats::min(&values).unwrap_or(0.0),
            stats::max(&values).unwrap_or(0.0),
        ));
    }
    if stat_lines.is_empty() {
        lines.push("\nNo numeric columns found.".to_string());
    } else {
        lines.push("\nKey Stats:".to_string());
        lines.extend(stat_lines);
    }

    let mut category_lines = Vec::new();
    for name in df.get_column_names() {
        if category_lines.len() >= TOP_CATEGORICAL_COLUMNS {
            break;
        }
        let series = df.column(name)?;
        if series.dtype() != &DataType::String {
            continue;
        }
        let top = stats::top_value_counts(series, 5)?;
        let rendered = top
            .iter()
            .map(|(v, c)| format!("{}: {}", v, c))
            .collect::<Vec<_>>()
            .join(", ");
        category_lines.push(format!("  {} -> {}", name, rendered));
    }
    if !category_lines.is_empty() {
        lines.push("\nTop Categories:".to_string());
        lines.extend(category_lines);
    }

    Ok(lines.join("\n"))
}

/// Narrative summary generator.
pub struct Summarizer {
    llm: LlmClient,
    memory: SessionLog,
    output_dir: PathBuf,
}

impl Summarizer {
    pub fn new(llm: LlmClient, memory: SessionLog, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            llm,
            memory,
            output_dir: output_dir.into(),
        }
    }

    fn build_prompt(&self, df: &DataFrame, domain: &str) -> Result<String> {
        let memory_snippet = render_records(&self.memory.recent(RECENT_SESSIONS));
        Ok(format!(
            r#"{persona}

You are preparing a business intelligence summary for executives.
Write the output in exactly **4 sections** with the following structure and rules:

**1. Top 3 KPIs to Monitor**
- Each KPI must have: Name, Value (with units), and why it matters ("So What?") in 1 sentence.
- Avoid repeating the same KPI in Trends.
- Thresholds must be in plain English, no formulas.

**2. Key Trends or Anomalies**
- Describe 3-4 major patterns, changes, or unusual points in the data.
- Use numbers sparingly and only when they add impact.
- No KPI repetition.

**3. Reasoning Process**
- Briefly describe how you identified the KPIs and trends (1-2 sentences).
- Mention the analysis approach (e.g., correlations, comparisons, grouping).

**4. Recommended Actions**
- 3-5 specific, actionable steps directly tied to KPIs/trends.
- Include measurable targets where possible.
- Keep them in parallel, action-oriented format.

---

Context from past sessions:
{memory}

Dataset Summary:
{stats}

Proactive Alerts:
{alerts}

Now, generate the output strictly following the above structure."#,
            persona = persona_for(domain),
            memory = memory_snippet,
            stats = format_stats_block(df)?,
            alerts = signals::signals_text(df)?,
        ))
    }

    /// Generate the four-section summary for a dataset.
    ///
    /// Failures of the LLM call are absorbed into the returned text, so the
    /// caller's stage sequence never aborts on a dead endpoint.
    pub async fn generate(&self, df: &DataFrame, domain: &str) -> Result<String> {
        if df.height() == 0 {
            return Ok("Dataset is empty; nothing to summarize.".to_string());
        }

        let domain = if domain == "auto" {
            let inferred = infer_domain(df);
            info!(domain = %inferred, "Auto-detected domain");
            inferred
        } else {
            domain.to_string()
        };

        let mut prompt = self.build_prompt(df, &domain)?;
        let output = self.llm.complete_or_error_text(&prompt, SUMMARY_MAX_TOKENS).await;
        let mut final_output = trim_to_summary(&output);

        if final_output.len() < MIN_SUMMARY_LEN {
            warn!(len = final_output.len(), "Summary too short, retrying once");
            prompt.push_str("\nPlease expand with more detailed KPIs, trends, and actions.");
            let retry = self.llm.complete_or_error_text(&prompt, SUMMARY_MAX_TOKENS).await;
            final_output = trim_to_summary(&retry);
        }

        self.persist(&final_output)?;
        Ok(final_output)
    }

    /// One-shot summary regeneration from user feedback.
    pub async fn regenerate_with_feedback(
        &self,
        df: &DataFrame,
        original: &str,
        feedback: &str,
    ) -> String {
        let schema_block = match schema::summarize_schema(df) {
            Ok(s) => s,
            Err(e) => format!("(schema unavailable: {})", e),
        };
        let prompt = format!(
            r#"You are a business analyst AI. You previously generated the following insight summary:

--- Original Summary ---
{original}
------------------------

Now the user gave you this feedback:
"{feedback}"

Using this feedback and the dataset below, regenerate an improved summary.

{schema}

Improved Summary:"#,
            original = original,
            feedback = feedback,
            schema = schema_block,
        );
        self.llm.complete_or_error_text(&prompt, SUMMARY_MAX_TOKENS).await
    }

    /// Natural-language digest of the proactive signals.
    pub async fn alert_summary(&self, signal_text: &str, df_shape: (usize, usize)) -> String {
        if signal_text.trim().is_empty() || signal_text == signals::NO_SIGNALS_TEXT {
            return "No significant anomalies or issues detected in the dataset.".to_string();
        }
        let prompt = format!(
            r#"You are a business analyst. Write a concise alert summary (2-4 bullet points max) based on the anomalies below.

Dataset shape: {rows} rows x {cols} columns

Detected anomalies or signals:
{signals}

Focus on what changed, why it matters, and suggest 1 next step if applicable.
Format: clean bullet points or a short paragraph."#,
            rows = df_shape.0,
            cols = df_shape.1,
            signals = signal_text,
        );
        self.llm.complete_or_error_text(&prompt, 400).await
    }

    fn persist(&self, text: &str) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        let timestamp = Local::now().format("%Y-%m-%d_%H%M");
        let path = self.output_dir.join(format!("insight_summary_{}.txt", timestamp));
        std::fs::write(&path, text)?;
        info!(path = %path.display(), "Summary saved");
        Ok(())
    }
}

/// Some models echo a "summary:" lead-in; keep only what follows it.
fn trim_to_summary(output: &str) -> String {
    let lower = output.to_lowercase();
    if let Some(idx) = lower.rfind("summary:") {
        // Byte offsets line up only for ASCII; fall back to the whole text
        // if lowercasing shifted anything.
        if let Some(tail) = output.get(idx + "summary:".len()..) {
            return tail.trim().to_string();
        }
    }
    output.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedBackend;
    use std::sync::Arc;

    const FOUR_SECTIONS: &str = "**1. Top 3 KPIs to Monitor**\nKPI details here with plenty of text to pass the length check.\n**2. Key Trends or Anomalies**\nTrends here.\n**3. Reasoning Process**\nReasoning here.\n**4. Recommended Actions**\nActions here.";

    fn summarizer_with(responses: Vec<&str>) -> (tempfile::TempDir, Summarizer, Arc<ScriptedBackend>) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(responses));
        let llm = LlmClient::with_backend(backend.clone());
        let memory = SessionLog::new(dir.path().join("memory.json"));
        let summarizer = Summarizer::new(llm, memory, dir.path().join("outputs"));
        (dir, summarizer, backend)
    }

    fn sample_frame() -> DataFrame {
        df![
            "revenue" => [100.0, 200.0, 300.0, 400.0],
            "region" => ["w", "e", "w", "n"],
        ]
        .unwrap()
    }

    #[test]
    fn test_infer_domain_finance() {
        let df = df![
            "revenue" => [1.0],
            "profit" => [1.0],
            "cost" => [1.0],
        ]
        .unwrap();
        assert_eq!(infer_domain(&df), "finance");
    }

    #[test]
    fn test_infer_domain_defaults_to_general() {
        let df = df!["alpha" => [1.0], "beta" => [2.0]].unwrap();
        assert_eq!(infer_domain(&df), "general");
    }

    #[test]
    fn test_stats_block_mentions_columns() {
        let block = format_stats_block(&sample_frame()).unwrap();
        assert!(block.contains("Total Rows: 4"));
        assert!(block.contains("revenue: Mean="));
        assert!(block.contains("Top Categories:"));
    }

    #[tokio::test]
    async fn test_generate_is_idempotent_with_stubbed_llm() {
        let (_dir, summarizer, _) = summarizer_with(vec![FOUR_SECTIONS, FOUR_SECTIONS]);
        let df = sample_frame();
        let first = summarizer.generate(&df, "auto").await.unwrap();
        let second = summarizer.generate(&df, "auto").await.unwrap();
        assert_eq!(first, second);

        // Structural check: all four headers, in order.
        let positions: Vec<usize> = ["**1.", "**2.", "**3.", "**4."]
            .iter()
            .map(|h| first.find(h).expect("section header missing"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_short_output_retries_once() {
        let (_dir, summarizer, backend) = summarizer_with(vec!["too short", FOUR_SECTIONS]);
        let result = summarizer.generate(&sample_frame(), "general").await.unwrap();
        assert_eq!(backend.call_count(), 2);
        assert!(result.contains("**4. Recommended Actions**"));
    }

    #[tokio::test]
    async fn test_empty_frame_short_circuits() {
        let (_dir, summarizer, backend) = summarizer_with(vec![]);
        let result = summarizer.generate(&DataFrame::empty(), "auto").await.unwrap();
        assert!(result.contains("empty"));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_alert_summary_short_circuits_on_all_clear() {
        let (_dir, summarizer, backend) = summarizer_with(vec![]);
        let text = summarizer
            .alert_summary(signals::NO_SIGNALS_TEXT, (10, 2))
            .await;
        assert!(text.contains("No significant anomalies"));
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_trim_to_summary() {
        assert_eq!(trim_to_summary("Improved Summary: better text"), "better text");
        assert_eq!(trim_to_summary("plain text"), "plain text");
    }
}
