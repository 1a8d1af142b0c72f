//! Goal planning and question routing
//!
//! Keyword heuristics that decide which analysis steps a free-text goal
//! implies, and whether a question should go through row retrieval or
//! generated-code execution.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Eda,
    Kpi,
    Charts,
    Summary,
    Qa,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Eda => "eda",
            Step::Kpi => "kpi",
            Step::Charts => "charts",
            Step::Summary => "summary",
            Step::Qa => "qa",
        }
    }
}

/// Parse a natural-language goal into an ordered list of analysis steps.
/// EDA always runs first and a summary is always produced; duplicates are
/// removed preserving first-seen order.
pub fn parse_goal(goal: &str) -> Vec<Step> {
    let goal = goal.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| goal.contains(w));

    let mut steps = Vec::new();
    if mentions(&["trend", "pattern", "insight", "distribution", "correlation"]) {
        steps.push(Step::Eda);
    }
    if mentions(&[
        "visual", "chart", "graph", "plot", "top", "compare", "versus", "vs", "distribution",
        "region", "category",
    ]) {
        steps.push(Step::Charts);
    }
    if mentions(&["summary", "report", "insight", "recommend", "action", "overview"]) {
        steps.push(Step::Summary);
    }
    if mentions(&["question", "how", "why", "what", "which", "does", "is", "can"]) {
        steps.push(Step::Qa);
    }
    if mentions(&[
        "top", "metric", "kpi", "measure", "growth", "performance", "revenue", "sales",
    ]) {
        steps.push(Step::Kpi);
    }

    if !steps.contains(&Step::Eda) {
        steps.insert(0, Step::Eda);
    }
    if !steps.contains(&Step::Summary) {
        steps.push(Step::Summary);
    }

    let mut deduped = Vec::new();
    for step in steps {
        if !deduped.contains(&step) {
            deduped.push(step);
        }
    }
    deduped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionRoute {
    /// Lookup-flavored question: nearest-neighbor retrieval over rows.
    Retrieval,
    /// Computation-flavored question: generated analysis code.
    CodeGen,
}

const NATURAL_KEYWORDS: &[&str] = &[
    "who", "when", "which", "show", "list", "customer", "order", "message", "chat", "complain",
    "comment", "email", "review",
];

/// Route a question to the retrieval agent when it reads like a lookup,
/// otherwise to the code-generation agent.
pub fn route_question(question: &str) -> QuestionRoute {
    let lower = question.to_lowercase();
    if NATURAL_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        QuestionRoute::Retrieval
    } else {
        QuestionRoute::CodeGen
    }
}
