use insight_engine::agent_loop::{AgentLoop, SessionContext, Stage, StageExecutor};
use insight_engine::config::{AppConfig, ModelMode};
use insight_engine::error::{InsightError, Result};
use insight_engine::llm::{LlmClient, ScriptedBackend};
use insight_engine::memory::SessionLog;
use insight_engine::qa::QaAgent;
use insight_engine::retrieval::embedder::{Embedder, HashEmbedder};
use insight_engine::retrieval::index::RowIndex;
use insight_engine::retrieval::{RetrievalAgent, NO_DATA_RESPONSE};
use insight_engine::signals;
use insight_engine::summary::Summarizer;
use polars::prelude::*;
use std::sync::Arc;

/// Sales dataset used across the scenarios: a unique integer key, a float
/// measure, and a four-level categorical.
fn sales_frame() -> DataFrame {
    df![
        "order_id" => [1i64, 2, 3, 4, 5, 6, 7, 8],
        "revenue" => [120.0, 80.0, 200.0, 310.0, 95.0, 150.0, 60.0, 400.0],
        "region" => ["west", "east", "north", "south", "west", "east", "north", "south"],
    ]
    .unwrap()
}

fn qa_agent_with(responses: Vec<&str>) -> (QaAgent, Arc<ScriptedBackend>) {
    let backend = Arc::new(ScriptedBackend::new(responses));
    let agent = QaAgent::new(LlmClient::with_backend(backend.clone()), 100, 5);
    (agent, backend)
}

// ---------------------------------------------------------------------------
// Scenario A: total revenue by region -> 4-row table, no execution error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_a_revenue_by_region() {
    let (agent, _) = qa_agent_with(vec![
        "```\nresult = df.group_by(\"region\").agg(sum(\"revenue\"))\n```",
        "Revenue is fairly even across the four regions.",
        "The code groups rows by region and sums revenue per group.",
        "- Step 1: group by region\n- Step 2: sum revenue",
    ]);

    let df = sales_frame();
    let response = agent.ask(&df, "what is total revenue by region").await;

    assert!(
        response.result.column("error").is_err(),
        "no execution error expected, got: {}",
        response.answer
    );
    assert_eq!(response.result.height(), 4);
    assert!(response.result.column("revenue_sum").is_ok());
    assert_eq!(response.answer, "Revenue is fairly even across the four regions.");
}

// ---------------------------------------------------------------------------
// Scenario B: constant column -> low-variance signal, no divide-by-zero
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_b_constant_column_is_safe() {
    let df = df![
        "constant" => [5.0, 5.0, 5.0, 5.0, 5.0, 5.0],
        "revenue" => [10.0, 20.0, 30.0, 40.0, 50.0, 60.0],
    ]
    .unwrap();

    let detected = signals::detect_signals(&df).unwrap();
    assert!(detected
        .iter()
        .any(|s| s.contains("Low-variance") && s.contains("constant")));

    // The EDA and KPI layers must survive the zero-spread column too.
    let report = insight_engine::eda::perform_eda(&df).unwrap();
    assert!(report.rows == 6);
    let kpis = insight_engine::kpi::extract_kpis(&df).unwrap();
    assert_eq!(kpis.kpis.len(), 2);
}

// ---------------------------------------------------------------------------
// Scenario C: system-access snippet is blocked before execution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_c_system_call_is_blocked() {
    let (agent, backend) = qa_agent_with(vec![
        "```python\nimport os\nresult = os.system(\"rm -rf /\")\n```",
    ]);

    let df = sales_frame();
    let response = agent.ask(&df, "clean up the data").await;

    assert!(response.answer.starts_with("Blocked"));
    assert!(response.chart.is_none());
    assert!(response.result.column("error").is_ok());
    // Only the generation call ran; execution and narration never happened.
    assert_eq!(backend.call_count(), 1);
    // The dataset is untouched.
    assert_eq!(df.shape(), (8, 3));
    let total: f64 = df
        .column("revenue")
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .flatten()
        .sum();
    assert!((total - 1415.0).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Retrieval: empty index short-circuits without any LLM call
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_index_never_calls_the_llm() {
    let backend = Arc::new(ScriptedBackend::new(vec!["unused"]));
    let agent = RetrievalAgent::new(LlmClient::with_backend(backend.clone()));
    let embedder = HashEmbedder::new(32);
    let index = RowIndex::empty(32);

    let response = agent.ask(&index, &embedder, "who bought the most", 5).await;

    assert_eq!(response.answer, NO_DATA_RESPONSE);
    assert_eq!(backend.call_count(), 0);
}

// ---------------------------------------------------------------------------
// Index round-trip: rebuilds keep vectors and metadata aligned
// ---------------------------------------------------------------------------

#[tokio::test]
async fn index_round_trip_alignment() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = HashEmbedder::new(64);
    let df = sales_frame();

    for _ in 0..2 {
        let index = RowIndex::build(&df, &embedder).await.unwrap();
        index.save(dir.path()).unwrap();
    }

    let reloaded = RowIndex::load(dir.path()).unwrap();
    assert_eq!(reloaded.metadata().len(), reloaded.vector_count());
    assert_eq!(reloaded.len(), df.height());

    // And retrieval over the reloaded index maps positions back to rows.
    let query = embedder
        .embed(&["region: south | revenue: 400".to_string()])
        .await
        .unwrap();
    let hits = reloaded.search(&query[0], 3);
    assert_eq!(hits.len(), 3);
    let texts = reloaded.texts_for(&hits);
    assert!(texts.iter().all(|t| t.contains("region:")));
}

// ---------------------------------------------------------------------------
// Identifier rule holds with and without true key columns
// ---------------------------------------------------------------------------

#[test]
fn identifier_rule_property() {
    let df = sales_frame();
    let detected = signals::detect_signals(&df).unwrap();
    let id_line = detected.iter().find(|s| s.contains("identifier")).unwrap();
    assert!(id_line.contains("order_id"));
    assert!(!id_line.contains("region"));

    let keyless = df![
        "region" => ["west", "east", "west", "east"],
        "tier" => ["gold", "gold", "silver", "silver"],
    ]
    .unwrap();
    let detected = signals::detect_signals(&keyless).unwrap();
    assert!(!detected.iter().any(|s| s.contains("identifier")));
}

// ---------------------------------------------------------------------------
// Summarizer idempotence under a stubbed LLM
// ---------------------------------------------------------------------------

#[tokio::test]
async fn summarizer_structure_is_stable() {
    const FIXED: &str = "**1. Top 3 KPIs to Monitor**\nRevenue is the headline metric and deserves a weekly check-in with the team.\n**2. Key Trends or Anomalies**\nSouth region is pulling ahead.\n**3. Reasoning Process**\nGrouped and compared totals.\n**4. Recommended Actions**\nDouble down on the south region.";

    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(ScriptedBackend::new(vec![FIXED, FIXED]));
    let summarizer = Summarizer::new(
        LlmClient::with_backend(backend),
        SessionLog::new(dir.path().join("memory.json")),
        dir.path().join("outputs"),
    );

    let df = sales_frame();
    let first = summarizer.generate(&df, "auto").await.unwrap();
    let second = summarizer.generate(&df, "auto").await.unwrap();

    assert_eq!(first, second);
    let headers = ["**1.", "**2.", "**3.", "**4."];
    let positions: Vec<usize> = headers
        .iter()
        .map(|h| first.find(h).expect("missing section"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

// ---------------------------------------------------------------------------
// Agent loop: a raising executor still drives the table to done
// ---------------------------------------------------------------------------

struct AlwaysRaising;

#[async_trait::async_trait]
impl StageExecutor for AlwaysRaising {
    async fn run_stage(&self, _stage: Stage, _ctx: &mut SessionContext) -> Result<String> {
        Err(InsightError::Execution("stage exploded".to_string()))
    }
}

#[tokio::test]
async fn agent_loop_survives_raising_stages() {
    let dir = tempfile::tempdir().unwrap();
    let memory = SessionLog::new(dir.path().join("log.json"));
    let agent_loop = AgentLoop::new(memory);
    let mut ctx = SessionContext::new("auto", (8, 3));

    let final_stage = agent_loop.run(&AlwaysRaising, &mut ctx).await;

    assert_eq!(final_stage, Stage::Done);
    assert_eq!(ctx.completed_stages.last().map(String::as_str), Some("qna"));
    assert_eq!(ctx.completed_stages.len(), 5);
}

// ---------------------------------------------------------------------------
// Config plumbing smoke test
// ---------------------------------------------------------------------------

#[test]
fn config_modes_resolve_endpoints() {
    let cloud = AppConfig::from_env(ModelMode::Cloud);
    let local = AppConfig::from_env(ModelMode::Local);
    assert_ne!(cloud.active_endpoint().0, local.active_endpoint().0);
}
