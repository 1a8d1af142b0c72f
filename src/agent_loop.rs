//! Agent loop
//!
//! A fixed-order state machine driving the analysis stages. The transition
//! table is total: every stage runs exactly once, errors are caught and
//! recorded as feedback but still count as stage completion, and one
//! session record is appended per state. There is no branching, retry or
//! skip logic.

use crate::error::Result;
use crate::memory::{SessionLog, SessionRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    Eda,
    KpiExtraction,
    Charting,
    Summary,
    Qna,
    Done,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Eda => "eda",
            Stage::KpiExtraction => "kpi_extraction",
            Stage::Charting => "charting",
            Stage::Summary => "summary",
            Stage::Qna => "qna",
            Stage::Done => "done",
        }
    }

    /// The fixed transition table.
    pub fn next(&self) -> Stage {
        match self {
            Stage::Start => Stage::Eda,
            Stage::Eda => Stage::KpiExtraction,
            Stage::KpiExtraction => Stage::Charting,
            Stage::Charting => Stage::Summary,
            Stage::Summary => Stage::Qna,
            Stage::Qna => Stage::Done,
            Stage::Done => Stage::Done,
        }
    }
}

/// Mutable context carried through one loop run. Stage outputs live in
/// typed optional fields rather than an ad hoc shared map, so each stage's
/// contract with the next is visible in the type.
#[derive(Debug, Default)]
pub struct SessionContext {
    pub goal: String,
    pub df_shape: (usize, usize),
    pub completed_stages: Vec<String>,
    pub feedback_log: Vec<String>,

    pub eda: Option<crate::eda::EdaReport>,
    pub kpis: Option<crate::kpi::KpiReport>,
    pub charts: Option<Vec<crate::charts::ChartSpec>>,
    pub summary: Option<String>,
    pub qna_note: Option<String>,
}

impl SessionContext {
    pub fn new(goal: impl Into<String>, df_shape: (usize, usize)) -> Self {
        Self {
            goal: goal.into(),
            df_shape,
            ..Default::default()
        }
    }

    fn to_record(&self) -> SessionRecord {
        let mut record = SessionRecord::new(self.goal.clone(), self.df_shape);
        record.completed_stages = self.completed_stages.clone();
        record.feedback_log = self.feedback_log.clone();
        record
    }
}

/// Seam between the loop and the components it drives; mocked in tests.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Run one stage, filling the context. The returned string is a short
    /// status note for logs.
    async fn run_stage(&self, stage: Stage, ctx: &mut SessionContext) -> Result<String>;
}

pub struct AgentLoop {
    memory: SessionLog,
}

impl AgentLoop {
    pub fn new(memory: SessionLog) -> Self {
        Self { memory }
    }

    /// Drive the context through every stage until `done`.
    ///
    /// Stage errors are absorbed: the failure is pushed onto the feedback
    /// log, the stage is still marked completed, and the table advances.
    pub async fn run(&self, executor: &dyn StageExecutor, ctx: &mut SessionContext) -> Stage {
        let mut stage = Stage::Start;

        while stage != Stage::Done {
            if stage != Stage::Start {
                info!(stage = stage.name(), "Running stage");
                match executor.run_stage(stage, ctx).await {
                    Ok(note) => info!(stage = stage.name(), note = %note, "Stage completed"),
                    Err(e) => {
                        warn!(stage = stage.name(), error = %e, "Stage failed");
                        ctx.feedback_log.push(format!("{} failed: {}", stage.name(), e));
                    }
                }
                ctx.completed_stages.push(stage.name().to_string());
            }

            stage = stage.next();

            if let Err(e) = self.memory.append(ctx.to_record()) {
                warn!(error = %e, "Could not persist session record");
            }
        }

        info!(stages = ?ctx.completed_stages, "Agent loop finished");
        stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InsightError;

    struct FailingExecutor;

    #[async_trait]
    impl StageExecutor for FailingExecutor {
        async fn run_stage(&self, _stage: Stage, _ctx: &mut SessionContext) -> Result<String> {
            Err(InsightError::Execution("boom".to_string()))
        }
    }

    struct RecordingExecutor;

    #[async_trait]
    impl StageExecutor for RecordingExecutor {
        async fn run_stage(&self, stage: Stage, ctx: &mut SessionContext) -> Result<String> {
            if stage == Stage::Summary {
                ctx.summary = Some("four sections".to_string());
            }
            Ok(format!("{} ok", stage.name()))
        }
    }

    #[test]
    fn test_transition_table_is_total_and_fixed() {
        let mut stage = Stage::Start;
        let mut visited = vec![stage];
        for _ in 0..10 {
            stage = stage.next();
            visited.push(stage);
            if stage == Stage::Done {
                break;
            }
        }
        assert_eq!(
            visited,
            vec![
                Stage::Start,
                Stage::Eda,
                Stage::KpiExtraction,
                Stage::Charting,
                Stage::Summary,
                Stage::Qna,
                Stage::Done,
            ]
        );
        assert_eq!(Stage::Done.next(), Stage::Done);
    }

    #[tokio::test]
    async fn test_errors_never_halt_the_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let memory = SessionLog::new(dir.path().join("log.json"));
        let agent_loop = AgentLoop::new(memory.clone());
        let mut ctx = SessionContext::new("auto", (10, 3));

        let final_stage = agent_loop.run(&FailingExecutor, &mut ctx).await;

        assert_eq!(final_stage, Stage::Done);
        assert_eq!(
            ctx.completed_stages,
            vec!["eda", "kpi_extraction", "charting", "summary", "qna"]
        );
        // Every stage failure was recorded as feedback.
        assert_eq!(ctx.feedback_log.len(), 5);
        // One session record per non-terminal state.
        assert_eq!(memory.load().len(), 6);
    }

    #[tokio::test]
    async fn test_successful_run_collects_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let memory = SessionLog::new(dir.path().join("log.json"));
        let agent_loop = AgentLoop::new(memory);
        let mut ctx = SessionContext::new("auto", (5, 2));

        agent_loop.run(&RecordingExecutor, &mut ctx).await;

        assert!(ctx.feedback_log.is_empty());
        assert_eq!(ctx.summary.as_deref(), Some("four sections"));
        assert_eq!(ctx.completed_stages.len(), 5);
    }
}
