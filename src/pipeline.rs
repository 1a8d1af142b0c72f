//! Pipeline wiring
//!
//! Builds the concrete components out of the config and drives them: the
//! fixed-order agent loop, the keyword-planned goal pipeline, and the
//! unattended run used by the folder watcher. This is the only module that
//! knows how everything fits together; the components themselves stay
//! independent.

use crate::agent_loop::{AgentLoop, SessionContext, Stage, StageExecutor};
use crate::charts;
use crate::config::AppConfig;
use crate::eda;
use crate::error::Result;
use crate::kpi;
use crate::llm::LlmClient;
use crate::memory::{SessionLog, SessionRecord};
use crate::planner::{self, Step};
use crate::qa::QaAgent;
use crate::signals;
use crate::summary::Summarizer;
use async_trait::async_trait;
use polars::prelude::DataFrame;
use std::path::PathBuf;
use tracing::info;

pub struct AnalysisPipeline {
    llm: LlmClient,
    memory: SessionLog,
    output_dir: PathBuf,
    max_result_rows: usize,
    exec_timeout_secs: u64,
}

impl AnalysisPipeline {
    pub fn new(config: &AppConfig, llm: LlmClient) -> Self {
        Self {
            llm,
            memory: SessionLog::new(&config.memory_path),
            output_dir: config.output_dir.clone(),
            max_result_rows: config.max_result_rows,
            exec_timeout_secs: config.exec_timeout_secs,
        }
    }

    pub fn memory(&self) -> &SessionLog {
        &self.memory
    }

    pub fn summarizer(&self) -> Summarizer {
        Summarizer::new(self.llm.clone(), self.memory.clone(), &self.output_dir)
    }

    pub fn qa_agent(&self) -> QaAgent {
        QaAgent::new(self.llm.clone(), self.max_result_rows, self.exec_timeout_secs)
    }

    /// Run the full fixed-order stage loop over a dataset.
    pub async fn run_agent_loop(&self, df: &DataFrame, goal: &str) -> SessionContext {
        let mut ctx = SessionContext::new(goal, df.shape());
        let executor = DatasetStageExecutor { pipeline: self, df };
        let agent_loop = AgentLoop::new(self.memory.clone());
        agent_loop.run(&executor, &mut ctx).await;
        ctx
    }

    /// Run only the steps a free-text goal implies and assemble a report.
    pub async fn run_goal_pipeline(
        &self,
        df: &DataFrame,
        goal: &str,
        user_feedback: Option<&str>,
    ) -> Result<String> {
        let steps = planner::parse_goal(goal);
        info!(goal = goal, steps = ?steps, "Goal pipeline planned");

        let mut results = vec![
            "# Goal-Based Analysis Report".to_string(),
            format!("Goal: {}", goal),
        ];
        let mut completed = Vec::new();
        let mut feedback = Vec::new();

        for step in steps {
            let outcome: Result<()> = match step {
                Step::Eda => eda::perform_eda(df).map(|report| {
                    results.push(format!(
                        "## EDA\n{}",
                        report.observations.join("\n")
                    ));
                }),
                Step::Kpi => kpi::extract_kpis(df).map(|report| {
                    results.push("## KPI Summary".to_string());
                    for column in &report.kpis {
                        let stats_line = column
                            .stats
                            .iter()
                            .map(|(k, v)| format!("{} = {}", k, v))
                            .collect::<Vec<_>>()
                            .join(", ");
                        results.push(format!("- {}: {}", column.column, stats_line));
                        for insight in &column.insights {
                            results.push(format!("  {}", insight));
                        }
                    }
                }),
                Step::Charts => charts::plan_charts(df).and_then(|(specs, summaries)| {
                    let chart_dir = self.output_dir.join("charts");
                    charts::save_chart_specs(&chart_dir, &specs)?;
                    results.push(format!(
                        "## Charts\n{} chart(s) planned and saved to `{}`.\n{}",
                        specs.len(),
                        chart_dir.display(),
                        summaries.join("\n")
                    ));
                    Ok(())
                }),
                Step::Summary => match self.summarizer().generate(df, "auto").await {
                    Ok(text) => {
                        results.push(format!("## Insight Summary\n{}", text));
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                Step::Qa => {
                    let response = self.qa_agent().ask(df, goal).await;
                    results.push(format!(
                        "## Q&A\n- Answer: {}\n- Code:\n```\n{}\n```\n- Result preview:\n{}",
                        response.answer, response.code, response.result
                    ));
                    Ok(())
                }
            };

            match outcome {
                Ok(()) => completed.push(step.name().to_string()),
                Err(e) => feedback.push(format!("{} failed: {}", step.name(), e)),
            }
        }

        if let Some(user_feedback) = user_feedback {
            feedback.push(format!("User said: {}", user_feedback));
        }

        let mut record = SessionRecord::new(goal, df.shape());
        record.completed_stages = completed;
        record.feedback_log = feedback;
        self.memory.append(record)?;

        let report = results.join("\n\n");
        std::fs::create_dir_all(&self.output_dir)?;
        let report_path = self.output_dir.join("final_goal_report.txt");
        std::fs::write(&report_path, &report)?;
        info!(path = %report_path.display(), "Goal report saved");

        Ok(report)
    }

    /// Unattended run used by the folder watcher: statistics, charts,
    /// summary and an alert digest, with every failure absorbed into the
    /// session feedback.
    pub async fn run_auto(&self, df: &DataFrame, source_name: &str) {
        info!(source = source_name, "Running unattended analysis");
        let goal = format!("auto ({})", source_name);
        let ctx = self.run_agent_loop(df, &goal).await;

        if let Ok(signal_text) = signals::signals_text(df) {
            let alerts = self.summarizer().alert_summary(&signal_text, df.shape()).await;
            info!(alerts = %alerts, "Alert digest");
        }

        info!(
            stages = ctx.completed_stages.len(),
            failures = ctx.feedback_log.len(),
            "Unattended analysis finished"
        );
    }
}

/// Stage executor backed by the real components.
struct DatasetStageExecutor<'a> {
    pipeline: &'a AnalysisPipeline,
    df: &'a DataFrame,
}

#[async_trait]
impl<'a> StageExecutor for DatasetStageExecutor<'a> {
    async fn run_stage(&self, stage: Stage, ctx: &mut SessionContext) -> Result<String> {
        match stage {
            Stage::Eda => {
                let report = eda::perform_eda(self.df)?;
                let note = format!("{} observation(s)", report.observations.len());
                ctx.eda = Some(report);
                Ok(note)
            }
            Stage::KpiExtraction => {
                let report = kpi::extract_kpis(self.df)?;
                let note = format!("{} numeric column(s)", report.kpis.len());
                ctx.kpis = Some(report);
                Ok(note)
            }
            Stage::Charting => {
                let (specs, _summaries) = charts::plan_charts(self.df)?;
                charts::save_chart_specs(&self.pipeline.output_dir.join("charts"), &specs)?;
                let note = format!("{} chart(s) planned", specs.len());
                ctx.charts = Some(specs);
                Ok(note)
            }
            Stage::Summary => {
                let text = self.pipeline.summarizer().generate(self.df, "auto").await?;
                ctx.summary = Some(text);
                Ok("summary generated".to_string())
            }
            Stage::Qna => {
                ctx.qna_note = Some("Q&A runs interactively outside the stage loop.".to_string());
                Ok("interactive stage".to_string())
            }
            Stage::Start | Stage::Done => Ok("no-op".to_string()),
        }
    }
}
