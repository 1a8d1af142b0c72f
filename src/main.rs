use anyhow::Result;
use clap::{Parser, Subcommand};
use insight_engine::config::{AppConfig, ModelMode};
use insight_engine::ingest;
use insight_engine::llm::LlmClient;
use insight_engine::notify;
use insight_engine::pipeline::AnalysisPipeline;
use insight_engine::planner::{self, QuestionRoute};
use insight_engine::retrieval::embedder::{Embedder, HashEmbedder, HttpEmbedder};
use insight_engine::retrieval::index::RowIndex;
use insight_engine::retrieval::RetrievalAgent;
use insight_engine::signals;
use insight_engine::watch::FolderWatcher;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "insight-engine")]
#[command(about = "LLM-assisted analysis engine for tabular datasets")]
struct Cli {
    /// LLM endpoint family: "cloud" or "local"
    #[arg(long, global = true, default_value = "cloud")]
    mode: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run selected analysis steps over a dataset
    Analyze {
        /// Path or URL of a CSV/TSV/JSON/spreadsheet file
        file: String,
        #[arg(long)]
        eda: bool,
        #[arg(long)]
        kpi: bool,
        #[arg(long)]
        charts: bool,
        #[arg(long)]
        summary: bool,
        /// Run every step in sequence
        #[arg(long)]
        all: bool,
        /// Domain context (finance, marketing, ... or "auto")
        #[arg(long, default_value = "auto")]
        domain: String,
    },
    /// Run the full autonomous stage loop
    Agent {
        file: String,
        #[arg(long, default_value = "auto")]
        goal: String,
    },
    /// Run the steps implied by a free-text goal and write a report
    Goal {
        file: String,
        goal: String,
    },
    /// Answer a question against the dataset (routed automatically)
    Ask {
        file: String,
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Build and persist the row embedding index for a dataset
    Index {
        file: String,
    },
    /// Show proactive signals and their alert digest
    Alerts {
        file: String,
    },
    /// Watch a folder and re-run the pipeline on new files
    Watch {
        #[arg(long)]
        dir: Option<std::path::PathBuf>,
    },
    /// Send a message to the configured webhook
    Notify {
        title: String,
        message: String,
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mode: ModelMode = cli.mode.parse()?;
    let config = AppConfig::from_env(mode);
    let llm = LlmClient::from_config(&config);
    info!(llm = %llm.describe(), "insight-engine starting");

    match cli.command {
        Command::Analyze {
            file,
            eda,
            kpi,
            charts,
            summary,
            all,
            domain,
        } => {
            let df = ingest::load_dataset(&file).await?;
            println!("{}", df.head(Some(5)));

            if all || eda {
                let report = insight_engine::eda::perform_eda(&df)?;
                println!("\n== EDA ==");
                for observation in &report.observations {
                    println!("{}", observation);
                }
            }
            if all || kpi {
                let report = insight_engine::kpi::extract_kpis(&df)?;
                println!("\n== KPIs ==");
                for column in &report.kpis {
                    println!("{}:", column.column);
                    for (stat, value) in &column.stats {
                        println!("  {} = {}", stat, value);
                    }
                    for insight in &column.insights {
                        println!("  {}", insight);
                    }
                }
            }
            if all || charts {
                let (specs, summaries) = insight_engine::charts::plan_charts(&df)?;
                let chart_dir = config.output_dir.join("charts");
                insight_engine::charts::save_chart_specs(&chart_dir, &specs)?;
                println!("\n== Charts ==");
                println!("{} chart spec(s) saved to {}", specs.len(), chart_dir.display());
                for line in &summaries {
                    println!("- {}", line);
                }
            }
            if all || summary {
                let pipeline = AnalysisPipeline::new(&config, llm.clone());
                let text = pipeline.summarizer().generate(&df, &domain).await?;
                println!("\n== Insight Summary ==\n{}", text);
            }
        }

        Command::Agent { file, goal } => {
            let df = ingest::load_dataset(&file).await?;
            let pipeline = AnalysisPipeline::new(&config, llm.clone());
            let ctx = pipeline.run_agent_loop(&df, &goal).await;
            println!("Completed stages: {}", ctx.completed_stages.join(", "));
            if let Some(summary) = ctx.summary {
                println!("\n{}", summary);
            }
            if !ctx.feedback_log.is_empty() {
                println!("\nStage issues:");
                for line in &ctx.feedback_log {
                    println!("- {}", line);
                }
            }
        }

        Command::Goal { file, goal } => {
            let df = ingest::load_dataset(&file).await?;
            let pipeline = AnalysisPipeline::new(&config, llm.clone());
            let report = pipeline.run_goal_pipeline(&df, &goal, None).await?;
            println!("{}", report);
        }

        Command::Ask { file, question, top_k } => {
            let df = ingest::load_dataset(&file).await?;
            let top_k = top_k.unwrap_or(config.top_k);

            match planner::route_question(&question) {
                QuestionRoute::Retrieval => {
                    let embedder = build_embedder(&config);
                    let index = match RowIndex::load(&config.index_dir) {
                        Ok(index) => index,
                        Err(_) => {
                            info!("No saved index found, building one");
                            let index = RowIndex::build(&df, embedder.as_ref()).await?;
                            index.save(&config.index_dir)?;
                            index
                        }
                    };
                    let agent = RetrievalAgent::new(llm.clone());
                    let response = agent.ask(&index, embedder.as_ref(), &question, top_k).await;
                    println!("Answer: {}", response.answer);
                    println!("\nExplanation: {}", response.explanation);
                    println!("\nReasoning: {}", response.reasoning);
                    if !response.context_rows.is_empty() {
                        println!("\nContext rows:");
                        for row in &response.context_rows {
                            println!("- {}", row);
                        }
                    }
                }
                QuestionRoute::CodeGen => {
                    let pipeline = AnalysisPipeline::new(&config, llm.clone());
                    let response = pipeline.qa_agent().ask(&df, &question).await;
                    println!("Answer: {}", response.answer);
                    println!("\nCode:\n{}", response.code);
                    println!("\nResult:\n{}", response.result);
                    println!("\nExplanation: {}", response.explanation);
                    println!("\nReasoning: {}", response.reasoning);
                    if let Some(chart) = response.chart {
                        println!("\nChart suggestion: {}", chart.title);
                    }
                }
            }
        }

        Command::Index { file } => {
            let df = ingest::load_dataset(&file).await?;
            let embedder = build_embedder(&config);
            let index = RowIndex::build(&df, embedder.as_ref()).await?;
            index.save(&config.index_dir)?;
            println!(
                "Indexed {} rows into {}",
                index.len(),
                config.index_dir.display()
            );
        }

        Command::Alerts { file } => {
            let df = ingest::load_dataset(&file).await?;
            let signal_text = signals::signals_text(&df)?;
            println!("== Signals ==\n{}", signal_text);
            let pipeline = AnalysisPipeline::new(&config, llm.clone());
            let digest = pipeline.summarizer().alert_summary(&signal_text, df.shape()).await;
            println!("\n== Alert digest ==\n{}", digest);
        }

        Command::Watch { dir } => {
            let watch_dir = dir.unwrap_or_else(|| config.watch_dir.clone());
            let pipeline = Arc::new(AnalysisPipeline::new(&config, llm.clone()));
            let watcher = FolderWatcher::new();
            let status = watcher.start(
                watch_dir,
                std::time::Duration::from_secs(config.watch_interval_secs),
                move |df, name| {
                    let pipeline = pipeline.clone();
                    async move {
                        pipeline.run_auto(&df, &name).await;
                    }
                },
            );
            println!("{}", status);
            // Keep the process alive while the watcher polls.
            tokio::signal::ctrl_c().await?;
            watcher.stop();
        }

        Command::Notify { title, message, url } => {
            let target = url
                .or_else(|| config.webhook_url.clone())
                .unwrap_or_default();
            let status = notify::send_webhook(&target, &title, &message).await;
            println!("{}", status);
        }
    }

    Ok(())
}

/// Pick the embeddings backend: the HTTP embedder when credentials are
/// configured, the deterministic hashing embedder otherwise.
fn build_embedder(config: &AppConfig) -> Arc<dyn Embedder> {
    match (&config.api_key, config.mode) {
        (Some(key), ModelMode::Cloud) => Arc::new(HttpEmbedder::new(
            config.cloud_base_url.clone(),
            config.embedding_model.clone(),
            Some(key.clone()),
            1536,
        )),
        _ => Arc::new(HashEmbedder::default()),
    }
}
