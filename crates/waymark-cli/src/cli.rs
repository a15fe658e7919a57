//! Command handlers.
//!
//! [`Cli`] owns the resolved configuration and the renderer; each handler
//! produces Markdown through the core display types and hands it to the
//! [`TerminalRenderer`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use waymark_core::{
    display::{AnalysisResults, RevertResult, ValidationResult},
    generation::{
        ApiKeyPool, GenerationRequest, NoopListener, OpenAiCompatibleGenerator, ResilientGenerator,
        TaskPool,
    },
    revert_change_set,
    workspace::LocalWorkspace,
    CancellationScope, ChangeHistory, ChangeSetSummaries, EngineBuilder, EngineConfig,
    ExecutionPlan, OperationStatus, RunOutcome, SqliteChangeHistory,
};

use crate::{
    args::{AnalyzeArgs, HistoryCommands, RunArgs},
    prompt::{TerminalInteraction, TerminalObserver},
    renderer::TerminalRenderer,
};

/// Exit status of a run that did not succeed.
pub const EXIT_RUN_FAILED: i32 = 1;
pub const EXIT_RUN_CANCELLED: i32 = 130;

const ANALYZE_SYSTEM_PROMPT: &str =
    "You review source files. Answer concisely in Markdown. Do not repeat the file back.";

pub struct Cli {
    config: EngineConfig,
    database_file: Option<PathBuf>,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(
        config: EngineConfig,
        database_file: Option<PathBuf>,
        renderer: TerminalRenderer,
    ) -> Self {
        Self {
            config,
            database_file,
            renderer,
        }
    }

    async fn history(&self) -> Result<SqliteChangeHistory> {
        SqliteChangeHistory::open(self.database_file.as_deref())
            .await
            .context("Failed to open change history")
    }

    /// Executes a plan and returns the process exit code.
    pub async fn run(&self, args: RunArgs) -> Result<i32> {
        let plan = load_plan(&args.plan).await?;
        let history = self.history().await?;
        let root = args
            .root
            .canonicalize()
            .with_context(|| format!("Workspace root {} not found", args.root.display()))?;

        let engine = EngineBuilder::new(&root)
            .with_config(self.config.clone())
            .with_history(Arc::new(history))
            .with_interaction(Arc::new(TerminalInteraction::stdin(args.yes)))
            .with_observer(Arc::new(TerminalObserver))
            .build()
            .context("Failed to initialize engine")?;

        let interrupt = CancellationToken::new();
        let ctrl_c = interrupt.clone();
        let signal_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling run");
                ctrl_c.cancel();
            }
        });

        let mut sources = vec![interrupt];
        let mut timers = vec![signal_task];
        if let Some(secs) = args.deadline_secs {
            let deadline = CancellationToken::new();
            let expire = deadline.clone();
            timers.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                warn!("Deadline of {secs}s reached; cancelling run");
                expire.cancel();
            }));
            sources.push(deadline);
        }
        let scope = CancellationScope::new(sources);

        let report = engine.execute(&plan, &scope).await;
        for timer in timers {
            timer.abort();
        }

        self.renderer.render(&report.to_string())?;
        Ok(match report.outcome {
            RunOutcome::Success => 0,
            RunOutcome::Cancelled => EXIT_RUN_CANCELLED,
            RunOutcome::Failed => EXIT_RUN_FAILED,
        })
    }

    pub async fn validate(&self, path: &Path) -> Result<i32> {
        let text = read_plan_text(path).await?;
        match ExecutionPlan::from_json(&text) {
            Ok(plan) => {
                self.renderer.render(&ValidationResult(&plan).to_string())?;
                Ok(0)
            }
            Err(e) => {
                self.renderer
                    .render(&OperationStatus::failure(format!("Invalid plan: {e}")).to_string())?;
                Ok(EXIT_RUN_FAILED)
            }
        }
    }

    pub async fn handle_history_command(&self, command: HistoryCommands) -> Result<i32> {
        let history = self.history().await?;
        match command {
            HistoryCommands::List { limit } => {
                let sets = history.list(limit).await?;
                self.renderer.render(&ChangeSetSummaries(sets).to_string())?;
            }
            HistoryCommands::Show { id } => {
                let Some(set) = history.get(id).await? else {
                    bail!("Change set {id} not found");
                };
                self.renderer.render(&set.to_string())?;
            }
            HistoryCommands::Revert { id, root } => {
                let Some(set) = history.get(id).await? else {
                    bail!("Change set {id} not found");
                };
                if set.reverted_at.is_some() {
                    self.renderer.render(
                        &OperationStatus::failure(format!("Change set {id} was already reverted"))
                            .to_string(),
                    )?;
                    return Ok(EXIT_RUN_FAILED);
                }
                let Some(root) = root.or_else(|| set.root.clone()) else {
                    bail!("Change set {id} has no recorded workspace root; pass --root");
                };

                info!("Reverting change set {id} in {}", root.display());
                let report = revert_change_set(&set, &LocalWorkspace, &root)
                    .await
                    .with_context(|| format!("Failed to revert change set {id}"))?;
                history.mark_reverted(id, jiff::Timestamp::now()).await?;

                self.renderer.render(
                    &RevertResult {
                        change_set_id: id,
                        report,
                    }
                    .to_string(),
                )?;
            }
        }
        Ok(0)
    }

    /// Runs `args.prompt` against every file through the task pool.
    pub async fn analyze(&self, args: AnalyzeArgs) -> Result<i32> {
        let mut inputs = Vec::with_capacity(args.files.len());
        for path in &args.files {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            inputs.push((path.clone(), content));
        }

        let mut pool_config = self.config.pool.clone();
        if let Some(workers) = args.workers {
            pool_config.max_workers = workers;
        }

        let credentials = Arc::new(ApiKeyPool::new(self.config.api_keys.clone()));
        let generator = ResilientGenerator::new(
            Arc::new(OpenAiCompatibleGenerator::new(self.config.base_url.clone())),
            self.config.generation.clone(),
        );
        let model = self.config.model.clone();
        let prompt = args.prompt;

        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        let signal_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c.cancel();
            }
        });

        let outcomes = TaskPool::new(pool_config)
            .run_all(
                inputs.clone(),
                move |(path, content): (PathBuf, String), token| {
                    let credentials = Arc::clone(&credentials);
                    let generator = generator.clone();
                    let model = model.clone();
                    let request = GenerationRequest::new(format!(
                        "{prompt}\n\nFile: {}\n\n{content}",
                        path.display()
                    ))
                    .with_system(ANALYZE_SYSTEM_PROMPT);
                    async move {
                        let scope = CancellationScope::new(vec![token]);
                        let text = generator
                            .generate(&credentials, &model, &request, &scope, &NoopListener)
                            .await?;
                        Ok::<_, anyhow::Error>(text)
                    }
                },
                cancel,
            )
            .await;
        signal_task.abort();

        let all_completed = outcomes.iter().all(|outcome| outcome.is_completed());
        let results = inputs
            .into_iter()
            .map(|(path, _)| path)
            .zip(outcomes)
            .collect();
        self.renderer.render(&AnalysisResults(results).to_string())?;
        Ok(if all_completed { 0 } else { EXIT_RUN_FAILED })
    }
}

async fn read_plan_text(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read plan from stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read plan {}", path.display()))
}

async fn load_plan(path: &Path) -> Result<ExecutionPlan> {
    let text = read_plan_text(path).await?;
    ExecutionPlan::from_json(&text).context("Invalid plan")
}
