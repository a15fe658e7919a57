//! Terminal implementations of the engine's interaction surfaces.
//!
//! Prompts and progress go to stderr so stdout carries only the final
//! report. End of input dismisses a prompt, which the engine treats as
//! "skip" for command consent and "cancel" for failures.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use waymark_core::{
    interaction::Escalation,
    models::{ExecutionPlan, PlanStep, RunCommandStep, RunReport, StepExecutionResult},
    CommandConsent, ExecutionObserver, FailureDecision, Interaction, Result, WaymarkError,
};

/// Answers consent and failure prompts from a line-oriented reader.
pub struct TerminalInteraction<R> {
    assume_yes: bool,
    input: Mutex<Lines<R>>,
}

impl TerminalInteraction<BufReader<Stdin>> {
    pub fn stdin(assume_yes: bool) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), assume_yes)
    }
}

impl<R: AsyncBufRead + Unpin + Send> TerminalInteraction<R> {
    pub fn new(reader: R, assume_yes: bool) -> Self {
        Self {
            assume_yes,
            input: Mutex::new(reader.lines()),
        }
    }

    /// Prints `question` and reads one answer line. `None` at end of input.
    async fn ask(&self, question: &str) -> Result<Option<String>> {
        eprint!("{question}");
        let _ = std::io::stderr().flush();

        let line = self
            .input
            .lock()
            .await
            .next_line()
            .await
            .map_err(|e| WaymarkError::Interaction {
                message: format!("Failed to read answer: {e}"),
            })?;
        if line.is_none() {
            eprintln!();
            debug!("Prompt dismissed at end of input");
        }
        Ok(line)
    }
}

fn parse_consent(answer: &str) -> CommandConsent {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => CommandConsent::Allow,
        _ => CommandConsent::Skip,
    }
}

fn parse_decision(answer: &str) -> Option<FailureDecision> {
    match answer.trim().to_lowercase().as_str() {
        "r" | "retry" => Some(FailureDecision::Retry),
        "s" | "skip" => Some(FailureDecision::Skip),
        "c" | "cancel" => Some(FailureDecision::Cancel),
        _ => None,
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Interaction for TerminalInteraction<R> {
    async fn command_consent(
        &self,
        step_number: usize,
        total_steps: usize,
        step: &RunCommandStep,
    ) -> Result<Option<CommandConsent>> {
        if self.assume_yes {
            return Ok(Some(CommandConsent::Allow));
        }
        let question = format!(
            "[{step_number}/{total_steps}] Run `{}`? [y/N] ",
            step.command
        );
        Ok(self
            .ask(&question)
            .await?
            .map(|answer| parse_consent(&answer)))
    }

    async fn failure_decision(&self, escalation: &Escalation) -> Result<Option<FailureDecision>> {
        eprintln!("{} [{}]", escalation.headline(), escalation.error_class);
        eprintln!("{}", escalation.message.trim_end());
        loop {
            let Some(answer) = self.ask("[r]etry, [s]kip or [c]ancel? ").await? else {
                return Ok(None);
            };
            if let Some(decision) = parse_decision(&answer) {
                return Ok(Some(decision));
            }
        }
    }
}

/// Prints one progress line per notification to stderr.
#[derive(Debug, Default)]
pub struct TerminalObserver;

impl ExecutionObserver for TerminalObserver {
    fn run_started(&self, plan: &ExecutionPlan) {
        eprintln!("Executing '{}' ({} steps)", plan.description, plan.len());
    }

    fn step_started(&self, step_number: usize, total_steps: usize, step: &PlanStep) {
        eprintln!("[{step_number}/{total_steps}] {}", step.label());
    }

    fn step_completed(&self, step_number: usize, total_steps: usize, result: &StepExecutionResult) {
        eprintln!("[{step_number}/{total_steps}] {result}");
    }

    fn step_skipped(&self, step_number: usize, total_steps: usize) {
        eprintln!("[{step_number}/{total_steps}] skipped");
    }

    fn step_retrying(&self, step_number: usize, attempt: u32, delay: Duration, message: &str) {
        eprintln!(
            "Step {step_number} failed ({message}); retry {attempt} in {}ms",
            delay.as_millis()
        );
    }

    fn credential_switched(&self, from: usize, to: usize, pool_size: usize) {
        eprintln!(
            "API key {} of {pool_size} hit its quota; switching to key {}",
            from + 1,
            to + 1
        );
    }

    fn run_completed(&self, report: &RunReport) {
        eprintln!("Finished: {}", report.outcome.with_icon());
    }
}
