//! Scripted collaborators shared by the unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    classify::HeuristicClassifier,
    config::{GenerationPolicy, RetryPolicy},
    db::MemoryChangeHistory,
    engine::RunContext,
    error::{Result, WaymarkError},
    generation::{
        ApiKey, ApiKeyPool, ChunkStream, ContentGenerator, GenerationError, GenerationRequest,
        ResilientGenerator,
    },
    interaction::{
        CommandConsent, Escalation, ExecutionObserver, FailureDecision, Interaction,
    },
    models::{RunCommandStep, RunReport, StepExecutionResult},
    workspace::{LineDiff, LocalWorkspace, ShellCommandRunner},
};

/// Replays scripted responses in order and records each request.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<std::result::Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
    keys_used: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<String, GenerationError>>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn replying<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|text| Ok(text.into())))
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn keys_used(&self) -> Vec<String> {
        self.keys_used.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn stream(
        &self,
        credential: &ApiKey,
        _model: &str,
        request: &GenerationRequest,
        _cancel: CancellationToken,
    ) -> std::result::Result<ChunkStream, GenerationError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.keys_used
            .lock()
            .unwrap()
            .push(credential.expose().to_string());
        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Request("script exhausted".into())))?;
        // Two chunks, so accumulation is exercised.
        let middle = text.char_indices().nth(text.chars().count() / 2).map_or(0, |(i, _)| i);
        let (head, tail) = text.split_at(middle);
        let chunks = vec![Ok(head.to_string()), Ok(tail.to_string())];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Answers prompts from scripts and records what it was asked.
pub struct ScriptedInteraction {
    consents: Mutex<VecDeque<Option<CommandConsent>>>,
    decisions: Mutex<VecDeque<Option<FailureDecision>>>,
    escalations: Mutex<Vec<Escalation>>,
    consent_requests: Mutex<Vec<String>>,
    fail_decisions: bool,
}

impl ScriptedInteraction {
    /// Allows every command; answers nothing to failures.
    pub fn new() -> Self {
        Self {
            consents: Mutex::new(VecDeque::new()),
            decisions: Mutex::new(VecDeque::new()),
            escalations: Mutex::new(Vec::new()),
            consent_requests: Mutex::new(Vec::new()),
            fail_decisions: false,
        }
    }

    pub fn with_consents<I>(self, consents: I) -> Self
    where
        I: IntoIterator<Item = Option<CommandConsent>>,
    {
        *self.consents.lock().unwrap() = consents.into_iter().collect();
        self
    }

    pub fn with_decisions<I>(self, decisions: I) -> Self
    where
        I: IntoIterator<Item = Option<FailureDecision>>,
    {
        *self.decisions.lock().unwrap() = decisions.into_iter().collect();
        self
    }

    pub fn failing_decisions(mut self) -> Self {
        self.fail_decisions = true;
        self
    }

    pub fn escalations(&self) -> Vec<Escalation> {
        self.escalations.lock().unwrap().clone()
    }

    pub fn consent_requests(&self) -> Vec<String> {
        self.consent_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn command_consent(
        &self,
        _step_number: usize,
        _total_steps: usize,
        step: &RunCommandStep,
    ) -> Result<Option<CommandConsent>> {
        self.consent_requests
            .lock()
            .unwrap()
            .push(step.command.clone());
        Ok(self
            .consents
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Some(CommandConsent::Allow)))
    }

    async fn failure_decision(&self, escalation: &Escalation) -> Result<Option<FailureDecision>> {
        self.escalations.lock().unwrap().push(escalation.clone());
        if self.fail_decisions {
            return Err(WaymarkError::Interaction {
                message: "prompt closed".to_string(),
            });
        }
        Ok(self.decisions.lock().unwrap().pop_front().flatten())
    }
}

/// Counts the notifications it receives.
#[derive(Default)]
pub struct RecordingObserver {
    retries: Mutex<Vec<(usize, u32)>>,
    started: Mutex<Vec<usize>>,
    completed: Mutex<Vec<(usize, bool)>>,
    skipped: Mutex<Vec<usize>>,
    switches: Mutex<Vec<(usize, usize)>>,
    runs_completed: Mutex<usize>,
}

impl RecordingObserver {
    pub fn retries(&self) -> usize {
        self.retries.lock().unwrap().len()
    }

    pub fn started(&self) -> Vec<usize> {
        self.started.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<(usize, bool)> {
        self.completed.lock().unwrap().clone()
    }

    pub fn skipped(&self) -> Vec<usize> {
        self.skipped.lock().unwrap().clone()
    }

    pub fn switches(&self) -> Vec<(usize, usize)> {
        self.switches.lock().unwrap().clone()
    }

    pub fn runs_completed(&self) -> usize {
        *self.runs_completed.lock().unwrap()
    }
}

impl ExecutionObserver for RecordingObserver {
    fn step_started(&self, step_number: usize, _total_steps: usize, _step: &crate::models::PlanStep) {
        self.started.lock().unwrap().push(step_number);
    }

    fn step_completed(&self, step_number: usize, _total_steps: usize, result: &StepExecutionResult) {
        self.completed
            .lock()
            .unwrap()
            .push((step_number, result.is_no_op()));
    }

    fn step_skipped(&self, step_number: usize, _total_steps: usize) {
        self.skipped.lock().unwrap().push(step_number);
    }

    fn step_retrying(&self, step_number: usize, attempt: u32, _delay: Duration, _message: &str) {
        self.retries.lock().unwrap().push((step_number, attempt));
    }

    fn credential_switched(&self, from: usize, to: usize, _pool_size: usize) {
        self.switches.lock().unwrap().push((from, to));
    }

    fn run_completed(&self, _report: &RunReport) {
        *self.runs_completed.lock().unwrap() += 1;
    }
}

/// Retry policy without delays.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_transient_step_retries: 3,
        base_delay_ms: 0,
        delay_increment_ms: 0,
    }
}

/// A run context over a real directory with scripted generation and
/// interaction, two credentials and an in-memory history.
pub fn run_context(
    root: &Path,
    generator: Arc<ScriptedGenerator>,
    interaction: Arc<ScriptedInteraction>,
    observer: Arc<RecordingObserver>,
) -> RunContext {
    let policy = GenerationPolicy {
        max_unavailable_retries: 1,
        unavailable_delay_ms: 0,
        request_timeout_secs: 10,
    };
    RunContext {
        root: root.to_path_buf(),
        storage: Arc::new(LocalWorkspace),
        commands: Arc::new(ShellCommandRunner::new()),
        diff: Arc::new(LineDiff::default()),
        generator: ResilientGenerator::new(generator, policy),
        credentials: Arc::new(ApiKeyPool::new(["key-a", "key-b"])),
        model: "test-model".to_string(),
        interaction,
        observer,
        classifier: Arc::new(HeuristicClassifier),
        history: Arc::new(MemoryChangeHistory::new()),
        retry: fast_retry(),
    }
}
