#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use waymark_core::{
    config::RetryPolicy,
    generation::{ApiKey, ApiKeyPool, ChunkStream, ContentGenerator, GenerationError, GenerationRequest},
    interaction::Escalation,
    models::RunCommandStep,
    CommandConsent, EngineBuilder, EngineConfig, FailureDecision, Interaction, Result,
    SqliteChangeHistory, WorkflowEngine,
};

/// Allows every command and skips every failed step.
#[derive(Default)]
pub struct AutoInteraction {
    pub escalations: Mutex<Vec<String>>,
}

#[async_trait]
impl Interaction for AutoInteraction {
    async fn command_consent(
        &self,
        _step_number: usize,
        _total_steps: usize,
        _step: &RunCommandStep,
    ) -> Result<Option<CommandConsent>> {
        Ok(Some(CommandConsent::Allow))
    }

    async fn failure_decision(&self, escalation: &Escalation) -> Result<Option<FailureDecision>> {
        self.escalations
            .lock()
            .unwrap()
            .push(escalation.message.clone());
        Ok(Some(FailureDecision::Skip))
    }
}

/// Replies with canned texts, one per request.
pub struct CannedGenerator {
    replies: Mutex<VecDeque<String>>,
}

impl CannedGenerator {
    pub fn new<I: IntoIterator<Item = &'static str>>(replies: I) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
        }
    }

    pub fn none() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ContentGenerator for CannedGenerator {
    async fn stream(
        &self,
        _credential: &ApiKey,
        _model: &str,
        _request: &GenerationRequest,
        _cancel: CancellationToken,
    ) -> std::result::Result<ChunkStream, GenerationError> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GenerationError::Request("no reply scripted".to_string()))?;
        Ok(Box::pin(futures::stream::iter(vec![Ok(reply)])))
    }
}

pub struct Workspace {
    pub project: TempDir,
    pub data: TempDir,
    pub history: Arc<SqliteChangeHistory>,
}

impl Workspace {
    pub async fn new() -> Self {
        let project = TempDir::new().expect("Failed to create project dir");
        let data = TempDir::new().expect("Failed to create data dir");
        let history = SqliteChangeHistory::open(Some(data.path().join("history.db")))
            .await
            .expect("Failed to open history");
        Self {
            project,
            data,
            history: Arc::new(history),
        }
    }

    pub fn engine(&self, generator: CannedGenerator, interaction: Arc<AutoInteraction>) -> WorkflowEngine {
        let config = EngineConfig {
            api_keys: vec!["test-key".to_string()],
            retry: RetryPolicy {
                max_transient_step_retries: 1,
                base_delay_ms: 1,
                delay_increment_ms: 1,
            },
            ..EngineConfig::default()
        };
        EngineBuilder::new(self.project.path())
            .with_config(config)
            .with_credentials(Arc::new(ApiKeyPool::new(["test-key"])))
            .with_generator(Arc::new(generator))
            .with_history(self.history.clone())
            .with_interaction(interaction)
            .build()
            .expect("Failed to build engine")
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.project.path().join(path)).expect("Failed to read file")
    }
}
