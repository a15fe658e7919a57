//! Builder for creating and configuring WorkflowEngine instances.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{RunContext, WorkflowEngine};
use crate::{
    classify::{ErrorClassifier, HeuristicClassifier},
    config::EngineConfig,
    db::{ChangeHistory, MemoryChangeHistory},
    error::{Result, WaymarkError},
    generation::{ApiKeyPool, ContentGenerator, OpenAiCompatibleGenerator, ResilientGenerator},
    interaction::{ExecutionObserver, Interaction, NoopObserver},
    workspace::{CommandRunner, DiffService, LineDiff, LocalWorkspace, ShellCommandRunner, WorkspaceStorage},
};

/// Builder for creating and configuring [`WorkflowEngine`] instances.
///
/// Only the interaction surface is mandatory. Everything else defaults to
/// the local implementation: the local file system, the platform shell, a
/// line differ, an OpenAI-compatible generator at
/// [`EngineConfig::base_url`], credentials from [`EngineConfig::api_keys`]
/// and an in-memory history.
pub struct EngineBuilder {
    root: PathBuf,
    config: EngineConfig,
    storage: Option<Arc<dyn WorkspaceStorage>>,
    commands: Option<Arc<dyn CommandRunner>>,
    diff: Option<Arc<dyn DiffService>>,
    generator: Option<Arc<dyn ContentGenerator>>,
    credentials: Option<Arc<ApiKeyPool>>,
    interaction: Option<Arc<dyn Interaction>>,
    observer: Option<Arc<dyn ExecutionObserver>>,
    classifier: Option<Arc<dyn ErrorClassifier>>,
    history: Option<Arc<dyn ChangeHistory>>,
}

impl EngineBuilder {
    /// Creates a builder for the workspace rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config: EngineConfig::default(),
            storage: None,
            commands: None,
            diff: None,
            generator: None,
            credentials: None,
            interaction: None,
            observer: None,
            classifier: None,
            history: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn WorkspaceStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_command_runner(mut self, commands: Arc<dyn CommandRunner>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn with_diff_service(mut self, diff: Arc<dyn DiffService>) -> Self {
        self.diff = Some(diff);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Shares an existing pool, e.g. with a [`TaskPool`](crate::generation::TaskPool)
    /// batch, so rotation state carries over.
    pub fn with_credentials(mut self, credentials: Arc<ApiKeyPool>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_interaction(mut self, interaction: Arc<dyn Interaction>) -> Self {
        self.interaction = Some(interaction);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn ChangeHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Builds the configured engine.
    ///
    /// # Errors
    ///
    /// Returns `WaymarkError::Configuration` if no interaction surface was
    /// set or the workspace root is not a directory.
    pub fn build(self) -> Result<WorkflowEngine> {
        let interaction = self.interaction.ok_or_else(|| WaymarkError::Configuration {
            message: "An interaction surface is required to execute plans".to_string(),
        })?;

        if !self.root.is_dir() {
            return Err(WaymarkError::Configuration {
                message: format!(
                    "Workspace root '{}' is not a directory",
                    self.root.display()
                ),
            });
        }

        let config = self.config;
        let generator = self
            .generator
            .unwrap_or_else(|| Arc::new(OpenAiCompatibleGenerator::new(config.base_url.clone())));
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(ApiKeyPool::new(config.api_keys.iter().cloned())));

        let context = RunContext {
            root: self.root,
            storage: self.storage.unwrap_or_else(|| Arc::new(LocalWorkspace)),
            commands: self
                .commands
                .unwrap_or_else(|| Arc::new(ShellCommandRunner::new())),
            diff: self.diff.unwrap_or_else(|| Arc::new(LineDiff::default())),
            generator: ResilientGenerator::new(generator, config.generation),
            credentials,
            model: config.model,
            interaction,
            observer: self.observer.unwrap_or_else(|| Arc::new(NoopObserver)),
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(HeuristicClassifier)),
            history: self
                .history
                .unwrap_or_else(|| Arc::new(MemoryChangeHistory::new())),
            retry: config.retry,
        };

        Ok(WorkflowEngine::new(context))
    }
}
