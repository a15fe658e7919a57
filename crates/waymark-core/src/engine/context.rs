use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    classify::ErrorClassifier,
    config::RetryPolicy,
    db::ChangeHistory,
    generation::{ApiKeyPool, ResilientGenerator},
    interaction::{ExecutionObserver, Interaction},
    workspace::{CommandRunner, DiffService, WorkspaceStorage},
};

/// Collaborators and settings shared by every run of one engine.
///
/// Built by [`EngineBuilder`](super::EngineBuilder) and passed explicitly to
/// handlers through [`StepContext`](crate::handlers::StepContext). The
/// credential pool lives here so its active index survives across runs.
pub struct RunContext {
    /// Workspace root every plan path is resolved against
    pub root: PathBuf,
    pub storage: Arc<dyn WorkspaceStorage>,
    pub commands: Arc<dyn CommandRunner>,
    pub diff: Arc<dyn DiffService>,
    pub generator: ResilientGenerator,
    pub credentials: Arc<ApiKeyPool>,
    /// Model identifier passed to the generation service
    pub model: String,
    pub interaction: Arc<dyn Interaction>,
    pub observer: Arc<dyn ExecutionObserver>,
    pub classifier: Arc<dyn ErrorClassifier>,
    pub history: Arc<dyn ChangeHistory>,
    pub retry: RetryPolicy,
}
