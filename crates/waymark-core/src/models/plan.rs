//! Execution plan model and its JSON wire format.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, WaymarkError},
    text::strip_code_fence,
};

/// An ordered list of typed workspace mutations produced for one request.
///
/// A plan is immutable once execution begins; the engine only ever borrows
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Human-readable summary of what the plan achieves
    pub description: String,

    /// Steps in authored order. Step numbers are the 1-based positions.
    pub steps: Vec<PlanStep>,
}

/// A single plan step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    CreateDirectory(CreateDirectoryStep),
    CreateFile(CreateFileStep),
    ModifyFile(ModifyFileStep),
    RunCommand(RunCommandStep),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDirectoryStep {
    pub description: String,
    /// Workspace-relative, forward-slash separated
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFileStep {
    pub description: String,
    pub path: String,
    pub source: FileSource,
}

/// Where the content of a new file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Content written verbatim
    Literal(String),
    /// Content produced by the generation service from a prompt
    Generate { prompt: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyFileStep {
    pub description: String,
    pub path: String,
    pub modification_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommandStep {
    pub description: String,
    pub command: String,
}

/// Discriminant of a [`PlanStep`], matching the wire `action` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    CreateDirectory,
    CreateFile,
    ModifyFile,
    RunCommand,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::CreateDirectory => "create_directory",
            StepKind::CreateFile => "create_file",
            StepKind::ModifyFile => "modify_file",
            StepKind::RunCommand => "run_command",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PlanStep {
    /// The step's human-readable description.
    pub fn description(&self) -> &str {
        match self {
            PlanStep::CreateDirectory(step) => &step.description,
            PlanStep::CreateFile(step) => &step.description,
            PlanStep::ModifyFile(step) => &step.description,
            PlanStep::RunCommand(step) => &step.description,
        }
    }

    /// The workspace-relative path the step targets, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            PlanStep::CreateDirectory(step) => Some(&step.path),
            PlanStep::CreateFile(step) => Some(&step.path),
            PlanStep::ModifyFile(step) => Some(&step.path),
            PlanStep::RunCommand(_) => None,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            PlanStep::CreateDirectory(_) => StepKind::CreateDirectory,
            PlanStep::CreateFile(_) => StepKind::CreateFile,
            PlanStep::ModifyFile(_) => StepKind::ModifyFile,
            PlanStep::RunCommand(_) => StepKind::RunCommand,
        }
    }

    /// Short one-line label used in progress output and prompts.
    pub fn label(&self) -> String {
        match self {
            PlanStep::RunCommand(step) => format!("{}: `{}`", self.kind(), step.command),
            _ => format!("{}: {}", self.kind(), self.path().unwrap_or_default()),
        }
    }
}

// Wire format consumed from the plan generation collaborator.

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePlan {
    plan_description: String,
    steps: Vec<WireStep>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireStep {
    step: usize,
    action: StepKind,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generate_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modification_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
}

impl ExecutionPlan {
    /// Parses and validates a plan from its JSON wire format.
    ///
    /// A surrounding Markdown code fence (as often emitted by text
    /// generation services) is tolerated.
    ///
    /// # Errors
    ///
    /// Returns `WaymarkError::Serialization` if the text is not a plan
    /// object, and `WaymarkError::InvalidPlan` if a step violates the
    /// plan's structural rules.
    pub fn from_json(text: &str) -> Result<Self> {
        let wire: WirePlan = serde_json::from_str(strip_code_fence(text))?;
        Self::try_from(wire)
    }

    /// Renders the plan back into its wire format.
    pub fn to_wire_json(&self) -> Result<String> {
        let wire = WirePlan {
            plan_description: self.description.clone(),
            steps: self
                .steps
                .iter()
                .enumerate()
                .map(|(index, step)| WireStep::from_step(index + 1, step))
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&wire)?)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl TryFrom<WirePlan> for ExecutionPlan {
    type Error = WaymarkError;

    fn try_from(wire: WirePlan) -> Result<Self> {
        let mut modified_paths = HashSet::new();
        let mut steps = Vec::with_capacity(wire.steps.len());

        for (index, raw) in wire.steps.into_iter().enumerate() {
            let number = index + 1;
            if raw.step != number {
                return Err(WaymarkError::invalid_plan(number).with_reason(format!(
                    "step numbers must be sequential starting at 1, found {}",
                    raw.step
                )));
            }

            let step = raw.into_step(number)?;
            if let PlanStep::ModifyFile(modify) = &step {
                if !modified_paths.insert(modify.path.clone()) {
                    return Err(WaymarkError::invalid_plan(number).with_reason(format!(
                        "'{}' is modified by more than one step",
                        modify.path
                    )));
                }
            }
            steps.push(step);
        }

        Ok(ExecutionPlan {
            description: wire.plan_description,
            steps,
        })
    }
}

impl WireStep {
    fn into_step(self, number: usize) -> Result<PlanStep> {
        let description = match self.description {
            Some(description) if !description.trim().is_empty() => description,
            _ => {
                return Err(WaymarkError::invalid_plan(number).with_reason("description is required"))
            }
        };

        match self.action {
            StepKind::CreateDirectory => Ok(PlanStep::CreateDirectory(CreateDirectoryStep {
                description,
                path: required_path(number, self.path)?,
            })),
            StepKind::CreateFile => {
                let path = required_path(number, self.path)?;
                let source = match (self.content, self.generate_prompt) {
                    (Some(content), None) => FileSource::Literal(content),
                    (None, Some(prompt)) => FileSource::Generate { prompt },
                    (Some(_), Some(_)) => {
                        return Err(WaymarkError::invalid_plan(number)
                            .with_reason("content and generate_prompt are mutually exclusive"))
                    }
                    (None, None) => {
                        return Err(WaymarkError::invalid_plan(number)
                            .with_reason("one of content or generate_prompt is required"))
                    }
                };
                Ok(PlanStep::CreateFile(CreateFileStep {
                    description,
                    path,
                    source,
                }))
            }
            StepKind::ModifyFile => {
                let path = required_path(number, self.path)?;
                let modification_prompt = required_text(
                    number,
                    "modification_prompt",
                    self.modification_prompt,
                )?;
                Ok(PlanStep::ModifyFile(ModifyFileStep {
                    description,
                    path,
                    modification_prompt,
                }))
            }
            StepKind::RunCommand => Ok(PlanStep::RunCommand(RunCommandStep {
                description,
                command: required_text(number, "command", self.command)?,
            })),
        }
    }

    fn from_step(number: usize, step: &PlanStep) -> Self {
        let mut wire = WireStep {
            step: number,
            action: step.kind(),
            description: Some(step.description().to_string()),
            path: step.path().map(String::from),
            content: None,
            generate_prompt: None,
            modification_prompt: None,
            command: None,
        };
        match step {
            PlanStep::CreateFile(create) => match &create.source {
                FileSource::Literal(content) => wire.content = Some(content.clone()),
                FileSource::Generate { prompt } => wire.generate_prompt = Some(prompt.clone()),
            },
            PlanStep::ModifyFile(modify) => {
                wire.modification_prompt = Some(modify.modification_prompt.clone());
            }
            PlanStep::RunCommand(run) => wire.command = Some(run.command.clone()),
            PlanStep::CreateDirectory(_) => {}
        }
        wire
    }
}

fn required_text(number: usize, field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(WaymarkError::invalid_plan(number).with_reason(format!("{field} is required"))),
    }
}

fn required_path(number: usize, path: Option<String>) -> Result<String> {
    let path = required_text(number, "path", path)?;
    validate_relative_path(&path)
        .map_err(|reason| WaymarkError::invalid_plan(number).with_reason(reason))?;
    Ok(path)
}

/// Checks that a plan path is relative, forward-slash separated and never
/// escapes the workspace root.
pub fn validate_relative_path(path: &str) -> std::result::Result<(), String> {
    if path.contains('\\') {
        return Err(format!("path '{path}' must use forward slashes"));
    }
    let has_drive = path.len() >= 2 && path.as_bytes()[1] == b':';
    if path.starts_with('/') || has_drive {
        return Err(format!("path '{path}' must be relative"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("path '{path}' must not contain '..' segments"));
    }
    Ok(())
}
