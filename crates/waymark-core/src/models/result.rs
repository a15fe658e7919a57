//! Per-attempt step results.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ChangeLogEntry;
use crate::workspace::CommandOutput;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    /// The composite cancellation signal fired
    Cancellation,
    /// Expected to resolve without intervention (rate limits, network blips)
    Transient,
    /// Everything else
    NonTransient,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Cancellation => "cancellation",
            ErrorClass::Transient => "transient",
            ErrorClass::NonTransient => "non-transient",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful attempt did to the workspace.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEffect {
    /// Nothing observable (failed attempts, idempotent directory creation)
    None,
    /// A mutation that belongs in the change log
    Changed(ChangeLogEntry),
    /// Computed final state equals the current state
    AlreadyCorrect,
    /// The user declined to run a command
    Declined,
    /// A command ran to completion
    Command(CommandOutput),
}

/// Outcome of one attempt at one step. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct StepExecutionResult {
    pub success: bool,
    pub error_class: Option<ErrorClass>,
    pub message: Option<String>,
    pub diff: Option<String>,
    pub effect: StepEffect,
}

impl StepExecutionResult {
    /// A successful attempt with the given effect.
    pub fn succeeded(effect: StepEffect, message: impl Into<String>) -> Self {
        let diff = match &effect {
            StepEffect::Changed(entry) if !entry.diff_content.is_empty() => {
                Some(entry.diff_content.clone())
            }
            _ => None,
        };
        Self {
            success: true,
            error_class: None,
            message: Some(message.into()),
            diff,
            effect,
        }
    }

    /// A failed attempt carrying its classification and formatted message.
    pub fn failed(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_class: Some(class),
            message: Some(message.into()),
            diff: None,
            effect: StepEffect::None,
        }
    }

    /// The change log entry produced by this attempt, if any.
    pub fn change(&self) -> Option<&ChangeLogEntry> {
        match &self.effect {
            StepEffect::Changed(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self.effect, StepEffect::AlreadyCorrect)
    }
}
