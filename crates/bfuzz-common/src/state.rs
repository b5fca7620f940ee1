//! Pipeline stages of one harness build.
//!
//! Forward order:
//! START → COMPUTE_SCOPE → RESOLVE_PACKAGE → VALIDATE_ENTRY →
//! GENERATE_HARNESS → WRITE_TEMP_FILE → INVOKE_COMPILER → CLEANUP → SUCCEEDED
//!
//! Any non-terminal stage may fail. A dry run stops after GENERATE_HARNESS.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of the build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStage {
    /// Configuration fixed, nothing run yet.
    #[default]
    Start,
    /// Excluded import paths computed; build flags assembled.
    ComputeScope,
    /// Package loader running.
    ResolvePackage,
    /// Entry function being discovered or checked.
    ValidateEntry,
    /// Harness source being rendered.
    GenerateHarness,
    /// Harness source being written to the work directory.
    WriteTempFile,
    /// `go build` running.
    InvokeCompiler,
    /// Temporary harness being removed.
    Cleanup,
    /// Terminal: archive produced (or harness printed).
    Succeeded,
    /// Terminal: the build failed.
    Failed,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::ComputeScope => write!(f, "COMPUTE_SCOPE"),
            Self::ResolvePackage => write!(f, "RESOLVE_PACKAGE"),
            Self::ValidateEntry => write!(f, "VALIDATE_ENTRY"),
            Self::GenerateHarness => write!(f, "GENERATE_HARNESS"),
            Self::WriteTempFile => write!(f, "WRITE_TEMP_FILE"),
            Self::InvokeCompiler => write!(f, "INVOKE_COMPILER"),
            Self::Cleanup => write!(f, "CLEANUP"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl BuildStage {
    /// Check if a transition to `target` is valid from the current stage.
    #[must_use]
    pub fn can_transition_to(&self, target: BuildStage) -> bool {
        use BuildStage::{
            Cleanup, ComputeScope, Failed, GenerateHarness, InvokeCompiler, ResolvePackage, Start,
            Succeeded, ValidateEntry, WriteTempFile,
        };

        match (self, target) {
            (Start, ComputeScope)
            | (ComputeScope, ResolvePackage)
            | (ResolvePackage, ValidateEntry)
            | (ValidateEntry, GenerateHarness)
            | (GenerateHarness, WriteTempFile)
            | (WriteTempFile, InvokeCompiler)
            | (InvokeCompiler, Cleanup)
            | (Cleanup, Succeeded)
            // Dry run
            | (GenerateHarness, Succeeded) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Whether the pipeline has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Rejected stage transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid build stage transition from {from} to {to}")]
pub struct InvalidTransition {
    /// Stage the pipeline was in.
    pub from: BuildStage,
    /// Stage that was requested.
    pub to: BuildStage,
}

/// Stage tracker with transition history.
#[derive(Debug, Clone, Default)]
pub struct StageTracker {
    current: BuildStage,
    history: Vec<BuildStage>,
}

impl StageTracker {
    /// Create a tracker in START.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> BuildStage {
        self.current
    }

    /// Stages left so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[BuildStage] {
        &self.history
    }

    /// Attempt a transition.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if `target` does not follow the
    /// current stage.
    pub fn transition(&mut self, target: BuildStage) -> Result<(), InvalidTransition> {
        if self.current.can_transition_to(target) {
            self.history.push(self.current);
            self.current = target;
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.current,
                to: target,
            })
        }
    }

    /// Move to FAILED unless already terminal.
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            self.history.push(self.current);
            self.current = BuildStage::Failed;
        }
    }
}
