use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Wiki-side settings: where to find work and how to name pages.
#[derive(Debug, Clone, Deserialize)]
pub struct WikiSettings {
    /// Category listing the destination pages the bot manages.
    pub category: String,
    /// Suffix that turns a destination title into its source title.
    pub source_suffix: String,
    /// Footer line appended to every published page.
    pub category_marker: String,
}

/// How a stage executable is launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    /// Execute `program` directly with `args`.
    #[default]
    Direct,
    /// Run `program` through `sh -c`.
    Shell,
}

/// One opaque stdin-to-stdout text filter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StageSpec {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub mode: InvocationMode,
}

impl StageSpec {
    pub fn direct(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            mode: InvocationMode::Direct,
        }
    }

    pub fn shell(command: impl Into<PathBuf>) -> Self {
        Self {
            program: command.into(),
            args: Vec::new(),
            mode: InvocationMode::Shell,
        }
    }
}

/// Which streams make up the diagnostic of a failed stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticStreams {
    /// stderr only, falling back to stdout when stderr is empty.
    #[default]
    Separate,
    /// stderr followed by stdout.
    Combined,
}

/// Ordered, immutable description of the transform pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PipelineSpec {
    pub stages: Vec<StageSpec>,
    #[serde(default)]
    pub diagnostics: DiagnosticStreams,
}

impl PipelineSpec {
    pub fn trace_loaded(&self) {
        info!(
            stages = self.stages.len(),
            diagnostics = ?self.diagnostics,
            "Loaded pipeline stages"
        );
        for (index, stage) in self.stages.iter().enumerate() {
            debug!(index, program = %stage.program.display(), mode = ?stage.mode, "Pipeline stage");
        }
    }
}

/// Per-run switches for the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Ignore the provenance tag and always publish.
    pub force: bool,
    /// Run everything except the publish call.
    pub dry_run: bool,
    /// Keep the transformed text in the report (for `--stdout`).
    pub keep_rendered: bool,
}

/// Settings for the batch driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub concurrency: usize,
    pub grace_period: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            grace_period: Duration::from_secs(10),
        }
    }
}
