//! External transform pipeline: an ordered chain of opaque stdin→stdout filters.
//!
//! Each stage receives the previous stage's complete output as its complete
//! input. Composition is fully buffered; within one stage invocation the
//! input is written while stdout and stderr are drained, so a stage that
//! produces more output than the OS pipe buffer holds cannot deadlock us.
//!
//! Children are spawned with `kill_on_drop`, so a run that fails or whose
//! future is dropped (batch cancellation) does not leave processes behind.

use std::io;
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::{DiagnosticStreams, InvocationMode, PipelineSpec, StageSpec};
use crate::error::TransformError;

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    spec: PipelineSpec,
}

impl TransformPipeline {
    pub fn new(spec: PipelineSpec) -> Result<Self, TransformError> {
        if spec.stages.is_empty() {
            return Err(TransformError::EmptyPipeline);
        }
        Ok(Self { spec })
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.spec.stages
    }

    /// Feeds `input` through every stage in order. The first failing stage
    /// aborts the run; later stages are never started.
    pub async fn run(&self, input: &str) -> Result<String, TransformError> {
        let mut text = input.to_string();
        for (index, stage) in self.spec.stages.iter().enumerate() {
            text = self.run_stage(index, stage, text.into_bytes()).await?;
        }
        Ok(text)
    }

    async fn run_stage(
        &self,
        index: usize,
        stage: &StageSpec,
        input: Vec<u8>,
    ) -> Result<String, TransformError> {
        let program = stage.program.display().to_string();
        info!(index, program = %program, input_bytes = input.len(), "[TRANSFORM] Running stage");

        let mut child = stage_command(stage)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                error!(
                    index,
                    program = %program,
                    error = ?source,
                    "[TRANSFORM][ERROR] Failed to spawn stage"
                );
                TransformError::ProcessSpawnFailed {
                    index,
                    program: program.clone(),
                    source,
                }
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| TransformError::Io {
            index,
            source: io::Error::new(io::ErrorKind::Other, "stage stdin was not captured"),
        })?;

        let writer = async move {
            let written = stdin.write_all(&input).await;
            drop(stdin);
            match written {
                // The stage stopped reading; its exit status tells the rest.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };

        let (written, output) = tokio::join!(writer, child.wait_with_output());
        let output = output.map_err(|source| TransformError::Io { index, source })?;

        if !output.status.success() {
            let diagnostic = diagnostic(&output, self.spec.diagnostics);
            error!(
                index,
                program = %program,
                status = %output.status,
                diagnostic = %diagnostic,
                "[TRANSFORM][ERROR] Stage exited unsuccessfully"
            );
            return Err(TransformError::StageFailed { index, diagnostic });
        }
        written.map_err(|source| TransformError::Io { index, source })?;

        if !output.stderr.is_empty() {
            debug!(
                index,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "[TRANSFORM] Stage wrote to stderr"
            );
        }

        let text = String::from_utf8(output.stdout).map_err(|_| {
            error!(index, program = %program, "[TRANSFORM][ERROR] Stage output is not UTF-8");
            TransformError::InvalidOutput { index }
        })?;
        debug!(index, output_bytes = text.len(), "[TRANSFORM] Stage finished");
        Ok(text)
    }
}

fn stage_command(stage: &StageSpec) -> Command {
    match stage.mode {
        InvocationMode::Direct => {
            let mut command = Command::new(&stage.program);
            command.args(&stage.args);
            command
        }
        InvocationMode::Shell => {
            let mut command = Command::new("sh");
            if stage.args.is_empty() {
                command.arg("-c").arg(&stage.program);
            } else {
                let script = format!("{} \"$@\"", stage.program.display());
                command.arg("-c").arg(script).arg("lawbot-stage").args(&stage.args);
            }
            command
        }
    }
}

fn diagnostic(output: &Output, streams: DiagnosticStreams) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let (stderr, stdout) = (stderr.trim(), stdout.trim());

    let text = match streams {
        DiagnosticStreams::Separate if !stderr.is_empty() => stderr.to_string(),
        DiagnosticStreams::Separate => stdout.to_string(),
        DiagnosticStreams::Combined => [stderr, stdout]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    };

    if text.is_empty() {
        format!("exited with {}", output.status)
    } else {
        text
    }
}
