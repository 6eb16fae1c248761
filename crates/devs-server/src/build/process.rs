//! Build pipeline backed by an external compiler process.
//!
//! The compiler is run as `<program> <args...> <filename>`. The build
//! request is written to its stdin as JSON; the last non-empty stdout line
//! must be a [`BuildStatus`] JSON object. Stderr lines are forwarded as
//! `"output"` events while the compiler runs.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use devs_core::protocol::{BuildReqArgs, BuildStatus, OutputEvent, OutputFrom};

use super::errors::PipelineError;
use super::traits::BuildPipeline;
use super::watcher::{SourceWatcher, settle, watch_root};

/// How to invoke the compiler.
#[derive(Clone, Debug)]
pub struct ProcessPipelineConfig {
    /// Compiler executable.
    pub program: String,
    /// Arguments placed before the entry point file.
    pub args: Vec<String>,
    /// Quiet period after a file change before rebuilding.
    pub debounce: Duration,
}

/// Runs the compiler as a child process per build.
#[derive(Clone)]
pub struct ProcessBuildPipeline {
    config: Arc<ProcessPipelineConfig>,
    output: Option<mpsc::Sender<OutputEvent>>,
}

impl ProcessBuildPipeline {
    /// Create a pipeline.
    pub fn new(config: ProcessPipelineConfig) -> Self {
        Self {
            config: Arc::new(config),
            output: None,
        }
    }

    /// Forward compiler stderr to `output`.
    #[must_use]
    pub fn with_output(mut self, output: mpsc::Sender<OutputEvent>) -> Self {
        self.output = Some(output);
        self
    }

    async fn run_compiler(&self, args: &BuildReqArgs) -> Result<BuildStatus, PipelineError> {
        let start = Instant::now();
        let mut request = serde_json::to_vec(args)?;
        request.push(b'\n');

        let mut cmd = Command::new(&self.config.program);
        let _ = cmd
            .args(&self.config.args)
            .arg(&args.filename)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.config.program, filename = %args.filename, "spawning compiler");
        let mut child = cmd.spawn().map_err(|source| PipelineError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        let stderr_task = tokio::spawn(forward_stderr(child.stderr.take(), self.output.clone()));

        if let Some(mut stdin) = child.stdin.take() {
            // A compiler that ignores stdin may close it early.
            if let Err(e) = stdin.write_all(&request).await {
                debug!(error = %e, "compiler closed stdin");
            }
        }

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            let _ = out.read_to_string(&mut stdout).await?;
        }
        let exit = child.wait().await?;
        let stderr_lines = stderr_task.await.unwrap_or_default();

        debug!(
            filename = %args.filename,
            exit_code = exit.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            "compiler exited"
        );

        match stdout.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(line) => serde_json::from_str(line).map_err(PipelineError::InvalidStatus),
            None => Err(PipelineError::Compile(
                stderr_lines
                    .iter()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("compiler exited with {exit}")),
            )),
        }
    }

    async fn rebuild_loop(
        self,
        watcher: SourceWatcher,
        mut changes: mpsc::UnboundedReceiver<()>,
        args: BuildReqArgs,
        updates: mpsc::Sender<BuildStatus>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = changes.recv() => if changed.is_none() { break },
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                open = settle(&mut changes, self.config.debounce) => if !open { break },
            }

            info!(filename = %args.filename, "sources changed, rebuilding");
            let status = match self.run_compiler(&args).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(filename = %args.filename, error = %e, "rebuild failed");
                    BuildStatus::failed(e.to_string())
                }
            };
            if updates.send(status).await.is_err() {
                break;
            }
        }
        debug!(root = %watcher.root().display(), "rebuild loop stopped");
    }
}

#[async_trait]
impl BuildPipeline for ProcessBuildPipeline {
    async fn build(&self, args: &BuildReqArgs) -> Result<BuildStatus, PipelineError> {
        self.run_compiler(args).await
    }

    async fn watch(
        &self,
        args: &BuildReqArgs,
        updates: mpsc::Sender<BuildStatus>,
        cancel: CancellationToken,
    ) -> Result<BuildStatus, PipelineError> {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let watcher = SourceWatcher::new(&watch_root(&args.filename), changes_tx)?;
        let initial = self.run_compiler(args).await?;

        drop(tokio::spawn(self.clone().rebuild_loop(
            watcher,
            changes_rx,
            args.clone(),
            updates,
            cancel,
        )));
        Ok(initial)
    }
}

async fn forward_stderr(
    stderr: Option<ChildStderr>,
    output: Option<mpsc::Sender<OutputEvent>>,
) -> Vec<String> {
    let mut collected = Vec::new();
    let Some(stderr) = stderr else {
        return collected;
    };
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(tx) = &output {
            let _ = tx.try_send(OutputEvent {
                from: OutputFrom::Dev,
                lines: vec![line.clone()],
            });
        }
        collected.push(line);
    }
    collected
}
