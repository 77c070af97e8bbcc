//! Process control adapter
//!
//! Drives the engine's command-line launcher (Start.exe). This module builds
//! the launcher argv and parses its line-oriented output; the launcher itself
//! is an opaque collaborator. Every operation is one awaited invocation with
//! no retries, since launcher actions (launch, terminate, delete) are not
//! idempotent-safe.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Captured result of one launcher invocation.
#[derive(Debug, Clone)]
pub struct RawOutput {
    /// Launcher exit code; `None` when it was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RawOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    fn into_error(self, reason: impl Into<String>) -> Error {
        Error::ExternalTool {
            reason: reason.into(),
            status: self.status,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// One launcher invocation: argv in, captured status and streams out.
///
/// The real implementation spawns the launcher executable; tests substitute
/// a mock that records argv and returns canned output.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, args: &[String]) -> Result<RawOutput>;
}

/// Invoker that spawns the real launcher executable.
pub struct LauncherInvoker {
    launcher_path: PathBuf,
}

impl LauncherInvoker {
    pub fn new(launcher_path: impl Into<PathBuf>) -> Self {
        Self {
            launcher_path: launcher_path.into(),
        }
    }
}

#[async_trait]
impl Invoker for LauncherInvoker {
    async fn invoke(&self, args: &[String]) -> Result<RawOutput> {
        debug!("running {} with args: {:?}", self.launcher_path.display(), args);
        let output = Command::new(&self.launcher_path).args(args).output().await?;
        Ok(RawOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Flags forwarded to the launcher when starting a sandboxed command.
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Target sandbox; the adapter's default box when `None`.
    pub box_name: Option<String>,
    /// Block until the sandboxed process exits and propagate its exit code.
    /// When unset the launcher returns as soon as the launch request has been
    /// issued; nothing is synchronized with the process actually starting.
    pub wait: bool,
    /// Suppress some engine pop-up error messages.
    pub silent: bool,
    /// Keep the engine's control UI from starting alongside the command.
    pub nosbiectrl: bool,
    /// Run with Administrator privileges under UAC.
    pub elevate: bool,
    /// Run outside the sandbox even if the program is forced.
    pub disable_forced: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            box_name: None,
            wait: false,
            silent: true,
            nosbiectrl: true,
            elevate: false,
            disable_forced: false,
        }
    }
}

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_box(mut self, box_name: impl Into<String>) -> Self {
        self.box_name = Some(box_name.into());
        self
    }

    pub fn with_wait(mut self, value: bool) -> Self {
        self.wait = value;
        self
    }

    pub fn with_silent(mut self, value: bool) -> Self {
        self.silent = value;
        self
    }

    pub fn with_nosbiectrl(mut self, value: bool) -> Self {
        self.nosbiectrl = value;
        self
    }

    pub fn with_elevate(mut self, value: bool) -> Self {
        self.elevate = value;
        self
    }

    pub fn with_disable_forced(mut self, value: bool) -> Self {
        self.disable_forced = value;
        self
    }
}

/// Outcome of a `start` call.
#[derive(Debug)]
pub struct StartOutcome {
    /// With `wait` set, the exit code of the sandboxed process (the launcher
    /// lingers and propagates it). Without `wait`, always 0: the launch
    /// request was issued successfully and nothing more is known.
    pub exit_code: i32,
    /// Captured launcher stdout.
    pub stdout: String,
}

/// Control adapter over one launcher executable.
pub struct ProcessControl {
    invoker: Arc<dyn Invoker>,
    default_box: String,
}

impl ProcessControl {
    pub fn new(launcher_path: impl AsRef<Path>, default_box: impl Into<String>) -> Self {
        Self {
            invoker: Arc::new(LauncherInvoker::new(launcher_path.as_ref())),
            default_box: default_box.into(),
        }
    }

    /// Substitute the launcher invocation, for tests or alternative engines.
    pub fn with_invoker(invoker: Arc<dyn Invoker>, default_box: impl Into<String>) -> Self {
        Self {
            invoker,
            default_box: default_box.into(),
        }
    }

    pub fn default_box(&self) -> &str {
        &self.default_box
    }

    /// Launch `command` inside a sandbox.
    ///
    /// With `opts.wait` set, returns only after the sandboxed process exits,
    /// yielding its exit code. Without it, returns once the launch request
    /// has been issued; a non-zero launcher exit then means the launch itself
    /// failed and surfaces as [`Error::ExternalTool`].
    pub async fn start(&self, command: &str, opts: &StartOptions) -> Result<StartOutcome> {
        let mut args = self.base_args(opts);
        args.push(command.to_string());
        let out = self.invoker.invoke(&args).await?;

        if opts.wait {
            match out.status {
                Some(exit_code) => {
                    info!("sandboxed command exited with code {}", exit_code);
                    Ok(StartOutcome {
                        exit_code,
                        stdout: out.stdout,
                    })
                }
                None => Err(out.into_error("launcher killed by signal")),
            }
        } else if out.success() {
            Ok(StartOutcome {
                exit_code: 0,
                stdout: out.stdout,
            })
        } else {
            Err(out.into_error(format!("failed to launch '{}'", command)))
        }
    }

    /// Pids of all processes the engine reports running in a sandbox.
    /// Re-queries the engine on every call; nothing is cached.
    pub async fn running_processes(&self, box_name: Option<&str>) -> Result<Vec<u32>> {
        // The launcher only reports pids reliably once its own run is over,
        // so the query always waits.
        let opts = self.box_opts(box_name).with_wait(true);
        let out = self.control(&opts, "/listpids").await?;
        parse_pid_list(&out.stdout)
    }

    /// Terminate all sandboxed processes in a sandbox. The engine reporting
    /// no matching processes is not an error at this layer.
    pub async fn terminate_processes(&self, box_name: Option<&str>) -> Result<()> {
        self.control(&self.box_opts(box_name), "/terminate").await?;
        info!("terminated processes in '{}'", self.effective_box(box_name));
        Ok(())
    }

    /// Terminate all sandboxed processes in every sandbox.
    pub async fn terminate_all_processes(&self) -> Result<()> {
        self.control(&StartOptions::new(), "/terminate_all").await?;
        info!("terminated processes in all sandboxes");
        Ok(())
    }

    /// Clear a sandbox's virtualized filesystem state. The sandbox's config
    /// section is untouched; only its contents are deleted.
    pub async fn delete_contents(&self, box_name: Option<&str>) -> Result<()> {
        self.start("delete_sandbox_silent", &self.box_opts(box_name))
            .await?;
        info!("deleted contents of '{}'", self.effective_box(box_name));
        Ok(())
    }

    /// Tell the running engine to re-read its config file.
    pub async fn reload_config(&self) -> Result<()> {
        self.control(&StartOptions::new(), "/reload").await?;
        debug!("engine config reloaded");
        Ok(())
    }

    fn effective_box<'a>(&'a self, box_name: Option<&'a str>) -> &'a str {
        box_name.unwrap_or(&self.default_box)
    }

    fn box_opts(&self, box_name: Option<&str>) -> StartOptions {
        let mut opts = StartOptions::new();
        opts.box_name = box_name.map(str::to_string);
        opts
    }

    /// Issue a command-less control flag (/reload, /terminate, ...).
    async fn control(&self, opts: &StartOptions, flag: &str) -> Result<RawOutput> {
        let mut args = self.base_args(opts);
        args.push(flag.to_string());
        let out = self.invoker.invoke(&args).await?;
        if out.success() {
            Ok(out)
        } else {
            Err(out.into_error(format!("{} failed", flag)))
        }
    }

    fn base_args(&self, opts: &StartOptions) -> Vec<String> {
        let mut args = vec![format!("/box:{}", self.effective_box(opts.box_name.as_deref()))];
        if opts.silent {
            args.push("/silent".to_string());
        }
        if opts.wait {
            args.push("/wait".to_string());
        }
        if opts.nosbiectrl {
            args.push("/nosbiectrl".to_string());
        }
        if opts.elevate {
            args.push("/elevate".to_string());
        }
        if opts.disable_forced {
            args.push("/dfp".to_string());
        }
        args
    }
}

/// Parse the launcher's pid listing: whitespace-separated decimal pids.
fn parse_pid_list(stdout: &str) -> Result<Vec<u32>> {
    stdout
        .split_whitespace()
        .map(|token| {
            token.parse::<u32>().map_err(|_| Error::ExternalTool {
                reason: format!("unexpected token '{}' in pid listing", token),
                status: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
        })
        .collect()
}
