//! Interface to the Sandboxie sandboxing engine.
//!
//! Drives an existing Sandboxie installation through its two outward
//! surfaces: the Start.exe launcher and the Sandboxie.ini config file.
//! Sandboxes are created and destroyed by editing config sections; processes
//! are started, listed, and terminated by invoking the launcher and parsing
//! its output. The isolation itself (process interception, filesystem and
//! registry virtualization) happens entirely inside the engine; this crate
//! never tracks sandbox or process state of its own and re-derives both from
//! the engine on every call.
//!
//! ```no_run
//! # async fn demo() -> sandboxie::Result<()> {
//! use sandboxie::{Sandboxie, StartOptions};
//!
//! let sbie = Sandboxie::from_env()?;
//! sbie.create_sandbox("work", [("Enabled", "yes")]).await?;
//! sbie.start("notepad.exe", &StartOptions::new().in_box("work")).await?;
//! let pids = sbie.running_processes(Some("work")).await?;
//! # let _ = pids;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod store;

use tracing::info;

pub use config::SandboxieConfig;
pub use control::{Invoker, ProcessControl, RawOutput, StartOptions, StartOutcome};
pub use error::{Error, Result};
pub use store::document::{IniDocument, SectionOptions};
pub use store::IniStore;

/// Facade composing the configuration store and process control adapters
/// into sandbox lifecycle operations.
pub struct Sandboxie {
    store: IniStore,
    control: ProcessControl,
    default_box: String,
}

impl Sandboxie {
    /// Open an engine installation described by `config`. Fails with
    /// [`Error::ConfigNotFound`] when the engine config file cannot be
    /// located.
    pub fn new(config: SandboxieConfig) -> Result<Self> {
        let ini_path = config.locate_ini()?;
        info!("using engine config at {}", ini_path.display());
        let control = ProcessControl::new(config.launcher_path(), config.default_box.as_str());
        Ok(Self {
            store: IniStore::new(ini_path),
            control,
            default_box: config.default_box,
        })
    }

    /// Open the installation described by the environment
    /// (`SANDBOXIE_INSTALL_DIR`, `WINDIR`) or the stock install location.
    pub fn from_env() -> Result<Self> {
        Self::new(SandboxieConfig::default())
    }

    /// Direct access to the configuration store adapter.
    pub fn store(&self) -> &IniStore {
        &self.store
    }

    /// Direct access to the process control adapter.
    pub fn control(&self) -> &ProcessControl {
        &self.control
    }

    pub fn default_box(&self) -> &str {
        &self.default_box
    }

    /// Create (or extend) the sandbox named `box_name` with the given
    /// options, then tell the running engine to pick up the change.
    pub async fn create_sandbox<I, K, V>(&self, box_name: &str, options: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.store.write_sandbox_options(box_name, options).await?;
        self.control.reload_config().await
    }

    /// Remove the sandbox's config section. Counterpart to
    /// [`Sandboxie::create_sandbox`]; fails with [`Error::SandboxNotFound`]
    /// when no such section exists.
    pub async fn destroy_sandbox(&self, box_name: &str) -> Result<()> {
        self.store.delete_sandbox(box_name).await?;
        self.control.reload_config().await
    }

    /// Options of the named sandbox, freshly read from the config file.
    pub async fn read_sandbox_options(&self, box_name: &str) -> Result<SectionOptions> {
        self.store.read_sandbox_options(box_name).await
    }

    /// Names of all configured sandboxes, freshly read from the config file.
    pub async fn list_sandboxes(&self) -> Result<Vec<String>> {
        self.store.list_sandboxes().await
    }

    /// Launch a command inside a sandbox; see [`ProcessControl::start`] for
    /// the wait/no-wait semantics.
    pub async fn start(&self, command: &str, opts: &StartOptions) -> Result<StartOutcome> {
        self.control.start(command, opts).await
    }

    /// Pids of processes currently running in a sandbox (the default box
    /// when `None`).
    pub async fn running_processes(&self, box_name: Option<&str>) -> Result<Vec<u32>> {
        self.control.running_processes(box_name).await
    }

    /// Terminate all sandboxed processes in a sandbox.
    pub async fn terminate_processes(&self, box_name: Option<&str>) -> Result<()> {
        self.control.terminate_processes(box_name).await
    }

    /// Terminate all sandboxed processes in every sandbox.
    pub async fn terminate_all_processes(&self) -> Result<()> {
        self.control.terminate_all_processes().await
    }

    /// Delete a sandbox's virtualized contents, leaving its config section
    /// intact.
    pub async fn delete_contents(&self, box_name: Option<&str>) -> Result<()> {
        self.control.delete_contents(box_name).await
    }

    /// Tell the running engine to re-read its config file.
    pub async fn reload_config(&self) -> Result<()> {
        self.control.reload_config().await
    }
}
