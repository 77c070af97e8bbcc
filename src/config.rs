//! Engine location configuration
//!
//! Where the Sandboxie installation, its launcher, and its INI config live.
//! Values come from an optional TOML file, falling back to environment
//! variables and the stock install location.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Box used when operations are given no explicit box name.
pub const DEFAULT_BOX: &str = "DefaultBox";

const DEFAULT_INSTALL_DIR: &str = r"C:\Program Files\Sandboxie";
const LAUNCHER_EXE: &str = "Start.exe";
const INI_FILE: &str = "Sandboxie.ini";

/// Location of the engine installation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxieConfig {
    /// Engine installation directory. Defaults to the
    /// `SANDBOXIE_INSTALL_DIR` environment variable, then the stock path.
    pub install_dir: PathBuf,
    /// Default sandbox name.
    pub default_box: String,
    /// Explicit path to the engine config file, skipping discovery.
    pub config_path: Option<PathBuf>,
    /// Explicit path to the launcher; Start.exe under `install_dir` when
    /// unset.
    pub launcher_path: Option<PathBuf>,
}

impl Default for SandboxieConfig {
    fn default() -> Self {
        Self {
            install_dir: std::env::var("SANDBOXIE_INSTALL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_INSTALL_DIR)),
            default_box: DEFAULT_BOX.to_string(),
            config_path: None,
            launcher_path: None,
        }
    }
}

impl SandboxieConfig {
    /// Load from a TOML file; unset keys keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| Error::ConfigFormat(e.to_string()))
    }

    pub fn launcher_path(&self) -> PathBuf {
        self.launcher_path
            .clone()
            .unwrap_or_else(|| self.install_dir.join(LAUNCHER_EXE))
    }

    /// Locate the engine config file.
    ///
    /// The engine keeps Sandboxie.ini either in the Windows directory (named
    /// by the `WINDIR` environment variable) or in the install dir, checked
    /// in that order. An explicit `config_path` skips discovery but must
    /// still exist.
    pub fn locate_ini(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config_path {
            return if path.exists() {
                Ok(path.clone())
            } else {
                Err(Error::ConfigNotFound)
            };
        }

        let mut candidates = Vec::new();
        if let Ok(windir) = std::env::var("WINDIR") {
            candidates.push(PathBuf::from(windir).join(INI_FILE));
        }
        candidates.push(self.install_dir.join(INI_FILE));

        candidates
            .into_iter()
            .find(|path| path.exists())
            .ok_or(Error::ConfigNotFound)
    }
}
