//! Per-run context threaded by reference through the installer and the
//! supervisor, replacing any process-wide mutable state.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::platform::Platform;

pub struct Session {
    pub platform: Platform,
    pub tools_dir: PathBuf,
    /// Resolved python command, `python` or `py`.
    pub python: String,
    install_root: Option<PathBuf>,
}

impl Session {
    pub fn new(platform: Platform, tools_dir: PathBuf, python: String) -> Self {
        Self {
            platform,
            tools_dir,
            python,
            install_root: None,
        }
    }

    /// Where the backend lands under the tools directory for this platform.
    pub fn default_install_root(&self) -> PathBuf {
        match self.platform {
            Platform::Windows => self.tools_dir.join("ComfyUI_windows_portable"),
            Platform::Linux => self.tools_dir.join("ComfyUI"),
        }
    }

    /// Fix the installation root for the rest of the run, as an absolute path.
    pub fn set_install_root(&mut self, root: &Path) -> Result<()> {
        let absolute = std::path::absolute(root)
            .with_context(|| format!("failed to resolve {}", root.display()))?;
        self.install_root = Some(absolute);
        Ok(())
    }

    pub fn install_root(&self) -> Result<&Path> {
        self.install_root
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("installation root has not been resolved yet"))
    }

    /// Directory holding `main.py`, `models` and `custom_nodes`. The Windows
    /// portable tree nests it one level deeper than the Linux clone.
    pub fn app_dir(&self) -> Result<PathBuf> {
        let root = self.install_root()?;
        Ok(match self.platform {
            Platform::Windows => root.join("ComfyUI"),
            Platform::Linux => root.to_path_buf(),
        })
    }

    pub fn checkpoints_dir(&self) -> Result<PathBuf> {
        Ok(self.app_dir()?.join("models").join("checkpoints"))
    }

    pub fn loras_dir(&self) -> Result<PathBuf> {
        Ok(self.app_dir()?.join("models").join("loras"))
    }

    pub fn custom_nodes_dir(&self) -> Result<PathBuf> {
        Ok(self.app_dir()?.join("custom_nodes"))
    }

    /// Flat file remembering the last device used.
    pub fn device_file(&self) -> PathBuf {
        self.tools_dir.join("device")
    }
}
