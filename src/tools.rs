//! External tool invocations behind a small capability trait.
//!
//! The orchestrator depends on this trait rather than concrete command
//! strings, so tests can substitute a fake that fabricates tool results.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use regex::Regex;

pub trait ToolRunner {
    /// Run a program to completion with inherited stdio.
    ///
    /// `Ok(true)` means the tool exited successfully; `Ok(false)` a non-zero
    /// exit; `Err` that it could not be spawned at all.
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<bool>;

    /// True iff `program` is on PATH and answers a `--version` check.
    fn version_check(&self, program: &str) -> bool;

    /// Open a URL or directory with the OS default handler.
    fn open(&self, target: &str) -> Result<()>;
}

/// Real tool invocations on the host system.
pub struct SystemTools;

impl ToolRunner for SystemTools {
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<bool> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let status = cmd
            .status()
            .with_context(|| format!("failed to run {program}"))?;
        Ok(status.success())
    }

    fn version_check(&self, program: &str) -> bool {
        if which::which(program).is_err() {
            return false;
        }
        Command::new(program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn open(&self, target: &str) -> Result<()> {
        opener::open(target).map_err(|e| anyhow::anyhow!("failed to open {target}: {e}"))
    }
}

/// Locate a working python interpreter, trying `python` then `py`.
///
/// Returns the usable command name and the reported version.
pub fn find_python() -> Option<(String, String)> {
    let pattern = Regex::new(r"Python (\S+)").ok()?;
    for candidate in ["python", "py"] {
        let Ok(output) = Command::new(candidate).arg("--version").output() else {
            continue;
        };
        if !output.status.success() {
            continue;
        }
        // older interpreters print the version on stderr
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stdout.trim().is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            stdout.into_owned()
        };
        if let Some(caps) = pattern.captures(text.trim()) {
            return Some((candidate.to_string(), caps[1].to_string()));
        }
    }
    None
}
