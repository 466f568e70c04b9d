//! Launches the companion proxy and the backend and ties their lifetimes
//! together: an operator interrupt during either wait stops both children.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::process::{Child, Command};

use crate::platform::{self, DeviceChoice, Platform};
use crate::session::Session;
use crate::tools::ToolRunner;

/// Lets the proxy print its startup banner before the noisier backend starts.
const PROXY_STARTUP_DELAY: Duration = Duration::from_secs(3);

/// Relative path of the proxy entry point, run from the game directory.
const PROXY_SCRIPT: &str = "python/main.py";

#[derive(Debug, PartialEq, Eq)]
pub struct BackendCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// Platform-dependent executable and device-dependent argument vector for
/// the backend process.
pub fn backend_command(session: &Session, device: DeviceChoice) -> Result<BackendCommand> {
    let mut cmd = match session.platform {
        Platform::Windows => BackendCommand {
            program: r".\python_embeded\python.exe".to_string(),
            args: vec![
                "-s".to_string(),
                r"ComfyUI\main.py".to_string(),
                "--windows-standalone-build".to_string(),
                "--lowvram".to_string(),
                "--disable-auto-launch".to_string(),
            ],
            cwd: Some(session.install_root()?.to_path_buf()),
        },
        Platform::Linux => BackendCommand {
            program: session.python.clone(),
            args: vec![
                session.app_dir()?.join("main.py").to_string_lossy().into_owned(),
                "--lowvram".to_string(),
                "--disable-auto-launch".to_string(),
            ],
            cwd: None,
        },
    };
    if device == DeviceChoice::Cpu {
        cmd.args.push("--cpu".to_string());
    }
    Ok(cmd)
}

/// Reinstall the torch stack when the device changed since the last run, then
/// install the backend requirements. All invocations are best-effort, matching
/// the underlying tools' own error reporting.
fn prepare_linux_runtime(
    session: &Session,
    device: DeviceChoice,
    tools: &impl ToolRunner,
) -> Result<()> {
    let device_file = session.device_file();
    let last = platform::load_last_device(&device_file);

    if device != DeviceChoice::Cpu && last != Some(device) {
        info!("device changed since last run - removing torch for reinstall");
        if !tools.run("pip", &["uninstall", "-y", "torch"], None).unwrap_or(false) {
            warn!("pip uninstall torch did not succeed - continuing");
        }
    }

    let torch = ["install", "torch", "torchvision", "torchaudio"];
    let installed = match device {
        DeviceChoice::Cpu => tools.run("pip", &torch, None),
        DeviceChoice::Nvidia => {
            let mut args = torch.to_vec();
            args.extend(["--extra-index-url", "https://download.pytorch.org/whl/cu124"]);
            tools.run("pip", &args, None)
        }
        DeviceChoice::Amd => {
            let mut args = torch.to_vec();
            args.extend(["--index-url", "https://download.pytorch.org/whl/rocm6.1"]);
            tools.run("pip", &args, None)
        }
    };
    if !installed.unwrap_or(false) {
        warn!("torch install did not succeed - the backend may fall back or fail");
    }

    platform::store_last_device(&device_file, device)?;

    let requirements = session.app_dir()?.join("requirements.txt");
    let req_arg = requirements.to_string_lossy();
    if !tools
        .run("pip", &["install", "-r", req_arg.as_ref()], None)
        .unwrap_or(false)
    {
        warn!("failed to install backend requirements - continuing");
    }
    Ok(())
}

/// Launch both processes and block until they exit or the operator interrupts.
pub async fn run(session: &Session, device: DeviceChoice, tools: &impl ToolRunner) -> Result<()> {
    if session.platform == Platform::Linux {
        prepare_linux_runtime(session, device, tools)?;
    }

    println!("Running ComfyUI.");
    let mut proxy = Command::new(&session.python)
        .arg(PROXY_SCRIPT)
        .spawn()
        .context("failed to launch the proxy process")?;

    tokio::time::sleep(PROXY_STARTUP_DELAY).await;

    let plan = backend_command(session, device)?;
    let mut command = Command::new(&plan.program);
    command.args(&plan.args);
    if let Some(cwd) = &plan.cwd {
        command.current_dir(cwd);
    }
    let mut backend = command
        .spawn()
        .with_context(|| format!("failed to launch the backend ({})", plan.program))?;

    wait_both(&mut proxy, &mut backend).await
}

/// Sequential waits, proxy first. Exit codes are not inspected; an interrupt
/// during either wait terminates both children before returning.
async fn wait_both(proxy: &mut Child, backend: &mut Child) -> Result<()> {
    tokio::select! {
        res = async {
            proxy.wait().await?;
            backend.wait().await?;
            Ok::<_, std::io::Error>(())
        } => {
            res.context("failed while waiting on child processes")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received - stopping proxy and backend");
            terminate(proxy);
            terminate(backend);
        }
    }
    Ok(())
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else { return };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!("failed to signal pid {pid}: {e}");
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("failed to kill child process: {e}");
    }
}
