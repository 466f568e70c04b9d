//! CLI argument parsing for comfy-sidecar

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Clone)]
#[command(name = "comfy-sidecar")]
#[command(version, about = "Install and run the local ComfyUI generation backend")]
pub struct Cli {
    /// Directory the backend and its release archives are installed into
    #[arg(long, default_value = "tools")]
    pub tools_dir: PathBuf,

    /// Install and verify only - do not launch the proxy and backend
    #[arg(long)]
    pub no_launch: bool,
}
