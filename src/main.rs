mod assets;
mod cli;
mod installer;
mod platform;
mod prompt;
mod remote;
mod session;
mod state;
mod supervisor;
mod tools;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use crate::installer::Installer;
use crate::platform::Platform;
use crate::prompt::ConsolePrompt;
use crate::remote::RemoteClient;
use crate::session::Session;
use crate::tools::SystemTools;

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            eprintln!("The installer cannot run without an async runtime.");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<()> {
    let args = cli::Cli::parse();

    let platform = Platform::detect()?;
    println!("Running comfy-sidecar on operating system {platform}.");

    let (python, version) = tools::find_python().context(
        "python must be installed before continuing; the recommended version is 3.10.9, \
         available at https://www.python.org/downloads/release/python-3109/",
    )?;
    info!("found python ({python}) of version {version}");

    let mut session = Session::new(platform, args.tools_dir, python);
    let remote = RemoteClient::new()?;
    let tools = SystemTools;
    let mut prompt = ConsolePrompt;

    Installer::new(&remote, &tools, &mut prompt)
        .install(&mut session)
        .await?;

    if args.no_launch {
        info!("--no-launch set - skipping backend start");
        return Ok(());
    }

    let device = platform::resolve_device(platform, &mut prompt)?;
    supervisor::run(&session, device, &tools).await
}
