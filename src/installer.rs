//! Acquisition orchestrator: backend application, custom nodes, and model
//! weights, installed per platform with idempotent re-checks throughout.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use log::{info, warn};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::assets::{self, RequiredAsset};
use crate::platform::Platform;
use crate::prompt::UserPrompt;
use crate::remote::{self, RemoteSource};
use crate::session::Session;
use crate::state;
use crate::tools::ToolRunner;

pub struct Installer<'a, R, T, P> {
    remote: &'a R,
    tools: &'a T,
    prompt: &'a mut P,
}

impl<'a, R: RemoteSource, T: ToolRunner, P: UserPrompt> Installer<'a, R, T, P> {
    pub fn new(remote: &'a R, tools: &'a T, prompt: &'a mut P) -> Self {
        Self {
            remote,
            tools,
            prompt,
        }
    }

    /// Drive the end-to-end install sequence. Safe to re-run; every step
    /// checks disk state before doing work.
    pub async fn install(&mut self, session: &mut Session) -> Result<()> {
        let root = session.default_install_root();
        if state::application_installed(&root) {
            info!(
                "backend already present at {} - skipping download",
                root.display()
            );
        } else {
            self.ensure_git(session.platform)?;
            match session.platform {
                Platform::Linux => self.clone_backend(&root)?,
                Platform::Windows => self.fetch_portable_release(&session.tools_dir).await?,
            }
        }
        session.set_install_root(&root)?;

        let checkpoints_dir = session.checkpoints_dir()?;
        let loras_dir = session.loras_dir()?;

        if !state::has_all_required_models(&checkpoints_dir, &loras_dir) {
            show_size_warning();
            self.prompt.await_ready("Press enter to continue...")?;
        }

        println!("ComfyUI is located at: {}", session.install_root()?.display());
        self.install_custom_nodes(&session.custom_nodes_dir()?)?;

        if state::has_all_required_models(&checkpoints_dir, &loras_dir) {
            info!("all models are already downloaded - skipping step");
            return Ok(());
        }

        if self.mirror_available().await {
            info!("mirror is available - automatically downloading models");
            self.download_models(&checkpoints_dir, &loras_dir).await?;
        } else {
            warn!("mirror unavailable - manual installation needed");
            self.manual_models(&checkpoints_dir, &loras_dir)?;
        }
        Ok(())
    }

    /// Block until a git version check succeeds. No timeout; the operator
    /// unblocks this by installing git.
    fn ensure_git(&mut self, platform: Platform) -> Result<()> {
        while !self.tools.version_check("git") {
            println!("git is required to download ComfyUI and its custom nodes.");
            match platform {
                Platform::Windows => {
                    println!(
                        "Install it by visiting https://git-scm.com/downloads and picking the Windows 64-bit version."
                    );
                    println!("For most options you can press next; if you aren't sure, press next.");
                }
                Platform::Linux => {
                    println!("Install it with `sudo apt update && sudo apt install -y git`.");
                }
            }
            self.prompt
                .await_ready("Press enter to continue once git is installed...")?;
        }
        Ok(())
    }

    fn clone_backend(&self, root: &Path) -> Result<()> {
        info!("cloning {}", assets::COMFYUI_REPOSITORY_URL);
        let dest = root.to_string_lossy();
        let ok = self.tools.run(
            "git",
            &["clone", assets::COMFYUI_REPOSITORY_URL, dest.as_ref()],
            None,
        )?;
        ensure!(ok, "failed to clone {}", assets::COMFYUI_REPOSITORY_URL);
        Ok(())
    }

    /// Download the latest portable release archive and unpack it into the
    /// tools directory.
    async fn fetch_portable_release(&mut self, tools_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(tools_dir)
            .await
            .with_context(|| format!("failed to create {}", tools_dir.display()))?;

        let archive = tools_dir.join(assets::WINDOWS_PORTABLE_ARCHIVE);
        if archive.exists() {
            info!(
                "{} has already been downloaded - delete it to re-download",
                archive.display()
            );
        } else {
            let release = self
                .remote
                .latest_release(assets::COMFYUI_RELEASES_API_URL)
                .await?;
            let asset = remote::find_asset(&release, assets::WINDOWS_PORTABLE_ARCHIVE)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "the latest ComfyUI release has no asset named {}",
                        assets::WINDOWS_PORTABLE_ARCHIVE
                    )
                })?;
            self.remote.download(&asset.download_url, &archive).await?;
        }

        info!("extracting {}", archive.display());
        let extracted = self
            .tools
            .run(
                "7z",
                &["x", assets::WINDOWS_PORTABLE_ARCHIVE, "-y"],
                Some(tools_dir),
            )
            .unwrap_or(false);
        if !extracted {
            println!(
                "Failed to extract {} - please extract it into {} yourself.",
                assets::WINDOWS_PORTABLE_ARCHIVE,
                tools_dir.display()
            );
            self.prompt
                .await_ready("Press enter to continue once extracted...")?;
        }
        Ok(())
    }

    /// Clone the fixed custom node list. Each clone is independent and
    /// best-effort; a failure is logged and the loop continues.
    fn install_custom_nodes(&self, custom_nodes_dir: &Path) -> Result<()> {
        info!("installing ComfyUI custom nodes");
        std::fs::create_dir_all(custom_nodes_dir)
            .with_context(|| format!("failed to create {}", custom_nodes_dir.display()))?;
        for url in assets::CUSTOM_NODE_REPOSITORIES {
            let name = url.rsplit('/').next().unwrap_or(url);
            if custom_nodes_dir.join(name).exists() {
                continue;
            }
            match self.tools.run("git", &["clone", url], Some(custom_nodes_dir)) {
                Ok(true) => {}
                Ok(false) => warn!("failed to clone {url} - continuing"),
                Err(e) => warn!("could not run git for {url}: {e:#}"),
            }
        }
        info!("installed ComfyUI custom nodes");
        Ok(())
    }

    /// The mirror is usable only if every required asset answers 200.
    async fn mirror_available(&self) -> bool {
        for asset in assets::all_required() {
            let ok = match self.remote.probe(asset.mirror_url).await {
                Ok(ok) => ok,
                Err(e) => {
                    warn!("probe of {} failed: {e:#}", asset.mirror_url);
                    false
                }
            };
            if !ok {
                warn!("model {} is unavailable on the mirror", asset.name);
                return false;
            }
        }
        true
    }

    /// Automatic path: any download failure here is fatal to the run.
    async fn download_models(&self, checkpoints_dir: &Path, loras_dir: &Path) -> Result<()> {
        for (dir, set) in [(checkpoints_dir, assets::CHECKPOINTS), (loras_dir, assets::LORAS)] {
            for asset in set {
                let dest = dir.join(asset.name);
                if dest.exists() {
                    continue;
                }
                println!("{}", asset.name);
                self.remote
                    .download(asset.mirror_url, &dest)
                    .await
                    .with_context(|| format!("failed to download model file {}", asset.name))?;
            }
        }
        Ok(())
    }

    /// Manual path: open the asset page and destination folder, then poll
    /// for the exact expected filename until the operator has placed it.
    fn manual_models(&mut self, checkpoints_dir: &Path, loras_dir: &Path) -> Result<()> {
        let total = assets::CHECKPOINTS.len() + assets::LORAS.len();
        println!("For this section you will be manually downloading safetensor files and placing them in the given directories.");
        println!("Both the directory and the download will automatically open when you proceed.");
        println!("This is REQUIRED to run the local generation.");
        println!("You will need to download a total of {total} files.");
        self.prompt.await_ready("Press enter to continue...")?;

        self.manual_asset_set(checkpoints_dir, assets::CHECKPOINTS, "model")?;
        self.manual_asset_set(loras_dir, assets::LORAS, "LoRA")
    }

    fn manual_asset_set(
        &mut self,
        folder: &Path,
        set: &'static [RequiredAsset],
        kind: &str,
    ) -> Result<()> {
        std::fs::create_dir_all(folder)
            .with_context(|| format!("failed to create {}", folder.display()))?;
        for (index, asset) in set.iter().enumerate() {
            let dest = folder.join(asset.name);
            if dest.exists() {
                println!("{} already exists.", asset.name);
                continue;
            }
            println!("{} / {}", index + 1, set.len());
            println!("Due to age restrictions you have to download this {kind} manually.");
            println!("Download the following {kind}: {}", asset.page_url);
            println!("Place it in the folder: {}", folder.display());
            println!("Rename the file to {}.", asset.name);
            if let Err(e) = self.tools.open(asset.page_url) {
                warn!("could not open browser: {e:#}");
            }
            if let Err(e) = self.tools.open(folder.to_string_lossy().as_ref()) {
                warn!("could not open folder: {e:#}");
            }
            // Presence is checked by exact filename only; a renamed download
            // is never recognised and the loop keeps prompting.
            loop {
                self.prompt
                    .await_ready("Press enter to continue once downloaded...")?;
                if dest.exists() {
                    break;
                }
                println!(
                    "You have not renamed the file or placed it in the directory {}!",
                    folder.display()
                );
                println!(
                    "Make sure to rename the downloaded file to {} and place it in the directory above.",
                    asset.name
                );
            }
        }
        Ok(())
    }
}

fn show_size_warning() {
    let total = assets::BACKEND_SIZE_GB + assets::CONTENT_SIZE_GB;
    let mut stdout = StandardStream::stdout(ColorChoice::Always);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
    let _ = writeln!(stdout, "{}", "=".repeat(20));
    let _ = writeln!(
        stdout,
        "Note: the ComfyUI install will add up to over {} GB.",
        assets::BACKEND_SIZE_GB
    );
    let _ = writeln!(
        stdout,
        "Note: the generated content will add up to {} GB.",
        assets::CONTENT_SIZE_GB
    );
    let _ = writeln!(stdout, "You will need a total of at least {total:.1} GB available.");
    let _ = writeln!(stdout, "{}", "=".repeat(20));
    let _ = stdout.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ReleaseAsset;
    use std::cell::RefCell;
    use std::path::PathBuf;

    struct FakeRemote {
        available: bool,
        downloads: RefCell<Vec<String>>,
    }

    impl FakeRemote {
        fn new(available: bool) -> Self {
            Self {
                available,
                downloads: RefCell::new(Vec::new()),
            }
        }
    }

    impl RemoteSource for FakeRemote {
        async fn probe(&self, _url: &str) -> Result<bool> {
            Ok(self.available)
        }

        async fn download(&self, url: &str, dest: &Path) -> Result<()> {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest, b"weights")?;
            self.downloads.borrow_mut().push(url.to_string());
            Ok(())
        }

        async fn latest_release(&self, _api_url: &str) -> Result<Vec<ReleaseAsset>> {
            Ok(Vec::new())
        }
    }

    /// Pretends every tool exists; `git clone` just creates the destination.
    struct FakeTools;

    impl ToolRunner for FakeTools {
        fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<bool> {
            if program == "git" && args.first() == Some(&"clone") {
                let dest = match args.get(2) {
                    Some(explicit) => PathBuf::from(explicit),
                    None => {
                        let url = args[1];
                        let name = url.rsplit('/').next().unwrap_or(url);
                        cwd.unwrap_or(Path::new(".")).join(name)
                    }
                };
                std::fs::create_dir_all(dest)?;
            }
            Ok(true)
        }

        fn version_check(&self, _program: &str) -> bool {
            true
        }

        fn open(&self, _target: &str) -> Result<()> {
            Ok(())
        }
    }

    /// Counts enter-prompts and refuses yes/no questions outright.
    struct CountingPrompt {
        ready_calls: usize,
    }

    impl UserPrompt for CountingPrompt {
        fn confirm(&mut self, question: &str) -> Result<bool> {
            panic!("unexpected confirm: {question}");
        }

        fn await_ready(&mut self, _message: &str) -> Result<()> {
            self.ready_calls += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn fresh_linux_install_with_available_mirror_is_fully_automatic() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(
            Platform::Linux,
            dir.path().join("tools"),
            "python3".to_string(),
        );
        let remote = FakeRemote::new(true);
        let tools = FakeTools;
        let mut prompt = CountingPrompt { ready_calls: 0 };

        Installer::new(&remote, &tools, &mut prompt)
            .install(&mut session)
            .await
            .unwrap();

        // the size warning is the only acknowledgment; no manual asset prompts
        assert_eq!(prompt.ready_calls, 1);

        let expected: Vec<String> = assets::all_required()
            .map(|a| a.mirror_url.to_string())
            .collect();
        assert_eq!(*remote.downloads.borrow(), expected);

        let checkpoints = session.checkpoints_dir().unwrap();
        let loras = session.loras_dir().unwrap();
        assert!(state::has_all_required_models(&checkpoints, &loras));
        for url in assets::CUSTOM_NODE_REPOSITORIES {
            let name = url.rsplit('/').next().unwrap();
            assert!(session.custom_nodes_dir().unwrap().join(name).exists());
        }
    }

    #[tokio::test]
    async fn rerun_with_everything_present_downloads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(
            Platform::Linux,
            dir.path().join("tools"),
            "python3".to_string(),
        );
        let remote = FakeRemote::new(true);
        let tools = FakeTools;
        let mut prompt = CountingPrompt { ready_calls: 0 };
        Installer::new(&remote, &tools, &mut prompt)
            .install(&mut session)
            .await
            .unwrap();
        remote.downloads.borrow_mut().clear();

        let mut session = Session::new(
            Platform::Linux,
            dir.path().join("tools"),
            "python3".to_string(),
        );
        let mut prompt = CountingPrompt { ready_calls: 0 };
        Installer::new(&remote, &tools, &mut prompt)
            .install(&mut session)
            .await
            .unwrap();

        assert_eq!(prompt.ready_calls, 0);
        assert!(remote.downloads.borrow().is_empty());
    }

    /// Answers 200 for everything except one URL.
    struct OneMissingRemote {
        unavailable: &'static str,
    }

    impl RemoteSource for OneMissingRemote {
        async fn probe(&self, url: &str) -> Result<bool> {
            Ok(url != self.unavailable)
        }

        async fn download(&self, _url: &str, _dest: &Path) -> Result<()> {
            unreachable!("mirror checks never download")
        }

        async fn latest_release(&self, _api_url: &str) -> Result<Vec<ReleaseAsset>> {
            unreachable!("mirror checks never query releases")
        }
    }

    #[tokio::test]
    async fn one_unavailable_mirror_url_disables_the_mirror() {
        let tools = FakeTools;
        let mut prompt = CountingPrompt { ready_calls: 0 };

        let remote = FakeRemote::new(true);
        let installer = Installer::new(&remote, &tools, &mut prompt);
        assert!(installer.mirror_available().await);

        let remote = OneMissingRemote {
            unavailable: assets::LORAS[0].mirror_url,
        };
        let installer = Installer::new(&remote, &tools, &mut prompt);
        assert!(!installer.mirror_available().await);
    }
}
