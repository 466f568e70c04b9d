//! Host platform detection and compute device resolution.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;

use crate::prompt::UserPrompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
}

impl Platform {
    /// Detect the host OS family. Anything outside the supported pair is a
    /// fatal, user-visible error.
    pub fn detect() -> Result<Self> {
        match std::env::consts::OS {
            "windows" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            other => Err(anyhow::anyhow!(
                "operating system {other} is unsupported; available platforms are: Windows, Linux"
            )),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "Windows"),
            Self::Linux => write!(f, "Linux"),
        }
    }
}

/// Compute device class the backend will generate on.
///
/// The integer codes are the on-disk representation in the `device` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChoice {
    Cpu,
    Nvidia,
    Amd,
}

impl DeviceChoice {
    pub fn code(self) -> u8 {
        match self {
            Self::Cpu => 0,
            Self::Nvidia => 1,
            Self::Amd => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Cpu),
            1 => Some(Self::Nvidia),
            2 => Some(Self::Amd),
            _ => None,
        }
    }
}

/// Interactively resolve which device to generate on.
///
/// AMD is only offered on Linux; on Windows a non-NVIDIA card falls back to
/// CPU with a warning.
pub fn resolve_device(platform: Platform, prompt: &mut impl UserPrompt) -> Result<DeviceChoice> {
    if !prompt.confirm("Will you be running image generation on your graphics card?")? {
        return Ok(DeviceChoice::Cpu);
    }
    if prompt.confirm("Is your graphics card a NVIDIA one?")? {
        return Ok(DeviceChoice::Nvidia);
    }
    if platform == Platform::Linux {
        if prompt.confirm("Is your graphics card a AMD one?")? {
            return Ok(DeviceChoice::Amd);
        }
        warn!("unsupported graphics card - image generation will run on the CPU");
        return Ok(DeviceChoice::Cpu);
    }
    warn!("only NVIDIA cards are supported on Windows - image generation will run on the CPU");
    Ok(DeviceChoice::Cpu)
}

/// Read the last device used from its flat file.
///
/// A missing or unparsable file means "no prior value", never an error; the
/// caller only uses this to decide whether the compute runtime needs a
/// reinstall.
pub fn load_last_device(path: &Path) -> Option<DeviceChoice> {
    let text = fs::read_to_string(path).ok()?;
    let code: u8 = text.trim().parse().ok()?;
    DeviceChoice::from_code(code)
}

/// Persist the device used for this run.
pub fn store_last_device(path: &Path, device: DeviceChoice) -> Result<()> {
    fs::write(path, device.code().to_string())
        .with_context(|| format!("failed to write device file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    struct Scripted {
        answers: Vec<bool>,
        next: usize,
    }

    impl Scripted {
        fn new(answers: &[bool]) -> Self {
            Self {
                answers: answers.to_vec(),
                next: 0,
            }
        }

        fn exhausted(&self) -> bool {
            self.next == self.answers.len()
        }
    }

    impl UserPrompt for Scripted {
        fn confirm(&mut self, _question: &str) -> Result<bool> {
            let answer = self.answers[self.next];
            self.next += 1;
            Ok(answer)
        }

        fn await_ready(&mut self, _message: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn no_gpu_is_cpu_without_further_prompts() {
        let mut prompt = Scripted::new(&[false]);
        let device = resolve_device(Platform::Linux, &mut prompt).unwrap();
        assert_eq!(device, DeviceChoice::Cpu);
        assert!(prompt.exhausted());
    }

    #[test]
    fn nvidia_answered_on_second_prompt() {
        let mut prompt = Scripted::new(&[true, true]);
        let device = resolve_device(Platform::Linux, &mut prompt).unwrap();
        assert_eq!(device, DeviceChoice::Nvidia);
        assert!(prompt.exhausted());
    }

    #[test]
    fn amd_offered_on_linux() {
        let mut prompt = Scripted::new(&[true, false, true]);
        let device = resolve_device(Platform::Linux, &mut prompt).unwrap();
        assert_eq!(device, DeviceChoice::Amd);
        assert!(prompt.exhausted());
    }

    #[test]
    fn unknown_linux_gpu_falls_back_to_cpu() {
        let mut prompt = Scripted::new(&[true, false, false]);
        let device = resolve_device(Platform::Linux, &mut prompt).unwrap();
        assert_eq!(device, DeviceChoice::Cpu);
        assert!(prompt.exhausted());
    }

    #[test]
    fn amd_not_offered_on_windows() {
        let mut prompt = Scripted::new(&[true, false]);
        let device = resolve_device(Platform::Windows, &mut prompt).unwrap();
        assert_eq!(device, DeviceChoice::Cpu);
        assert!(prompt.exhausted());
    }

    #[test]
    fn device_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device");
        store_last_device(&path, DeviceChoice::Nvidia).unwrap();
        assert_eq!(load_last_device(&path), Some(DeviceChoice::Nvidia));
    }

    #[test]
    fn missing_device_file_is_no_prior_value() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_last_device(&dir.path().join("device")), None);
    }

    #[test]
    fn garbage_device_file_is_no_prior_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device");
        fs::write(&path, "gpu please").unwrap();
        assert_eq!(load_last_device(&path), None);
        fs::write(&path, "7").unwrap();
        assert_eq!(load_last_device(&path), None);
    }
}
