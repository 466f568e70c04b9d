//! Idempotent checks of what is already installed on disk.
//!
//! Pure reads, repeated freely; disk state may change between calls by user
//! action, so nothing is cached.

use std::path::Path;

use log::info;

use crate::assets;

/// True iff the installation root exists at all.
pub fn application_installed(root: &Path) -> bool {
    root.exists()
}

/// True iff every required checkpoint and LoRA exists under its designated
/// subdirectory, by exact filename. Logs the first miss and short-circuits.
///
/// A differently-named but otherwise correct file is never recognised.
pub fn has_all_required_models(checkpoints_dir: &Path, loras_dir: &Path) -> bool {
    for asset in assets::CHECKPOINTS {
        let path = checkpoints_dir.join(asset.name);
        if !path.exists() {
            info!("missing checkpoint: {}", path.display());
            return false;
        }
    }
    for asset in assets::LORAS {
        let path = loras_dir.join(asset.name);
        if !path.exists() {
            info!("missing LoRA: {}", path.display());
            return false;
        }
    }
    true
}
