//! Fixed upstream endpoints: the backend repository, its plugin set, and the
//! model weight files that must be on disk before generation can run.

pub const COMFYUI_REPOSITORY_URL: &str = "https://github.com/comfyanonymous/ComfyUI";
pub const COMFYUI_RELEASES_API_URL: &str =
    "https://api.github.com/repos/comfyanonymous/ComfyUI/releases/latest";

/// Portable release asset installed on Windows.
pub const WINDOWS_PORTABLE_ARCHIVE: &str = "ComfyUI_windows_portable_nvidia.7z";

/// Custom node repositories cloned into `custom_nodes`, each best-effort.
pub const CUSTOM_NODE_REPOSITORIES: &[&str] = &[
    "https://github.com/ltdrdata/ComfyUI-Manager",
    "https://github.com/Fannovel16/comfyui_controlnet_aux",
    "https://github.com/jags111/efficiency-nodes-comfyui",
    "https://github.com/WASasquatch/was-node-suite-comfyui",
];

/// A model file the backend needs, with an automatic and a manual source.
///
/// The mirror URL is a direct-hosted copy used for unattended downloads; the
/// page URL is the aggregator page the user is sent to when the mirror is down.
#[derive(Debug)]
pub struct RequiredAsset {
    pub name: &'static str,
    pub mirror_url: &'static str,
    pub page_url: &'static str,
}

pub const CHECKPOINTS: &[RequiredAsset] = &[RequiredAsset {
    name: "PonyV6HassakuXLHentai.safetensors",
    mirror_url: "https://huggingface.co/FloricSpacer/AbyssDiverModels/resolve/main/hassakuXLPony_v13BetterEyesVersion.safetensors?download=true",
    page_url: "https://civitai.com/api/download/models/575495?type=Model&format=SafeTensor&size=pruned&fp=bf16",
}];

pub const LORAS: &[RequiredAsset] = &[RequiredAsset {
    name: "Dalle3_AnimeStyle_PONY_Lora.safetensors",
    mirror_url: "https://huggingface.co/FloricSpacer/AbyssDiverModels/resolve/main/DallE3-magik.safetensors?download=true",
    page_url: "https://civitai.com/api/download/models/695621?type=Model&format=SafeTensor",
}];

/// Disk space the full install adds up to, surfaced before anything heavy runs.
pub const BACKEND_SIZE_GB: f64 = 9.0;
pub const CONTENT_SIZE_GB: f64 = 7.1;

/// Every required asset, checkpoints first.
pub fn all_required() -> impl Iterator<Item = &'static RequiredAsset> {
    CHECKPOINTS.iter().chain(LORAS.iter())
}
