//! HTTP access to release manifests, mirror probes, and streamed downloads
//! with progress reporting.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// One downloadable artifact from an upstream release manifest.
///
/// Extra manifest fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseManifest {
    zipball_url: String,
    tarball_url: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

/// Pseudo-assets for the source archives first, then every published asset
/// verbatim.
fn manifest_assets(manifest: ReleaseManifest) -> Vec<ReleaseAsset> {
    let mut out = Vec::with_capacity(manifest.assets.len() + 2);
    out.push(ReleaseAsset {
        name: "source.zip".to_string(),
        download_url: manifest.zipball_url,
    });
    out.push(ReleaseAsset {
        name: "source.tar.gz".to_string(),
        download_url: manifest.tarball_url,
    });
    out.extend(manifest.assets);
    out
}

pub fn find_asset<'a>(assets: &'a [ReleaseAsset], name: &str) -> Option<&'a ReleaseAsset> {
    assets.iter().find(|a| a.name == name)
}

/// Remote operations the orchestrator needs, as a seam for scripted fakes.
pub trait RemoteSource {
    /// True iff the URL answers HTTP 200. The body is not consumed.
    async fn probe(&self, url: &str) -> Result<bool>;

    /// Stream the response body to `dest`, reporting progress. An absent
    /// `Content-Length` degrades to unbounded progress, never an error.
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Resolve the latest release of a project to its downloadable files.
    async fn latest_release(&self, api_url: &str) -> Result<Vec<ReleaseAsset>>;
}

pub struct RemoteClient {
    http: reqwest::Client,
}

impl RemoteClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("comfy-sidecar/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http })
    }
}

impl RemoteSource for RemoteClient {
    async fn probe(&self, url: &str) -> Result<bool> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to probe {url}"))?;
        Ok(response.status() == reqwest::StatusCode::OK)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to request {url}"))?;
        if !response.status().is_success() {
            bail!("download of {url} failed: HTTP {}", response.status());
        }

        let bar = match response.content_length() {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("   [{bar:50.green/blue}] {bytes}/{total_bytes}  {msg}")
                        .context("invalid progress bar template")?
                        .progress_chars("█▓░"),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("   {spinner} {bytes}  {msg}")
                        .context("invalid progress bar template")?,
                );
                bar
            }
        };
        bar.set_message(
            dest.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("network error while downloading {url}"))?;
            file.write_all(&chunk)
                .await
                .with_context(|| format!("failed to write {}", dest.display()))?;
            bar.inc(chunk.len() as u64);
        }
        file.flush().await?;
        bar.finish_and_clear();
        Ok(())
    }

    async fn latest_release(&self, api_url: &str) -> Result<Vec<ReleaseAsset>> {
        let response = self
            .http
            .get(api_url)
            .send()
            .await
            .with_context(|| format!("failed to query {api_url}"))?;
        if !response.status().is_success() {
            bail!("release query {api_url} failed: HTTP {}", response.status());
        }
        let manifest: ReleaseManifest = response
            .json()
            .await
            .context("failed to decode release manifest")?;
        Ok(manifest_assets(manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn manifest_assets_prepends_source_archives_in_order() {
        let manifest: ReleaseManifest = serde_json::from_value(json!({
            "zipball_url": "https://example.com/zip",
            "tarball_url": "https://example.com/tar",
            "tag_name": "v1.2.3",
            "assets": [
                {"name": "x.zip", "browser_download_url": "https://example.com/x.zip", "size": 42}
            ]
        }))
        .unwrap();

        let assets = manifest_assets(manifest);
        assert_eq!(assets.len(), 3);
        assert_eq!(assets[0].name, "source.zip");
        assert_eq!(assets[0].download_url, "https://example.com/zip");
        assert_eq!(assets[1].name, "source.tar.gz");
        assert_eq!(assets[1].download_url, "https://example.com/tar");
        assert_eq!(assets[2].name, "x.zip");
        assert_eq!(assets[2].download_url, "https://example.com/x.zip");
    }

    #[test]
    fn manifest_without_assets_still_yields_source_archives() {
        let manifest: ReleaseManifest = serde_json::from_value(json!({
            "zipball_url": "a",
            "tarball_url": "b"
        }))
        .unwrap();
        let assets = manifest_assets(manifest);
        assert_eq!(assets.len(), 2);
    }

    #[test]
    fn find_asset_matches_exact_name() {
        let assets = vec![ReleaseAsset {
            name: "a.7z".to_string(),
            download_url: "u".to_string(),
        }];
        assert!(find_asset(&assets, "a.7z").is_some());
        assert!(find_asset(&assets, "A.7z").is_none());
    }
}
