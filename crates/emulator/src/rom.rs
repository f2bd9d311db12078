//! ROM acquisition
//!
//! The ROM is fetched once over HTTPS on first boot and cached next to the
//! saves. Exactly one redirect is followed; release hosts commonly 302 to a
//! CDN and anything deeper is treated as a broken URL.

use std::path::Path;
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Return the ROM bytes, downloading to `path` if not already present.
pub async fn ensure_rom(path: &Path, url: &str) -> anyhow::Result<Vec<u8>> {
    if let Ok(existing) = tokio::fs::read(path).await {
        if !existing.is_empty() {
            tracing::info!("Using cached ROM at {:?} ({} bytes)", path, existing.len());
            return Ok(existing);
        }
    }

    tracing::info!("Downloading ROM from {}", url);
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(1))
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;

    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    anyhow::ensure!(!bytes.is_empty(), "ROM download returned an empty body");

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &bytes).await?;
    tracing::info!("ROM cached at {:?} ({} bytes)", path, bytes.len());

    Ok(bytes.to_vec())
}
