//! Downloads base images into directory-backed storage.

use crate::core::domain::{
    error::{ProxmoxError, ProxmoxResult},
    value_object::Sha256Checksum,
};
use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{info, warn};
use url::Url;

/// What a fetch did with the destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded,
    /// The file was already present (and matched the checksum, when one was given).
    Reused,
}

/// Places the image at `src` at `dest`.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// # Errors
    /// `ChecksumMismatch` when the payload does not hash to `checksum`; the
    /// destination is left untouched in that case.
    async fn fetch(
        &self,
        src: &Url,
        dest: &Path,
        checksum: Option<&Sha256Checksum>,
    ) -> ProxmoxResult<FetchOutcome>;
}

/// Streams the image over HTTP(S), hashing while writing to `<dest>.part`.
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn download(&self, src: &Url, part: &Path) -> ProxmoxResult<Vec<u8>> {
        let response = self
            .client
            .get(src.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProxmoxError::Transport(format!("download of {} failed: {}", src, e)))?;

        let mut file = fs::File::create(part)
            .await
            .map_err(|e| ProxmoxError::io(format!("creating {}", part.display()), e))?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| ProxmoxError::Transport(format!("download of {} failed: {}", src, e)))?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| ProxmoxError::io(format!("writing {}", part.display()), e))?;
        }
        file.flush()
            .await
            .map_err(|e| ProxmoxError::io(format!("writing {}", part.display()), e))?;

        Ok(hasher.finalize().to_vec())
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(
        &self,
        src: &Url,
        dest: &Path,
        checksum: Option<&Sha256Checksum>,
    ) -> ProxmoxResult<FetchOutcome> {
        let present = fs::try_exists(dest)
            .await
            .map_err(|e| ProxmoxError::io(format!("checking {}", dest.display()), e))?;
        if present {
            match checksum {
                None => {
                    info!(dest = %dest.display(), "image present, skipping download");
                    return Ok(FetchOutcome::Reused);
                }
                Some(expected) => {
                    if expected.matches(&hash_file(dest).await?) {
                        info!(dest = %dest.display(), "image present and verified, skipping download");
                        return Ok(FetchOutcome::Reused);
                    }
                    warn!(dest = %dest.display(), "existing image fails verification, downloading again");
                }
            }
        }

        info!(%src, dest = %dest.display(), "downloading image");
        let part = part_path(dest);
        let digest = match self.download(src, &part).await {
            Ok(digest) => digest,
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                return Err(e);
            }
        };

        if let Some(expected) = checksum {
            if !expected.matches(&digest) {
                let _ = fs::remove_file(&part).await;
                return Err(ProxmoxError::ChecksumMismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual: hex::encode(&digest),
                });
            }
        }

        fs::rename(&part, dest)
            .await
            .map_err(|e| ProxmoxError::io(format!("moving image into {}", dest.display()), e))?;
        Ok(FetchOutcome::Downloaded)
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn hash_file(path: &Path) -> ProxmoxResult<Vec<u8>> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| ProxmoxError::io(format!("opening {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0_u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| ProxmoxError::io(format!("reading {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_vec())
}
