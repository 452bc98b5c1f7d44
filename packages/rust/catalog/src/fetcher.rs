//! Download of resolved documents into the scratch store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bundlebot_shared::{BundleError, DocumentCode, FetchedDocument, ResolvedLocation, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::session::CatalogSession;

/// Extension of scratch files; the catalog serves PDF documents.
pub const SCRATCH_EXTENSION: &str = "pdf";

/// Deterministic scratch path of a code inside `dest_dir`.
pub fn scratch_path(dest_dir: &Path, code: &DocumentCode) -> PathBuf {
    dest_dir.join(code.scratch_file_name(SCRATCH_EXTENSION))
}

/// Persists the content behind a [`ResolvedLocation`] to the scratch store.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Never fails: transport problems are logged and reported through
    /// [`FetchedDocument::succeeded`].
    async fn fetch(&self, location: &ResolvedLocation, dest_dir: &Path) -> FetchedDocument;
}

/// Plain HTTP GET downloader.
#[derive(Debug, Clone)]
pub struct HttpDocumentFetcher {
    client: Client,
}

impl HttpDocumentFetcher {
    pub fn new(session: &CatalogSession) -> Self {
        Self {
            client: session.client().clone(),
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    #[instrument(skip_all, fields(code = %location.code))]
    async fn fetch(&self, location: &ResolvedLocation, dest_dir: &Path) -> FetchedDocument {
        let dest = scratch_path(dest_dir, &location.code);
        let part = dest.with_extension(format!("{SCRATCH_EXTENSION}.part"));

        match download(&self.client, location, &part, &dest).await {
            Ok((content_len, content_hash)) => {
                info!(bytes = content_len, path = %dest.display(), "document downloaded");
                FetchedDocument {
                    code: location.code.clone(),
                    scratch_path: dest,
                    succeeded: true,
                    content_len: Some(content_len),
                    content_hash: Some(content_hash),
                }
            }
            Err(e) => {
                warn!(url = %location.url, error = %e, "document download failed");
                // A stale file from an earlier run must not reach the merger.
                let _ = tokio::fs::remove_file(&part).await;
                let _ = tokio::fs::remove_file(&dest).await;
                FetchedDocument::failed(location.code.clone(), dest)
            }
        }
    }
}

/// Stream the body into `part`, then move it over `dest`.
///
/// Returns the byte count and SHA-256 of the content.
async fn download(
    client: &Client,
    location: &ResolvedLocation,
    part: &Path,
    dest: &Path,
) -> Result<(u64, String)> {
    let code = location.code.as_str();
    let url = &location.url;
    debug!(%url, "downloading");

    let mut response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| BundleError::fetch(code, format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(BundleError::fetch(code, format!("{url}: HTTP {status}")));
    }

    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(|e| BundleError::io(part, e))?;
    let mut hasher = Sha256::new();
    let mut content_len: u64 = 0;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| BundleError::fetch(code, format!("{url}: body read failed: {e}")))?
    {
        hasher.update(&chunk);
        content_len += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| BundleError::io(part, e))?;
    }

    file.flush().await.map_err(|e| BundleError::io(part, e))?;
    drop(file);

    tokio::fs::rename(part, dest)
        .await
        .map_err(|e| BundleError::io(dest, e))?;

    Ok((content_len, format!("{:x}", hasher.finalize())))
}
