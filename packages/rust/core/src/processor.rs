//! Per-row processing: status gate → resolve + fetch each code → merge.
//!
//! A row moves through
//! `NotStarted → StatusChecked → (Skipped | Fetching → Merging → (Completed | PartiallyFailed))`.
//! Nothing is retried; every failure below the row is logged and recorded
//! in the row's [`RowOutcome`].

use std::path::PathBuf;

use bundlebot_catalog::{CatalogResolver, DocumentFetcher, scratch_path};
use bundlebot_manifest::ManifestStore;
use bundlebot_merge::{ARTIFACT_EXTENSION, ArtifactMerger};
use bundlebot_shared::{
    FetchedDocument, MergePolicy, PipelineConfig, RowOutcome, RowStatus, WorkRow,
};
use tracing::{debug, info, instrument, warn};

/// Row-level settings derived from the pipeline configuration.
#[derive(Debug, Clone)]
pub struct RowSettings {
    /// Status text that marks a row as still to be processed.
    pub pending_status: String,
    pub merge_policy: MergePolicy,
    pub cleanup_scratch: bool,
    pub artifact_prefix: String,
    pub scratch_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl From<&PipelineConfig> for RowSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            pending_status: config.pending_status.clone(),
            merge_policy: config.merge_policy,
            cleanup_scratch: config.cleanup_scratch,
            artifact_prefix: config.artifact_prefix.clone(),
            scratch_dir: config.scratch_dir.clone(),
            output_dir: config.output_dir.clone(),
        }
    }
}

impl RowSettings {
    /// Output path of a row's merged artifact, named by its manifest row.
    pub fn artifact_path(&self, row: &WorkRow) -> PathBuf {
        self.output_dir.join(format!(
            "{}{}.{ARTIFACT_EXTENSION}",
            self.artifact_prefix,
            row.row_number()
        ))
    }
}

/// Drives a single [`WorkRow`] through its state machine.
pub struct RowProcessor<'a> {
    store: &'a dyn ManifestStore,
    resolver: &'a dyn CatalogResolver,
    fetcher: &'a dyn DocumentFetcher,
    merger: &'a dyn ArtifactMerger,
    settings: &'a RowSettings,
}

impl<'a> RowProcessor<'a> {
    pub fn new(
        store: &'a dyn ManifestStore,
        resolver: &'a dyn CatalogResolver,
        fetcher: &'a dyn DocumentFetcher,
        merger: &'a dyn ArtifactMerger,
        settings: &'a RowSettings,
    ) -> Self {
        Self {
            store,
            resolver,
            fetcher,
            merger,
            settings,
        }
    }

    /// Process one row. `row_index` is its 1-based position among work rows.
    ///
    /// The status cell is read once, before anything is fetched.
    #[instrument(skip_all, fields(row = row.row_number()))]
    pub async fn process(&self, row_index: usize, row: &WorkRow) -> RowOutcome {
        let status = self.store.cell_text(&row.status_ref).unwrap_or_default();
        if status.trim() != self.settings.pending_status {
            debug!(status = %status.trim(), "row not pending, skipping");
            return RowOutcome::skipped(row_index, row.row_number());
        }

        let documents = self.fetch_all(row).await;
        let failed_codes: Vec<_> = documents
            .iter()
            .filter(|doc| !doc.succeeded)
            .map(|doc| doc.code.clone())
            .collect();

        let inputs = merge_inputs(&documents, self.settings.merge_policy);
        let output = self.settings.artifact_path(row);
        info!(
            documents = inputs.len(),
            failed = failed_codes.len(),
            output = %output.display(),
            "merging row documents"
        );

        match self.merger.merge(&inputs, &output) {
            Ok(()) => {
                if self.settings.cleanup_scratch {
                    remove_scratch(&inputs).await;
                }
                let status = if failed_codes.is_empty() {
                    RowStatus::Completed
                } else {
                    RowStatus::PartiallyFailed
                };
                RowOutcome {
                    row_index,
                    row_number: row.row_number(),
                    status,
                    merged_artifact: Some(output),
                    failed_codes,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "skipping merge for row");
                // No artifact from an earlier pass may outlive a failed merge.
                if let Err(io) = tokio::fs::remove_file(&output).await {
                    if io.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %output.display(), error = %io, "stale artifact not removed");
                    }
                }
                RowOutcome {
                    row_index,
                    row_number: row.row_number(),
                    status: RowStatus::PartiallyFailed,
                    merged_artifact: None,
                    failed_codes,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Resolve and fetch every code, one at a time, in row order.
    ///
    /// Always yields exactly one [`FetchedDocument`] per code, in `codes` order.
    async fn fetch_all(&self, row: &WorkRow) -> Vec<FetchedDocument> {
        let scratch_dir = &self.settings.scratch_dir;
        let mut documents = Vec::with_capacity(row.codes.len());

        for code in &row.codes {
            let document = match self.resolver.resolve(code).await {
                Ok(location) => {
                    info!(%code, url = %location.url, "downloading document");
                    self.fetcher.fetch(&location, scratch_dir).await
                }
                Err(e) => {
                    warn!(%code, error = %e, "could not resolve document");
                    let path = scratch_path(scratch_dir, code);
                    // Never let a previous run's file stand in for this code.
                    let _ = tokio::fs::remove_file(&path).await;
                    FetchedDocument::failed(code.clone(), path)
                }
            };

            if !document.succeeded {
                warn!(%code, "document unavailable");
            }
            documents.push(document);
        }

        documents
    }
}

/// Scratch paths handed to the merger, always in fetch (= `codes`) order.
///
/// `Strict` passes every path so a missing document fails the merge;
/// `SkipMissing` leaves out the documents that were not fetched.
pub fn merge_inputs(documents: &[FetchedDocument], policy: MergePolicy) -> Vec<PathBuf> {
    documents
        .iter()
        .filter(|doc| policy == MergePolicy::Strict || doc.succeeded)
        .map(|doc| doc.scratch_path.clone())
        .collect()
}

async fn remove_scratch(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!(path = %path.display(), error = %e, "scratch file not removed");
        }
    }
}
