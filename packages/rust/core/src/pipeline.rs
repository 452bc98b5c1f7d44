//! End-to-end batch run: manifest → per-row resolve/fetch/merge → run report.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use bundlebot_catalog::{
    CatalogResolver, CatalogSession, DocumentFetcher, HtmlCatalogResolver, HttpDocumentFetcher,
    SessionOptions,
};
use bundlebot_manifest::{ManifestStore, Sheet, read_work_rows};
use bundlebot_merge::{ArtifactMerger, PdfMerger};
use bundlebot_shared::{BundleError, PipelineConfig, Result, RowOutcome, RowStatus, WorkRow};

use crate::processor::{RowProcessor, RowSettings};

/// Result of one pipeline pass over the manifest.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_rows: usize,
    pub completed: usize,
    pub skipped: usize,
    pub partially_failed: usize,
    /// One entry per work row, in manifest order.
    pub outcomes: Vec<RowOutcome>,
}

impl RunSummary {
    fn from_outcomes(started_at: DateTime<Utc>, outcomes: Vec<RowOutcome>) -> Self {
        let count = |status: RowStatus| outcomes.iter().filter(|o| o.status == status).count();

        Self {
            run_id: Uuid::now_v7().to_string(),
            started_at,
            finished_at: Utc::now(),
            total_rows: outcomes.len(),
            completed: count(RowStatus::Completed),
            skipped: count(RowStatus::Skipped),
            partially_failed: count(RowStatus::PartiallyFailed),
            outcomes,
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called once the manifest has been read.
    fn rows_loaded(&self, total: usize);
    /// Called before a row is processed; `current` is 1-based.
    fn row_started(&self, current: usize, total: usize, row: &WorkRow);
    /// Called with each row's outcome.
    fn row_finished(&self, outcome: &RowOutcome);
    /// Called when the pass completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn rows_loaded(&self, _total: usize) {}
    fn row_started(&self, _current: usize, _total: usize, _row: &WorkRow) {}
    fn row_finished(&self, _outcome: &RowOutcome) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Owns one pipeline pass.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    config: PipelineConfig,
    settings: RowSettings,
}

impl PipelineRunner {
    pub fn new(config: PipelineConfig) -> Self {
        let settings = RowSettings::from(&config);
        Self { config, settings }
    }

    /// Run against the configured manifest and the live catalog.
    ///
    /// Only setup problems fail the run: unusable directories, an invalid
    /// selector or an unreadable manifest. Row-level failures end up in the
    /// returned [`RunSummary`].
    #[instrument(skip_all, fields(manifest = %self.config.manifest_path.display()))]
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<RunSummary> {
        let started_at = Utc::now();
        self.prepare_dirs()?;

        let session = CatalogSession::open(&SessionOptions::from(&self.config))?;
        let resolver = match HtmlCatalogResolver::new(
            &session,
            &self.config.base_url,
            &self.config.link_selector,
        ) {
            Ok(resolver) => resolver,
            Err(e) => {
                session.close();
                return Err(e);
            }
        };
        let fetcher = HttpDocumentFetcher::new(&session);

        let sheet = match Sheet::open(&self.config.manifest_path, self.config.sheet.as_deref()) {
            Ok(sheet) => sheet,
            Err(e) => {
                error!(error = %e, "cannot load manifest");
                session.close();
                return Err(e);
            }
        };

        let outcomes = self
            .process_rows(&sheet, &resolver, &fetcher, &PdfMerger, progress)
            .await;
        session.close();

        self.finish(started_at, outcomes, progress)
    }

    /// Run against caller-supplied capabilities.
    pub async fn run_with(
        &self,
        store: &dyn ManifestStore,
        resolver: &dyn CatalogResolver,
        fetcher: &dyn DocumentFetcher,
        merger: &dyn ArtifactMerger,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        self.prepare_dirs()?;

        let outcomes = self
            .process_rows(store, resolver, fetcher, merger, progress)
            .await;

        self.finish(started_at, outcomes, progress)
    }

    fn prepare_dirs(&self) -> Result<()> {
        for dir in [&self.config.scratch_dir, &self.config.output_dir] {
            std::fs::create_dir_all(dir).map_err(|e| BundleError::io(dir, e))?;
        }
        Ok(())
    }

    /// Rows are processed strictly one after another, in manifest order.
    async fn process_rows(
        &self,
        store: &dyn ManifestStore,
        resolver: &dyn CatalogResolver,
        fetcher: &dyn DocumentFetcher,
        merger: &dyn ArtifactMerger,
        progress: &dyn ProgressReporter,
    ) -> Vec<RowOutcome> {
        let rows = read_work_rows(store);
        let total = rows.len();
        info!(rows = total, "manifest loaded");
        progress.rows_loaded(total);

        let processor = RowProcessor::new(store, resolver, fetcher, merger, &self.settings);
        let mut outcomes = Vec::with_capacity(total);

        for (i, row) in rows.iter().enumerate() {
            let current = i + 1;
            info!("executing row {current} of {total}");
            progress.row_started(current, total, row);

            let outcome = processor.process(current, row).await;
            progress.row_finished(&outcome);
            outcomes.push(outcome);
        }

        outcomes
    }

    fn finish(
        &self,
        started_at: DateTime<Utc>,
        outcomes: Vec<RowOutcome>,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        let summary = RunSummary::from_outcomes(started_at, outcomes);

        if let Some(path) = &self.config.report_path {
            write_report(path, &summary)?;
        }

        info!(
            run_id = %summary.run_id,
            rows = summary.total_rows,
            completed = summary.completed,
            skipped = summary.skipped,
            partially_failed = summary.partially_failed,
            "pipeline complete"
        );
        progress.done(&summary);
        Ok(summary)
    }
}

/// Write the summary as pretty-printed JSON.
fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BundleError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| BundleError::validation(format!("cannot serialize run report: {e}")))?;
    std::fs::write(path, json).map_err(|e| BundleError::io(path, e))?;

    info!(path = %path.display(), "run report written");
    Ok(())
}
