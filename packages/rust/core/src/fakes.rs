//! Recording test doubles for the pipeline's external capabilities.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bundlebot_catalog::{CatalogResolver, DocumentFetcher, scratch_path};
use bundlebot_manifest::{ManifestStore, Sheet};
use bundlebot_merge::ArtifactMerger;
use bundlebot_shared::{
    BundleError, CellRef, DocumentCode, FetchedDocument, ResolvedLocation, Result,
};
use url::Url;
use uuid::Uuid;

/// Scratch and output directories under the system temp dir.
pub struct TestDirs {
    pub root: PathBuf,
    pub scratch: PathBuf,
    pub output: PathBuf,
}

impl TestDirs {
    pub fn new(label: &str) -> Self {
        let root = std::env::temp_dir().join(format!("bb-{label}-{}", Uuid::now_v7()));
        let scratch = root.join("scratch");
        let output = root.join("dist");
        std::fs::create_dir_all(&scratch).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        Self {
            root,
            scratch,
            output,
        }
    }

    pub fn scratch_entries(&self) -> usize {
        count_entries(&self.scratch)
    }

    pub fn output_entries(&self) -> usize {
        count_entries(&self.output)
    }
}

impl Drop for TestDirs {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Call order shared between several fakes.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// A [`Sheet`] that logs every single-cell read as `read <A1>`.
pub struct RecordingStore {
    sheet: Sheet,
    log: EventLog,
}

impl RecordingStore {
    pub fn new(sheet: Sheet, log: &EventLog) -> Self {
        Self {
            sheet,
            log: log.clone(),
        }
    }
}

impl ManifestStore for RecordingStore {
    fn cell_text(&self, cell: &CellRef) -> Option<String> {
        self.log.push(format!("read {cell}"));
        self.sheet.cell_text(cell)
    }

    fn column_cells(&self, column: u32) -> Vec<(String, u32)> {
        self.sheet.column_cells(column)
    }

    fn row_cells(&self, row: u32) -> Vec<(String, u32)> {
        self.sheet.row_cells(row)
    }
}

/// Resolves every code under `https://files.test/`, except the failing ones.
#[derive(Default)]
pub struct FakeResolver {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
    log: EventLog,
}

impl FakeResolver {
    pub fn failing(codes: &[&str]) -> Self {
        Self {
            failing: codes.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Also logs each call as `resolve <code>`.
    pub fn logging_to(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogResolver for FakeResolver {
    async fn resolve(&self, code: &DocumentCode) -> Result<ResolvedLocation> {
        self.calls.lock().unwrap().push(code.to_string());
        self.log.push(format!("resolve {code}"));
        if self.failing.contains(code.as_str()) {
            return Err(BundleError::resolution(code.as_str(), "detail page not found"));
        }
        Ok(ResolvedLocation {
            code: code.clone(),
            url: Url::parse("https://files.test/")
                .unwrap()
                .join(&code.scratch_file_name("pdf"))
                .unwrap(),
        })
    }
}

/// Writes `document <code>` to the scratch path, except for the failing codes.
#[derive(Default)]
pub struct FakeFetcher {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn failing(codes: &[&str]) -> Self {
        Self {
            failing: codes.iter().map(|c| c.to_string()).collect(),
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch(&self, location: &ResolvedLocation, dest_dir: &Path) -> FetchedDocument {
        let code = &location.code;
        self.calls.lock().unwrap().push(code.to_string());

        let path = scratch_path(dest_dir, code);
        if self.failing.contains(code.as_str()) {
            return FetchedDocument::failed(code.clone(), path);
        }

        let body = format!("document {code}\n");
        std::fs::write(&path, &body).unwrap();
        FetchedDocument {
            code: code.clone(),
            scratch_path: path,
            succeeded: true,
            content_len: Some(body.len() as u64),
            content_hash: None,
        }
    }
}

/// Concatenates its inputs like a strict codec: any missing input, or no
/// input at all, is a merge failure. Outputs given to `failing_for` fail too.
#[derive(Default)]
pub struct RecordingMerger {
    failing_outputs: HashSet<PathBuf>,
    calls: Mutex<Vec<(Vec<PathBuf>, PathBuf)>>,
}

impl RecordingMerger {
    pub fn failing_for(outputs: &[PathBuf]) -> Self {
        Self {
            failing_outputs: outputs.iter().cloned().collect(),
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<(Vec<PathBuf>, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ArtifactMerger for RecordingMerger {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((inputs.to_vec(), output.to_path_buf()));

        if inputs.is_empty() {
            return Err(BundleError::merge("no input documents"));
        }
        if self.failing_outputs.contains(output) {
            return Err(BundleError::merge("codec rejected input"));
        }

        let mut combined = Vec::new();
        for input in inputs {
            let bytes = std::fs::read(input).map_err(|_| {
                BundleError::merge(format!("input {} does not exist", input.display()))
            })?;
            combined.extend(bytes);
        }
        std::fs::write(output, combined).map_err(|e| BundleError::io(output, e))
    }
}
