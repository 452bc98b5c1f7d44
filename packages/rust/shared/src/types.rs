//! Core domain types for the retrieval-and-merge pipeline.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::BundleError;

/// Characters not allowed verbatim in a scratch file name.
static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex"));

/// Digest bytes kept in the suffix of a sanitized scratch name.
const SCRATCH_DIGEST_BYTES: usize = 8;

// ---------------------------------------------------------------------------
// CellRef
// ---------------------------------------------------------------------------

/// A 1-based `(column, row)` position in the manifest, shown in A1 notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub column: u32,
    pub row: u32,
}

impl CellRef {
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Column letters for a 1-based column index (`1 -> A`, `27 -> AA`).
    pub fn column_name(column: u32) -> String {
        let mut n = column;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push(b'A' + rem as u8);
            n = (n - 1) / 26;
        }
        letters.reverse();
        String::from_utf8(letters).unwrap_or_default()
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", Self::column_name(self.column), self.row)
    }
}

// ---------------------------------------------------------------------------
// DocumentCode
// ---------------------------------------------------------------------------

/// Opaque catalog identifier of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentCode(pub String);

impl DocumentCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deterministic, filesystem-safe scratch file name for this code.
    ///
    /// The same code always maps to the same name, so reruns overwrite.
    /// Codes that are not already safe get `~` plus a digest of the raw
    /// code appended, so two distinct codes never share a name.
    pub fn scratch_file_name(&self, extension: &str) -> String {
        let sanitized = UNSAFE_FILE_CHARS.replace_all(&self.0, "_");
        let dots_only = sanitized.chars().all(|c| c == '.');

        if !dots_only && sanitized == self.0.as_str() {
            return format!("{}.{extension}", self.0);
        }

        let stem = if dots_only { "_" } else { sanitized.as_ref() };
        let digest = Sha256::digest(self.0.as_bytes());
        let suffix: String = digest[..SCRATCH_DIGEST_BYTES]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        format!("{stem}~{suffix}.{extension}")
    }
}

impl std::fmt::Display for DocumentCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// WorkRow
// ---------------------------------------------------------------------------

/// One manifest row: where its status lives and which documents it bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRow {
    /// Manifest cell holding the row's processing status.
    pub status_ref: CellRef,
    /// Document codes in merge order.
    pub codes: Vec<DocumentCode>,
}

impl WorkRow {
    /// The manifest row number (1-based, header is row 1).
    pub fn row_number(&self) -> u32 {
        self.status_ref.row
    }
}

// ---------------------------------------------------------------------------
// Resolution / fetch
// ---------------------------------------------------------------------------

/// Where the binary content of a code can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub code: DocumentCode,
    pub url: Url,
}

/// Result of one download attempt into the scratch store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedDocument {
    pub code: DocumentCode,
    /// Deterministic scratch path; only holds content when `succeeded`.
    pub scratch_path: PathBuf,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_len: Option<u64>,
    /// SHA-256 of the downloaded bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl FetchedDocument {
    pub fn failed(code: DocumentCode, scratch_path: PathBuf) -> Self {
        Self {
            code,
            scratch_path,
            succeeded: false,
            content_len: None,
            content_hash: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Merge policy
// ---------------------------------------------------------------------------

/// Which scratch paths are handed to the merger when some fetches failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Pass every code's path in order; a missing file fails the merge.
    #[default]
    Strict,
    /// Merge only the documents that were fetched, still in code order.
    SkipMissing,
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::SkipMissing => f.write_str("skip-missing"),
        }
    }
}

impl std::str::FromStr for MergePolicy {
    type Err = BundleError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "strict" => Ok(Self::Strict),
            "skip-missing" => Ok(Self::SkipMissing),
            other => Err(BundleError::config(format!(
                "unknown merge policy '{other}': expected 'strict' or 'skip-missing'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// RowOutcome
// ---------------------------------------------------------------------------

/// Terminal status of a row for one pipeline pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Completed,
    Skipped,
    PartiallyFailed,
}

/// Terminal record of what happened to one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowOutcome {
    /// 1-based position among the manifest's work rows.
    pub row_index: usize,
    /// Manifest row number.
    pub row_number: u32,
    pub status: RowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_artifact: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_codes: Vec<DocumentCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RowOutcome {
    pub fn skipped(row_index: usize, row_number: u32) -> Self {
        Self {
            row_index,
            row_number,
            status: RowStatus::Skipped,
            merged_artifact: None,
            failed_codes: Vec::new(),
            error: None,
        }
    }
}
