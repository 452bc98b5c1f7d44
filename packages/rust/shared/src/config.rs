//! Application configuration for bundlebot.
//!
//! User config lives at `~/.bundlebot/bundlebot.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BundleError, Result};
use crate::types::MergePolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "bundlebot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bundlebot";

/// Item pages of the UFBA institutional repository (DSpace).
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://repositorio.ufba.br/ri/handle/ri/";

/// First file link in the bitstream table of a DSpace item page.
pub const DEFAULT_LINK_SELECTOR: &str = "body > table.centralPane > tbody > tr:nth-child(1) > td.pageContents > table:nth-child(6) > tbody > tr > td > table > tbody > tr:nth-child(2) > td:nth-child(1) > a";

// ---------------------------------------------------------------------------
// Config structs (matching bundlebot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub merge: MergeConfig,
}

/// `[manifest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Spreadsheet holding the work rows.
    #[serde(default = "default_manifest_path")]
    pub path: String,

    /// Worksheet name; the first worksheet when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,

    /// Status text marking a row as still to be processed.
    #[serde(default = "default_pending_status")]
    pub pending_status: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: default_manifest_path(),
            sheet: None,
            pending_status: default_pending_status(),
        }
    }
}

fn default_manifest_path() -> String {
    "./excel/data.xlsx".into()
}
fn default_pending_status() -> String {
    "Pendente".into()
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Detail page prefix; the document code is appended verbatim.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// CSS selector of the download link on a detail page.
    #[serde(default = "default_link_selector")]
    pub link_selector: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            link_selector: default_link_selector(),
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_CATALOG_BASE_URL.into()
}
fn default_link_selector() -> String {
    DEFAULT_LINK_SELECTOR.into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// One downloaded file per document code.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// One merged artifact per processed row.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_scratch_dir() -> String {
    "./.tmp".into()
}
fn default_output_dir() -> String {
    "./dist".into()
}

/// `[merge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub policy: MergePolicy,

    /// Remove a row's scratch files after its artifact has been written.
    #[serde(default)]
    pub cleanup_scratch: bool,

    /// Output file name prefix, followed by the manifest row number.
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            policy: MergePolicy::default(),
            cleanup_scratch: false,
            artifact_prefix: default_artifact_prefix(),
        }
    }
}

fn default_artifact_prefix() -> String {
    "row_".into()
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub manifest_path: PathBuf,
    pub sheet: Option<String>,
    pub pending_status: String,
    pub base_url: Url,
    pub link_selector: String,
    pub timeout: Duration,
    pub max_redirects: usize,
    pub scratch_dir: PathBuf,
    pub output_dir: PathBuf,
    pub merge_policy: MergePolicy,
    pub cleanup_scratch: bool,
    pub artifact_prefix: String,
    /// Where to write the JSON run report, if anywhere.
    pub report_path: Option<PathBuf>,
}

impl TryFrom<&AppConfig> for PipelineConfig {
    type Error = BundleError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        if config.manifest.pending_status.trim().is_empty() {
            return Err(BundleError::config("manifest.pending_status must not be empty"));
        }
        if config.catalog.link_selector.trim().is_empty() {
            return Err(BundleError::config("catalog.link_selector must not be empty"));
        }

        let base_url = Url::parse(&config.catalog.base_url).map_err(|e| {
            BundleError::config(format!(
                "catalog.base_url '{}' is not a valid URL: {e}",
                config.catalog.base_url
            ))
        })?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(BundleError::config(format!(
                "catalog.base_url must be http(s), got '{}'",
                base_url.scheme()
            )));
        }

        Ok(Self {
            manifest_path: PathBuf::from(&config.manifest.path),
            sheet: config.manifest.sheet.clone(),
            pending_status: config.manifest.pending_status.trim().to_string(),
            base_url,
            link_selector: config.catalog.link_selector.clone(),
            timeout: Duration::from_secs(config.catalog.timeout_secs),
            max_redirects: config.catalog.max_redirects,
            scratch_dir: PathBuf::from(&config.paths.scratch_dir),
            output_dir: PathBuf::from(&config.paths.output_dir),
            merge_policy: config.merge.policy,
            cleanup_scratch: config.merge.cleanup_scratch,
            artifact_prefix: config.merge.artifact_prefix.clone(),
            report_path: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.bundlebot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BundleError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.bundlebot/bundlebot.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BundleError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BundleError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_at(&config_file_path()?)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<PathBuf> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| BundleError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| BundleError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| BundleError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("pending_status"));
        assert!(toml_str.contains("Pendente"));
        assert!(toml_str.contains("policy = \"strict\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.catalog.timeout_secs, 30);
        assert_eq!(parsed.catalog.base_url, DEFAULT_CATALOG_BASE_URL);
        assert_eq!(parsed.paths.scratch_dir, "./.tmp");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[manifest]
path = "/srv/work/list.xlsx"
sheet = "Pedidos"

[merge]
policy = "skip-missing"
cleanup_scratch = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.manifest.path, "/srv/work/list.xlsx");
        assert_eq!(config.manifest.sheet.as_deref(), Some("Pedidos"));
        assert_eq!(config.manifest.pending_status, "Pendente");
        assert_eq!(config.merge.policy, MergePolicy::SkipMissing);
        assert!(config.merge.cleanup_scratch);
        assert_eq!(config.paths.output_dir, "./dist");
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let app = AppConfig::default();
        let pipeline = PipelineConfig::try_from(&app).expect("valid defaults");
        assert_eq!(pipeline.pending_status, "Pendente");
        assert_eq!(pipeline.timeout, Duration::from_secs(30));
        assert_eq!(pipeline.base_url.host_str(), Some("repositorio.ufba.br"));
        assert_eq!(pipeline.merge_policy, MergePolicy::Strict);
        assert!(pipeline.report_path.is_none());
    }

    #[test]
    fn pipeline_config_rejects_bad_values() {
        let mut app = AppConfig::default();
        app.manifest.pending_status = "  ".into();
        assert!(PipelineConfig::try_from(&app).is_err());

        let mut app = AppConfig::default();
        app.catalog.base_url = "not a url".into();
        let err = PipelineConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("catalog.base_url"));

        let mut app = AppConfig::default();
        app.catalog.base_url = "ftp://example.com/".into();
        assert!(PipelineConfig::try_from(&app).is_err());
    }

    #[test]
    fn init_config_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("bb-config-test-{}", std::process::id()));
        let path = dir.join("nested").join(CONFIG_FILE_NAME);

        let written = init_config_at(&path).expect("init");
        let loaded = load_config_from(&written).expect("load");
        assert_eq!(loaded.merge.artifact_prefix, "row_");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
