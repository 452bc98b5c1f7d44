//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use bundlebot_core::{PipelineRunner, ProgressReporter, RunSummary};
use bundlebot_manifest::{ManifestStore, Sheet, read_work_rows};
use bundlebot_shared::{
    AppConfig, MergePolicy, PipelineConfig, RowOutcome, RowStatus, WorkRow, init_config,
    init_config_at, load_config, load_config_from,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// bundlebot: fetch the documents listed in a spreadsheet and merge them per row.
#[derive(Parser)]
#[command(
    name = "bundlebot",
    version,
    about = "Fetch catalog documents listed in a spreadsheet and merge them into one PDF per row.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.bundlebot/bundlebot.toml.
    #[arg(long, global = true, env = "BUNDLEBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process every pending row of the manifest.
    Run {
        /// Spreadsheet to read (overrides manifest.path).
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Scratch directory for downloads (overrides paths.scratch_dir).
        #[arg(long)]
        scratch_dir: Option<PathBuf>,

        /// Output directory for merged artifacts (overrides paths.output_dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// What to merge when some documents failed: strict or skip-missing.
        #[arg(long)]
        merge_policy: Option<MergePolicy>,

        /// Delete a row's scratch files after a successful merge.
        #[arg(long)]
        cleanup_scratch: bool,

        /// Write a JSON run report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List the manifest's work rows without touching the network.
    Inspect {
        /// Spreadsheet to read (overrides manifest.path).
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Print rows as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "bundlebot=info",
        1 => "bundlebot=debug",
        _ => "bundlebot=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Run {
            manifest,
            scratch_dir,
            out,
            merge_policy,
            cleanup_scratch,
            report,
        } => {
            let overrides = RunOverrides {
                manifest,
                scratch_dir,
                out,
                merge_policy,
                cleanup_scratch,
                report,
            };
            cmd_run(config_path, overrides).await
        }
        Command::Inspect { manifest, json } => cmd_inspect(config_path, manifest, json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn read_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// `run` flags layered over the config file.
#[derive(Debug, Default)]
struct RunOverrides {
    manifest: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    out: Option<PathBuf>,
    merge_policy: Option<MergePolicy>,
    cleanup_scratch: bool,
    report: Option<PathBuf>,
}

impl RunOverrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(manifest) = self.manifest {
            config.manifest_path = manifest;
        }
        if let Some(dir) = self.scratch_dir {
            config.scratch_dir = dir;
        }
        if let Some(dir) = self.out {
            config.output_dir = dir;
        }
        if let Some(policy) = self.merge_policy {
            config.merge_policy = policy;
        }
        config.cleanup_scratch |= self.cleanup_scratch;
        config.report_path = self.report;
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, overrides: RunOverrides) -> Result<()> {
    let app_config = read_config(config_path)?;
    let mut config = PipelineConfig::try_from(&app_config)?;
    overrides.apply(&mut config);

    info!(
        manifest = %config.manifest_path.display(),
        output = %config.output_dir.display(),
        policy = %config.merge_policy,
        "starting run"
    );

    let reporter = CliProgress::new();
    let summary = PipelineRunner::new(config.clone())
        .run(&reporter)
        .await
        .wrap_err_with(|| format!("run aborted for {}", config.manifest_path.display()))?;

    print_summary(&summary, &config);
    Ok(())
}

fn print_summary(summary: &RunSummary, config: &PipelineConfig) {
    let elapsed = summary.finished_at - summary.started_at;

    println!();
    println!("  Run {}", summary.run_id);
    println!("  Rows:      {}", summary.total_rows);
    println!("  Completed: {}", summary.completed);
    println!("  Skipped:   {}", summary.skipped);
    println!("  Failed:    {}", summary.partially_failed);
    println!("  Output:    {}", config.output_dir.display());
    if let Some(report) = &config.report_path {
        println!("  Report:    {}", report.display());
    }
    println!(
        "  Time:      {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    );

    for outcome in summary
        .outcomes
        .iter()
        .filter(|o| o.status == RowStatus::PartiallyFailed)
    {
        let codes: Vec<_> = outcome.failed_codes.iter().map(|c| c.as_str()).collect();
        println!(
            "  ! row {}: missing [{}]{}",
            outcome.row_number,
            codes.join(", "),
            outcome
                .error
                .as_deref()
                .map(|e| format!(" ({e})"))
                .unwrap_or_default()
        );
    }
    println!();
}

fn cmd_inspect(config_path: Option<&Path>, manifest: Option<PathBuf>, json: bool) -> Result<()> {
    let app_config = read_config(config_path)?;
    let mut config = PipelineConfig::try_from(&app_config)?;
    if let Some(manifest) = manifest {
        config.manifest_path = manifest;
    }

    let sheet = Sheet::open(&config.manifest_path, config.sheet.as_deref())?;
    let rows = read_work_rows(&sheet);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let pending = rows
        .iter()
        .filter(|row| row_status(&sheet, row) == config.pending_status)
        .count();

    println!();
    println!("  Manifest: {}", config.manifest_path.display());
    println!("  Rows:     {} ({pending} pending)", rows.len());
    println!();
    for (i, row) in rows.iter().enumerate() {
        let status = row_status(&sheet, row);
        let marker = if status == config.pending_status { '*' } else { ' ' };
        let codes: Vec<_> = row.codes.iter().map(|c| c.as_str()).collect();
        println!(
            "  {marker} {:>3}  row {:<4} {:<12} {}",
            i + 1,
            row.row_number(),
            status,
            codes.join(", ")
        );
    }
    println!();

    Ok(())
}

fn row_status(sheet: &Sheet, row: &WorkRow) -> String {
    sheet
        .cell_text(&row.status_ref)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => init_config_at(path)?,
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Row progress bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn rows_loaded(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn row_started(&self, _current: usize, _total: usize, row: &WorkRow) {
        self.bar.set_message(format!(
            "row {} ({} documents)",
            row.row_number(),
            row.codes.len()
        ));
    }

    fn row_finished(&self, outcome: &RowOutcome) {
        if outcome.status == RowStatus::PartiallyFailed {
            self.bar
                .println(format!("  row {} partially failed", outcome.row_number));
        }
        self.bar.inc(1);
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "bundlebot",
            "run",
            "--manifest",
            "list.xlsx",
            "--merge-policy",
            "skip-missing",
            "--report",
            "out/run.json",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Run {
                manifest,
                merge_policy,
                report,
                cleanup_scratch,
                ..
            } => {
                assert_eq!(manifest, Some(PathBuf::from("list.xlsx")));
                assert_eq!(merge_policy, Some(MergePolicy::SkipMissing));
                assert_eq!(report, Some(PathBuf::from("out/run.json")));
                assert!(!cleanup_scratch);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn unknown_merge_policy_is_rejected() {
        assert!(Cli::try_parse_from(["bundlebot", "run", "--merge-policy", "lenient"]).is_err());
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = PipelineConfig::try_from(&AppConfig::default()).unwrap();
        RunOverrides {
            out: Some(PathBuf::from("/srv/out")),
            merge_policy: Some(MergePolicy::SkipMissing),
            cleanup_scratch: true,
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.merge_policy, MergePolicy::SkipMissing);
        assert!(config.cleanup_scratch);
        assert_eq!(config.manifest_path, PathBuf::from("./excel/data.xlsx"));
        assert!(config.report_path.is_none());
    }
}
