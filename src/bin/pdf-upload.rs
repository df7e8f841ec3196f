//! CLI binary for edgequake-pdf-upload.
//!
//! A thin shim over the library crate: stages the given files, prints each
//! verdict, then uploads the selected ones.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_pdf_upload::pipeline::intake;
use edgequake_pdf_upload::{
    FileId, FileStatus, Orchestrator, PipelineConfig, PipelineObserver, RawFile, ScannerKind,
    StagedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Prints one line per staged file and drives a bar while uploads run.
/// Uploads complete out of order, so timings are tracked per file id.
struct CliObserver {
    bar: ProgressBar,
    started: Mutex<HashMap<FileId, Instant>>,
    failed: AtomicUsize,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Validating");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            started: Mutex::new(HashMap::new()),
            failed: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix("Uploading");
    }

    fn elapsed(&self, id: FileId) -> f64 {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineObserver for CliObserver {
    fn on_intake_start(&self, accepted: usize, ignored: usize) {
        self.bar
            .set_message(format!("{accepted} files ({ignored} ignored)"));
    }

    fn on_file_staged(&self, file: &StagedFile) {
        let mark = if file.is_ready() { green("✓") } else { red("✗") };
        self.bar.println(format!(
            "  {} {:<32}  {}",
            mark,
            file.name(),
            dim(file.message())
        ));
    }

    fn on_upload_start(&self, id: FileId, name: &str) {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_upload_complete(&self, id: FileId, name: &str) {
        let secs = self.elapsed(id);
        self.bar.println(format!(
            "  {} {:<32}  {}",
            green("↑"),
            name,
            dim(&format!("{secs:.1}s"))
        ));
        self.bar.inc(1);
    }

    fn on_upload_error(&self, id: FileId, name: &str, message: &str) {
        let secs = self.elapsed(id);
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            name,
            red(message),
            dim(&format!("{secs:.1}s"))
        ));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Validate only
  pdf-upload --dry-run a.pdf b.pdf

  # Validate and upload every file that passed
  pdf-upload --all --endpoint https://files.example.com/upload *.pdf

  # Upload the first and third staged files (simulated transport)
  pdf-upload --select 1,3 a.pdf b.pdf c.pdf

  # Machine-readable final state
  pdf-upload --all --json a.pdf > state.json

SCANNERS:
  random   passes with --pass-rate probability (default)
  noop     always passes
  clamd    ClamAV daemon at --clamd-addr

Without --endpoint, uploads are simulated with --delay-ms latency.
"#;

/// Validate PDF files and upload the ones that pass.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-upload",
    version,
    about = "Validate PDF files and upload the ones that pass",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files to stage.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// HTTP endpoint receiving each file as a POST body.
    #[arg(long, env = "PDF_UPLOAD_ENDPOINT")]
    endpoint: Option<String>,

    /// Maximum file size in bytes.
    #[arg(long, env = "PDF_UPLOAD_MAX_SIZE", default_value_t = 5_000_000)]
    max_size: u64,

    /// Per-attempt upload deadline in milliseconds.
    #[arg(long, env = "PDF_UPLOAD_TIMEOUT_MS", default_value_t = 15_000)]
    timeout_ms: u64,

    /// Security scanner: random, noop, clamd.
    #[arg(long, env = "PDF_UPLOAD_SCANNER", default_value = "random")]
    scanner: String,

    /// Pass probability for the random scanner.
    #[arg(long, env = "PDF_UPLOAD_PASS_RATE", default_value_t = 0.8)]
    pass_rate: f64,

    /// clamd TCP address.
    #[arg(long, env = "PDF_UPLOAD_CLAMD_ADDR", default_value = "127.0.0.1:3310")]
    clamd_addr: String,

    /// Seed for the random scanner and simulated transport.
    #[arg(long, env = "PDF_UPLOAD_SEED")]
    seed: Option<u64>,

    /// Simulated transport latency in milliseconds.
    #[arg(long, env = "PDF_UPLOAD_DELAY_MS", default_value_t = 2000)]
    delay_ms: u64,

    /// Comma-separated 1-based positions to upload (e.g. 1,3).
    #[arg(long, value_delimiter = ',', conflicts_with = "all")]
    select: Vec<usize>,

    /// Upload every file that passed validation.
    #[arg(long)]
    all: bool,

    /// Stop after validation.
    #[arg(long)]
    dry_run: bool,

    /// Print the final state as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF_UPLOAD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_UPLOAD_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bar carries the per-file feedback; keep library logs quiet under it.
    let show_progress = !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let observer = show_progress.then(CliObserver::new);
    let config = build_config(&cli, observer.clone())?;
    let session = Orchestrator::from_config(config).context("Failed to set up session")?;

    // ── Intake ───────────────────────────────────────────────────────────
    let mut raw: Vec<RawFile> = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        match intake::load_path(path).await {
            Ok(f) => raw.push(f),
            Err(e) => eprintln!("{} {}", red("✗"), e),
        }
    }
    if raw.is_empty() {
        if let Some(ref obs) = observer {
            obs.finish();
        }
        bail!("No readable input files");
    }
    let staged = session.intake(raw).await.context("Validation failed")?;

    // ── Selection ────────────────────────────────────────────────────────
    if !cli.dry_run {
        if cli.all {
            for id in &staged {
                session.toggle_selection(*id)?;
            }
        } else {
            for pos in &cli.select {
                let id = pos
                    .checked_sub(1)
                    .map(|i| session.id_at(i))
                    .transpose()?
                    .with_context(|| format!("Positions are 1-based, got {pos}"))?;
                if !session.toggle_selection(id)? {
                    eprintln!("{} #{pos} is not ready; skipped", dim("·"));
                }
            }
        }

        // ── Upload ───────────────────────────────────────────────────────
        let batch = session.upload_selected();
        if let Some(ref obs) = observer {
            obs.activate_bar(batch.len());
        }
        for (id, res) in batch.join().await {
            if let Err(e) = res {
                eprintln!("{} {}: {}", red("✗"), id, e);
            }
        }
    }
    if let Some(ref obs) = observer {
        obs.finish();
    }

    // ── Report ───────────────────────────────────────────────────────────
    let files = session.files();
    if cli.json {
        let summaries: Vec<_> = files.iter().map(StagedFile::summary).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&summaries).context("Failed to serialise state")?
        );
    } else {
        for (pos, f) in files.iter().enumerate() {
            println!("{:>3}  {:<9} {:<32} {}", pos + 1, f.status(), f.name(), f.message());
        }
    }

    let uploaded = files
        .iter()
        .filter(|f| f.status() == FileStatus::Success)
        .count();
    let failed = files
        .iter()
        .filter(|f| f.status() == FileStatus::Error && f.is_retryable())
        .count();
    if !cli.json && !cli.dry_run {
        eprintln!(
            "{} {} uploaded, {} failed",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&uploaded.to_string()),
            failed
        );
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<CliObserver>>) -> Result<PipelineConfig> {
    let scanner: ScannerKind = cli.scanner.parse()?;
    let mut builder = PipelineConfig::builder()
        .max_file_size(cli.max_size)
        .upload_timeout_ms(cli.timeout_ms)
        .scanner(scanner)
        .scan_pass_rate(cli.pass_rate)
        .clamd_addr(cli.clamd_addr.clone())
        .simulated_delay_ms(cli.delay_ms);
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    if let Some(ref url) = cli.endpoint {
        builder = builder.endpoint(url.clone());
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }
    builder.build().context("Invalid configuration")
}
