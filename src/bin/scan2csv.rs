//! CLI binary for scan2csv.
//!
//! A thin shim over the library crate: reads settings from flags, the
//! environment, and an optional `.env` file, wires up the OCR client and
//! language model, and runs one of the subcommands.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use scan2csv::prompts::CONNECTION_CHECK_PROMPT;
use scan2csv::{
    AzureDocumentClient, AzureOcrConfig, Backoff, BatchMetadata, BatchProgressCallback, CsvStore,
    DocumentSchema, LlmTextModel, ModelRequest, Pipeline, PipelineConfig, ProgressCallback,
    RetryPolicy, Stage, TextModel,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch, one log line per
/// document.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, filename: &str) {
        self.bar.set_message(filename.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, filename: &str) {
        self.bar.println(format!(
            "  {} {:>4}/{:<4}  {}",
            green("✓"),
            index,
            total,
            filename
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, filename: &str, stage: Stage, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };

        self.bar.println(format!(
            "  {} {:>4}/{:<4}  {}  {} {}",
            red("✗"),
            index,
            total,
            filename,
            dim(&format!("[{stage}]")),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, written: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} documents written",
                green("✔"),
                bold(&written.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents written  ({} failed)",
                if written == 0 { red("✘") } else { cyan("⚠") },
                bold(&written.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process every deed under ./scans into deeds.csv
  scan2csv batch --dir scans --csv deeds.csv --office bangalore --document-type DEED

  # Extract one file and print the record as JSON
  scan2csv process scans/lease1.pdf

  # Use a custom field list
  scan2csv --schema schemas/sale_deed.toml batch --dir scans --csv out.csv \
      --office mysore --document-type "SALE DEED"

  # HTTP mode
  scan2csv serve --bind 127.0.0.1:5000

  # Check the language model responds
  scan2csv check

ENVIRONMENT VARIABLES:
  AZURE_OCR_ENDPOINT      Azure Document Intelligence endpoint
  AZURE_OCR_KEY           Azure Document Intelligence key
  SCAN2CSV_LLM_PROVIDER   Language-model provider (azure, openai, anthropic, ollama, …)
  SCAN2CSV_MODEL          Model or deployment id
  SCAN2CSV_SCHEMA         TOML schema file (default: built-in DEED fields)
  DOCUMENT_DIRECTORY      Batch input directory
  CSV_FILE_PATH           CSV store path
  OFFICE_NAME             Office name stamped on every row
  DOCUMENT_TYPE           Document type stamped on every row

  Provider credentials (e.g. AZURE_OPENAI_API_KEY, OPENAI_API_KEY) are read
  by the provider itself. A `.env` file in the working directory is loaded
  first.
"#;

/// Extract metadata from scanned documents into a CSV table.
#[derive(Parser, Debug)]
#[command(
    name = "scan2csv",
    version,
    about = "Extract metadata from scanned documents into a CSV table using OCR and LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Language-model provider: azure, openai, anthropic, gemini, ollama.
    #[arg(long, global = true, env = "SCAN2CSV_LLM_PROVIDER", default_value = "azure")]
    provider: String,

    /// Model or deployment id.
    #[arg(long, global = true, env = "SCAN2CSV_MODEL", default_value = "gpt-4o")]
    model: String,

    /// TOML file with the document type and field list.
    #[arg(long, global = true, env = "SCAN2CSV_SCHEMA")]
    schema: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SCAN2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SCAN2CSV_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every document in a directory and append rows to the CSV store.
    Batch(BatchArgs),
    /// Process one document and print its record as JSON (nothing is written).
    Process(ProcessArgs),
    /// Serve `GET /` and `GET /process?file_path=…` over HTTP.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
    /// Send a short prompt to the language model and print the reply.
    Check,
}

#[derive(Args, Debug)]
struct OcrArgs {
    /// Azure Document Intelligence endpoint.
    #[arg(long, env = "AZURE_OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// Azure Document Intelligence key.
    #[arg(long, env = "AZURE_OCR_KEY", hide_env_values = true)]
    ocr_key: Option<String>,

    /// Per-request OCR HTTP timeout in seconds.
    #[arg(long, env = "SCAN2CSV_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,
}

#[derive(Args, Debug)]
struct ExtractionArgs {
    /// Attempts for the extraction call before the document fails.
    #[arg(long, env = "SCAN2CSV_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    /// Base delay between extraction attempts (doubles each retry; 0 = none).
    #[arg(long, env = "SCAN2CSV_BACKOFF_MS", default_value_t = 0)]
    backoff_ms: u64,

    /// LLM temperature.
    #[arg(long, env = "SCAN2CSV_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Skip the per-page correction pass.
    #[arg(long, env = "SCAN2CSV_SKIP_CORRECTION")]
    skip_correction: bool,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Directory holding the scanned documents.
    #[arg(long, env = "DOCUMENT_DIRECTORY")]
    dir: Option<PathBuf>,

    /// CSV store to append to (created if missing).
    #[arg(long, env = "CSV_FILE_PATH")]
    csv: Option<PathBuf>,

    /// Office name stamped on every row.
    #[arg(long, env = "OFFICE_NAME")]
    office: Option<String>,

    /// Document type stamped on every row.
    #[arg(long, env = "DOCUMENT_TYPE")]
    document_type: Option<String>,

    /// Only process files directly inside the directory.
    #[arg(long)]
    no_recursive: bool,

    /// Print the batch report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SCAN2CSV_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    ocr: OcrArgs,

    #[command(flatten)]
    extraction: ExtractionArgs,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Document to process.
    file: PathBuf,

    #[command(flatten)]
    ocr: OcrArgs,

    #[command(flatten)]
    extraction: ExtractionArgs,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "SCAN2CSV_BIND", default_value = "127.0.0.1:5000")]
    bind: std::net::SocketAddr,

    #[command(flatten)]
    ocr: OcrArgs,

    #[command(flatten)]
    extraction: ExtractionArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; everything can come from the real env.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs during a batch.
    let show_progress = match &cli.command {
        Command::Batch(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    let model = Arc::new(
        LlmTextModel::from_provider_name(&cli.provider, &cli.model)
            .context("Failed to configure the language model")?,
    );

    match &cli.command {
        Command::Batch(args) => run_batch(&cli, args, model, show_progress).await,
        Command::Process(args) => {
            let pipeline = build_pipeline(&cli, &args.ocr, &args.extraction, model, None, true)?;
            let processed = pipeline
                .process_document(&args.file)
                .await
                .context("Processing failed")?;
            let json = serde_json::to_string_pretty(&processed.record)
                .context("Failed to serialise record")?;
            println!("{json}");
            Ok(())
        }
        #[cfg(feature = "server")]
        Command::Serve(args) => {
            let pipeline = build_pipeline(&cli, &args.ocr, &args.extraction, model, None, true)?;
            scan2csv::server::serve(args.bind, scan2csv::server::AppState::new(pipeline))
                .await
                .context("Server failed")
        }
        Command::Check => run_check(model.as_ref(), cli.quiet).await,
    }
}

async fn run_batch(
    cli: &Cli,
    args: &BatchArgs,
    model: Arc<LlmTextModel>,
    show_progress: bool,
) -> Result<()> {
    let dir = required(args.dir.clone(), "DOCUMENT_DIRECTORY", "--dir")?;
    let csv = required(args.csv.clone(), "CSV_FILE_PATH", "--csv")?;
    let office = required(args.office.clone(), "OFFICE_NAME", "--office")?;
    let document_type = required(args.document_type.clone(), "DOCUMENT_TYPE", "--document-type")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let pipeline = build_pipeline(
        cli,
        &args.ocr,
        &args.extraction,
        model,
        progress_cb,
        !args.no_recursive,
    )?;
    let store = Arc::new(CsvStore::new(&csv));
    let batch = BatchMetadata::new(office, document_type);

    let report = pipeline
        .process_directory(&dir, &batch, &store)
        .await
        .context("Batch failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {}/{} documents  {}ms  →  {}",
            if report.failed() == 0 { green("✔") } else { cyan("⚠") },
            report.written(),
            report.total(),
            report.duration_ms,
            bold(&csv.display().to_string()),
        );
    }
    Ok(())
}

async fn run_check(model: &dyn TextModel, quiet: bool) -> Result<()> {
    let request = ModelRequest::new(CONNECTION_CHECK_PROMPT, 50);
    let reply = model
        .complete(&request)
        .await
        .with_context(|| format!("{} did not respond", model.name()))?;
    if !quiet {
        eprintln!("{} {}", green("✔"), bold(model.name()));
    }
    println!("{}", reply.trim());
    Ok(())
}

fn build_pipeline(
    cli: &Cli,
    ocr: &OcrArgs,
    extraction: &ExtractionArgs,
    model: Arc<LlmTextModel>,
    progress_cb: Option<ProgressCallback>,
    recursive: bool,
) -> Result<Pipeline> {
    let endpoint = required(ocr.ocr_endpoint.clone(), "AZURE_OCR_ENDPOINT", "--ocr-endpoint")?;
    let key = required(ocr.ocr_key.clone(), "AZURE_OCR_KEY", "--ocr-key")?;
    let mut ocr_config = AzureOcrConfig::new(endpoint, key);
    ocr_config.request_timeout_secs = ocr.ocr_timeout;
    let ocr_client =
        AzureDocumentClient::new(ocr_config).context("Failed to configure the OCR client")?;

    let schema = match &cli.schema {
        Some(path) => DocumentSchema::load(path)
            .with_context(|| format!("Failed to load schema {}", path.display()))?,
        None => DocumentSchema::deed(),
    };

    let backoff = if extraction.backoff_ms == 0 {
        Backoff::None
    } else {
        Backoff::Exponential {
            base_ms: extraction.backoff_ms,
        }
    };

    let mut builder = PipelineConfig::builder()
        .temperature(extraction.temperature)
        .skip_correction(extraction.skip_correction)
        .recursive(recursive)
        .retry_policy(
            RetryPolicy::default()
                .max_attempts(extraction.max_attempts)
                .backoff(backoff),
        );
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    Ok(Pipeline::new(Arc::new(ocr_client), model, schema, config))
}

fn required<T>(value: Option<T>, env: &str, flag: &str) -> Result<T> {
    match value {
        Some(v) => Ok(v),
        None => bail!("missing required setting: set {env} or pass {flag}"),
    }
}
