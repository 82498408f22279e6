//! CLI binary for score2pdf.
//!
//! A thin shim over the library crate: reads the score-player state (or an
//! explicit page list), maps flags to `GenerationConfig` and writes the PDF
//! into the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use score2pdf::{
    DirectorySaver, GenerationConfig, GenerationProgressCallback, GenerationState, ImageFormat,
    PageSize, PageSource, PdfGenerator, ProgressCallback, Score2PdfError, ScoreInfo,
};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal stand-in for the download button: shows "Processing…" while a
/// request runs and clears itself when it ends, whatever the outcome.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::hidden();
        Arc::new(Self { bar })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Processing…");
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_state_change(&self, state: GenerationState) {
        self.bar.set_message(state.to_string());
    }

    fn on_page_acquired(&self, _page_num: usize, _total_pages: usize) {
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(error)
        ));
    }

    fn on_generation_complete(&self, _success: bool, _from_cache: bool) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate from a saved score-player state
  score2pdf state.json -o scores/

  # Force PNG pages and bound parallel downloads
  score2pdf state.json --format png --concurrency 4

  # Explicit page list (local files or URLs), in order
  score2pdf --page p/score_0.svg --page p/score_1.svg --name Prelude

  # Show the alternative downloads for a score
  score2pdf state.json --list-targets

STATE FILE:
  The JSON of the player's state object, either the whole global
  ({"UGAPP": {"store": {"jmuse_settings": {"score_player": ...}}}}) or the
  score_player object itself. Required: json.id and urls.image_path.
  A state without them is ignored silently.
"#;

/// Assemble sheet-music page images (SVG or PNG) into one PDF.
#[derive(Parser, Debug)]
#[command(
    name = "score2pdf",
    version,
    about = "Assemble sheet-music page images (SVG or PNG) into one PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Score-player state JSON file ("-" reads stdin).
    state: Option<PathBuf>,

    /// Page URL or path, in page order. Repeat for each page.
    #[arg(long = "page", value_name = "URL")]
    pages: Vec<String>,

    /// URL of one rendered page, used to detect the format with --page.
    #[arg(long)]
    sample: Option<String>,

    /// Output file name without extension. Default: derived from the title.
    #[arg(short, long, env = "SCORE2PDF_NAME")]
    name: Option<String>,

    /// Directory the PDF is written to.
    #[arg(short, long, env = "SCORE2PDF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Page format; detected from the sample page when omitted.
    #[arg(long, env = "SCORE2PDF_FORMAT", value_enum)]
    format: Option<FormatArg>,

    /// Maximum parallel page downloads (default: all at once).
    #[arg(short, long, env = "SCORE2PDF_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-page fetch timeout in seconds.
    #[arg(long, env = "SCORE2PDF_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Retries per page on transient fetch failures.
    #[arg(long, env = "SCORE2PDF_RETRIES", default_value_t = 0)]
    retries: u32,

    /// Initial retry backoff in milliseconds (doubles each attempt).
    #[arg(long, env = "SCORE2PDF_RETRY_BACKOFF", default_value_t = 500)]
    retry_backoff: u64,

    /// Page size for SVG scores: letter, a4 or WIDTHxHEIGHT in points.
    #[arg(long, env = "SCORE2PDF_PAGE_SIZE", default_value = "letter")]
    page_size: String,

    /// Page size for PNG scores (default: first page's pixel size).
    #[arg(long, env = "SCORE2PDF_PNG_PAGE_SIZE")]
    png_page_size: Option<String>,

    /// Do not load system fonts for text in SVG pages.
    #[arg(long)]
    no_system_fonts: bool,

    /// Write uncompressed streams.
    #[arg(long)]
    no_compress: bool,

    /// Print the download targets for the score and exit.
    #[arg(long)]
    list_targets: bool,

    /// Print a JSON summary instead of text.
    #[arg(long, env = "SCORE2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SCORE2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCORE2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SCORE2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Svg,
    Png,
}

impl From<FormatArg> for ImageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Svg => ImageFormat::Svg,
            FormatArg::Png => ImageFormat::Png,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose mode always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_targets;
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

    // ── Resolve the page source ──────────────────────────────────────────
    let score = match cli.state {
        Some(ref path) => match read_score(path)? {
            Some(score) => Some(score),
            // Host state without a score: nothing to augment.
            None => return Ok(()),
        },
        None => None,
    };

    if cli.list_targets {
        let score = score.context("--list-targets needs a state file")?;
        print_targets(&score, cli.json)?;
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let (source, name) = if !cli.pages.is_empty() {
        let mut source = PageSource::new(cli.pages.clone());
        source.sample = cli.sample.clone().or_else(|| cli.pages.first().cloned());
        let name = cli
            .name
            .clone()
            .or_else(|| score.as_ref().map(ScoreInfo::file_stem))
            .unwrap_or_else(|| "score".to_string());
        (source, name)
    } else if let Some(ref score) = score {
        let name = cli.name.clone().unwrap_or_else(|| score.file_stem());
        (score.page_source(config.format), name)
    } else {
        anyhow::bail!("Nothing to do: pass a state file or at least one --page");
    };
    debug!("Page source: {:?}", source);

    // ── Run generation ───────────────────────────────────────────────────
    let saver = Arc::new(DirectorySaver::new(&cli.output_dir));
    let generator = PdfGenerator::with_http(config, saver.clone())
        .context("Failed to set up page loader")?;

    let doc = generator
        .generate(&source, &name)
        .await
        .context("PDF generation failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} {} pages  {}  {}ms  →  {}",
            green("✔"),
            doc.page_count,
            doc.format,
            dim(&format!("{} bytes", doc.byte_len)),
            doc.duration_ms,
            bold(&saver.path_for(&doc.file_name).display().to_string()),
        );
    }

    Ok(())
}

/// Read and parse the state file. `Ok(None)` when it describes no score.
fn read_score(path: &Path) -> Result<Option<ScoreInfo>> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read state from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {:?}", path))?
    };

    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("State file {:?} is not JSON", path))?;

    match ScoreInfo::from_host_state(&value) {
        Ok(score) => Ok(Some(score)),
        Err(Score2PdfError::MissingHostState { reason }) => {
            warn!("No score player state ({reason}); nothing to do");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_targets(score: &ScoreInfo, json: bool) -> Result<()> {
    let targets = score.download_targets();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&targets).context("Failed to serialise targets")?
        );
        return Ok(());
    }
    for target in targets {
        let url = match target.url {
            Some(url) => url,
            None if target.label == "PDF" => format!("{}.pdf (generated)", score.file_stem()),
            None => dim("unavailable"),
        };
        println!("{:<10} {}", target.label, url);
    }
    Ok(())
}

/// Map CLI args to `GenerationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .fetch_timeout_secs(cli.timeout)
        .max_retries(cli.retries)
        .retry_backoff_ms(cli.retry_backoff)
        .svg_page_size(PageSize::parse(&cli.page_size).context("Invalid --page-size")?)
        .system_fonts(!cli.no_system_fonts)
        .compress(!cli.no_compress);

    if let Some(format) = cli.format {
        builder = builder.format(format.into());
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(ref size) = cli.png_page_size {
        builder = builder.png_page_size(PageSize::parse(size).context("Invalid --png-page-size")?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
