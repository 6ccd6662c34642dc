//! CLI binary for edgequake-labreport.
//!
//! A thin shim over the library crate: maps CLI flags to `AnalysisConfig`,
//! drives one `AnalysisSession` through select → analyze, and prints the
//! report.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_labreport::pipeline::input::resolve_input;
use edgequake_labreport::{
    format_test_date, run_analysis, AnalysisConfig, AnalysisItem, AnalysisResult, AnalysisSession,
    LabStatus, SessionObserver, SessionPhase,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn blue(s: &str) -> String {
    format!("\x1b[34m{s}\x1b[0m")
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

fn paint(status: LabStatus, s: &str) -> String {
    match status {
        LabStatus::Normal => green(s),
        LabStatus::High => yellow(s),
        LabStatus::Low => blue(s),
        LabStatus::Critical => red(s),
    }
}

// ── Spinner observer ─────────────────────────────────────────────────────────

/// Shows a spinner while the request is in flight and stops it when the
/// session reports a result or an error.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn start(file_name: &str) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Analizando");
        bar.set_message(file_name.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl SessionObserver for SpinnerObserver {
    fn on_results_ready(&self, result: &AnalysisResult) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} valores extraídos",
            green("✔"),
            bold(&result.results.len().to_string())
        );
    }

    fn on_error(&self, _message: &str) {
        self.bar.finish_and_clear();
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze a local report
  labreport hemograma.pdf

  # Only the values outside the reference range, with clinical detail
  labreport --only-abnormal --detailed hemograma.pdf

  # Analyze a report from a URL against another backend
  labreport --api-base https://lab.example.com/api https://example.com/informe.pdf

  # Structured JSON on stdout
  labreport --json hemograma.pdf > resultado.json

ENVIRONMENT VARIABLES:
  LABREPORT_API_BASE      Base URL of the generation service
  LABREPORT_MODEL         Model name sent with each request
  RUST_LOG                Overrides the log filter (e.g. edgequake_labreport=debug)

The report is informative only. Always check the results with your doctor.
"#;

/// Read a medical lab report PDF and explain the results.
#[derive(Parser, Debug)]
#[command(
    name = "labreport",
    version,
    about = "Read a medical lab report PDF with AI and explain the results",
    long_about = "Send a laboratory report (local PDF or URL) to a generative model behind a \
JSON-schema-constrained endpoint and print the extracted values, their status against the \
reference range, and a plain-language explanation of each.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Base URL of the generation service.
    #[arg(long, env = "LABREPORT_API_BASE", default_value = edgequake_labreport::config::DEFAULT_API_BASE)]
    api_base: String,

    /// Model name sent with the request.
    #[arg(short, long, env = "LABREPORT_MODEL", default_value = edgequake_labreport::config::DEFAULT_MODEL)]
    model: String,

    /// Read the extraction prompt from this file instead of the built-in one.
    #[arg(long, env = "LABREPORT_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Analysis request timeout in seconds.
    #[arg(long, env = "LABREPORT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Upper bound on generated tokens.
    #[arg(long, env = "LABREPORT_MAX_OUTPUT_TOKENS", default_value_t = 4000)]
    max_output_tokens: u32,

    /// HTTP download timeout in seconds (URL inputs only).
    #[arg(long, env = "LABREPORT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// List only values outside the reference range.
    #[arg(long, env = "LABREPORT_ONLY_ABNORMAL")]
    only_abnormal: bool,

    /// Include the clinical interpretation of each value.
    #[arg(long, env = "LABREPORT_DETAILED")]
    detailed: bool,

    /// Output the normalized result as JSON instead of the report.
    #[arg(long, env = "LABREPORT_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "LABREPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LABREPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the report itself.
    #[arg(short, long, env = "LABREPORT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives the feedback that matters; library INFO logs would
    // only fight with it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let config = build_config(&cli).await?;

    // ── Select file ──────────────────────────────────────────────────────
    let doc = resolve_input(&cli.input, config.download_timeout_secs)
        .await
        .with_context(|| format!("No se pudo abrir '{}'", cli.input))?;
    let file_name = doc.name.clone();

    let mut session = AnalysisSession::new();
    if show_progress {
        session.subscribe(SpinnerObserver::start(&file_name));
    }
    session
        .select_file(Some(doc.into()))
        .context("Archivo rechazado")?;
    if cli.only_abnormal {
        session.toggle_only_abnormal();
    }
    if cli.detailed {
        session.toggle_detailed_view();
    }

    // ── Analyze ──────────────────────────────────────────────────────────
    let session = Mutex::new(session);
    let phase = run_analysis(&session, &config)
        .await
        .context("No se pudo iniciar el análisis")?;
    let session = session.into_inner();

    if phase != SessionPhase::ResultShown {
        bail!("{}", session.status_message());
    }
    let Some(result) = session.result() else {
        bail!("{}", session.status_message());
    };

    if let Some(advisory) = session.advisory() {
        eprintln!("{} {}", yellow("⚠"), advisory);
    }

    if cli.json {
        let json = serde_json::to_string_pretty(result).context("Failed to serialise result")?;
        println!("{json}");
        return Ok(());
    }

    print_report(&session, result);
    if !cli.quiet {
        eprintln!("{}", dim(&session.status_message()));
    }
    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .api_base(&cli.api_base)
        .model(&cli.model)
        .api_timeout_secs(cli.api_timeout)
        .max_output_tokens(cli.max_output_tokens)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

// ── Report rendering ─────────────────────────────────────────────────────────

fn print_report(session: &AnalysisSession, result: &AnalysisResult) {
    println!("{}", bold("Resultados del análisis"));
    println!("  Paciente:     {}", result.patient_name);
    println!("  Fecha:        {}", format_test_date(&result.test_date));
    println!("  Laboratorio:  {}", result.laboratory);
    println!("  Médico:       {}", result.doctor);
    if let Some(c) = result.confidence {
        println!("  Confianza:    {:.0}%", c * 100.0);
    }

    let counts = result.stats();
    println!();
    println!(
        "  {} total   {} normales   {} altos   {} bajos   {} críticos",
        bold(&counts.total.to_string()),
        green(&counts.normal.to_string()),
        yellow(&counts.high.to_string()),
        blue(&counts.low.to_string()),
        red(&counts.critical.to_string()),
    );

    let critical = session.critical_items();
    if !critical.is_empty() {
        println!();
        println!(
            "{} {}",
            red("⚠"),
            bold("Valores críticos: consultá con tu médico a la brevedad.")
        );
        for item in critical {
            println!("    {}", red(&item.test_name));
        }
    }

    let items = session.visible_items();
    println!();
    if items.is_empty() {
        if session.show_only_abnormal() && counts.total > 0 {
            println!("  {}", green("Todos los valores están dentro del rango normal."));
        } else {
            println!("  {}", dim("No se encontraron valores en el informe."));
        }
    }
    for item in items {
        print_item(item, session.show_detailed_view());
    }

    println!();
    println!("{}", bold("Resumen"));
    println!("  {}", result.summary);

    println!();
    println!("{}", bold("Recomendaciones"));
    for rec in &result.recommendations {
        println!("  • {rec}");
    }

    println!();
    println!(
        "{}",
        dim("Este análisis es informativo. Consultá siempre con tu médico.")
    );
}

fn print_item(item: &AnalysisItem, detailed: bool) {
    let value = match (&item.value, &item.unit) {
        (Some(v), Some(u)) => format!("{v} {u}"),
        (Some(v), None) => v.clone(),
        _ => "-".to_string(),
    };
    println!(
        "  {} {}  {}  {}",
        paint(item.status, item.status.icon()),
        bold(&item.test_name),
        value,
        paint(item.status, item.status.label()),
    );
    if let Some(ref range) = item.reference_range {
        println!("      {} {}", dim("Referencia:"), range);
    }
    println!("      {}", item.simplified_explanation);
    if detailed {
        println!("      {} {}", cyan("Interpretación:"), item.clinical_interpretation);
        if let Some(ref explanation) = item.explanation {
            println!("      {} {}", dim("Detalle:"), explanation);
        }
    }
    if let Some(ref warning) = item.warning {
        println!("      {} {}", yellow("⚠"), warning);
    }
}
