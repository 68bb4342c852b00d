//! # checkman
//!
//! AI-assisted API test runner: generates HTTP test cases from API
//! documentation, merges them with session-wide overrides and runs them
//! against the target, directly or through a local relay agent.

mod ai;
mod config;
mod domain;
mod http;
mod relay;
mod report;
mod telemetry;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Parser, Subcommand};

use crate::config::{ApiConfig, ImportedFile};
use crate::domain::{GeneratedTestPlan, TestStatus};
use crate::http::dispatch::{ResultStore, run_suite};

#[derive(Parser)]
#[command(name = "checkman", version, about = "AI-assisted API test runner")]
struct Cli {
    /// Log events to stderr and logs/checkman.log.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a test plan from API documentation.
    Generate {
        /// Session config file (JSON).
        #[arg(long, default_value = "checkman.json")]
        config: PathBuf,
        /// Documentation text file appended to the config's documentation.
        #[arg(long)]
        docs: Option<PathBuf>,
        /// Documentation attachment (PDF or text) sent to the model.
        #[arg(long)]
        attach: Option<PathBuf>,
        /// Where to write the generated plan.
        #[arg(long, default_value = "plan.json")]
        plan: PathBuf,
    },
    /// Run a generated test plan against the target API.
    Run {
        #[arg(long, default_value = "checkman.json")]
        config: PathBuf,
        #[arg(long, default_value = "plan.json")]
        plan: PathBuf,
        /// Write a Markdown report here.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Write a JSON result bundle here.
        #[arg(long)]
        bundle: Option<PathBuf>,
        /// Pause between cases, in milliseconds.
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },
    /// Start the local relay agent.
    Relay {
        #[arg(long, default_value = "127.0.0.1:3001")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::set_enabled(cli.verbose);

    match cli.command {
        Commands::Generate {
            config,
            docs,
            attach,
            plan,
        } => generate(&config, docs.as_deref(), attach.as_deref(), &plan).await,
        Commands::Run {
            config,
            plan,
            report,
            bundle,
            delay_ms,
        } => {
            run(
                &config,
                &plan,
                report.as_deref(),
                bundle.as_deref(),
                delay_ms,
            )
            .await
        }
        Commands::Relay { addr } => relay::run(&addr).await,
    }
}

async fn generate(
    config_path: &Path,
    docs: Option<&Path>,
    attach: Option<&Path>,
    plan_path: &Path,
) -> Result<()> {
    let mut config = ApiConfig::load(config_path)?;

    if let Some(docs) = docs {
        let text = fs::read_to_string(docs)
            .with_context(|| format!("failed to read `{}`", docs.display()))?;
        if !config.documentation.is_empty() {
            config.documentation.push_str("\n\n");
        }
        config.documentation.push_str(&text);
    }
    if let Some(attach) = attach {
        attach_file(&mut config, attach)?;
    }
    config.ensure_ready_for_generation()?;

    println!(
        "generating test plan with {} ({})...",
        config.ai.provider, config.ai.model_name
    );
    let plan =
        ai::generate_test_plan(&config.documentation, config.imported_file.as_ref(), &config.ai)
            .await?;
    if plan.cases.is_empty() {
        bail!("no test cases were generated; check that the documentation is clear");
    }

    for field in config.absorb_extracted(&plan.config) {
        println!("filled {field} from the documentation");
    }

    let raw = serde_json::to_string_pretty(&plan)?;
    fs::write(plan_path, raw)
        .with_context(|| format!("failed to write `{}`", plan_path.display()))?;
    println!("wrote {} test cases to {}", plan.cases.len(), plan_path.display());
    Ok(())
}

/// Attach a documentation file. Plain-text formats are appended to the
/// documentation directly; binary formats travel as base64 inline data.
fn attach_file(config: &mut ApiConfig, path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if matches!(extension.as_str(), "txt" | "md" | "markdown") {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        if !config.documentation.is_empty() {
            config.documentation.push_str("\n\n");
        }
        config.documentation.push_str(&text);
        return Ok(());
    }

    let bytes =
        fs::read(path).with_context(|| format!("failed to read `{}`", path.display()))?;
    let mime_type = if extension == "pdf" {
        "application/pdf"
    } else {
        "application/octet-stream"
    };
    config.imported_file = Some(ImportedFile {
        name,
        mime_type: mime_type.to_string(),
        data: BASE64.encode(bytes),
    });
    Ok(())
}

async fn run(
    config_path: &Path,
    plan_path: &Path,
    report_path: Option<&Path>,
    bundle_path: Option<&Path>,
    delay_ms: u64,
) -> Result<()> {
    let mut config = ApiConfig::load(config_path)?;
    let raw = fs::read_to_string(plan_path)
        .with_context(|| format!("failed to read plan `{}`", plan_path.display()))?;
    let plan: GeneratedTestPlan = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse plan `{}`", plan_path.display()))?;

    config.absorb_extracted(&plan.config);
    config.ensure_ready_for_run()?;
    // Runs execute against an immutable snapshot of the session config.
    let config = config;

    println!(
        "running {} cases against {}{}",
        plan.cases.len(),
        config.base_url,
        if config.use_server_proxy { " (via relay)" } else { "" }
    );

    let mut store = ResultStore::default();
    run_suite(
        &config,
        &plan.cases,
        Duration::from_millis(delay_ms),
        &mut store,
        |case, result| {
            let icon = match result.status {
                TestStatus::Pass => "✅",
                TestStatus::Fail => "❌",
                TestStatus::Error => "⚠️",
            };
            println!(
                "{icon} {} {} {} (expected {}, got {}, {} ms)",
                result.status, case.method, case.endpoint, case.expected_status,
                result.actual_status, result.latency_ms
            );
            if let Some(message) = &result.error_message {
                println!("   {message}");
            }
        },
    )
    .await;

    let stats = store.stats(plan.cases.len());
    println!(
        "\n{} passed, {} failed, {} errors out of {} ({}% pass rate, avg {} ms)",
        stats.passed,
        stats.failed,
        stats.errors,
        stats.total,
        stats.pass_rate_percent(),
        stats.avg_latency_ms
    );

    if let Some(path) = report_path {
        let markdown = report::markdown_report(&plan.cases, &store, &config);
        fs::write(path, markdown)
            .with_context(|| format!("failed to write `{}`", path.display()))?;
        println!("wrote report to {}", path.display());
    }
    if let Some(path) = bundle_path {
        let bundle = report::json_bundle(&plan.cases, &store, &config);
        fs::write(path, serde_json::to_string_pretty(&bundle)?)
            .with_context(|| format!("failed to write `{}`", path.display()))?;
        println!("wrote result bundle to {}", path.display());
    }

    if stats.failed + stats.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}
