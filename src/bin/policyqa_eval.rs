//! Batch audit: runs an evaluation suite through the full pipeline and
//! exits non-zero when any case misses its quality gate.
//!
//! ```bash
//! policyqa-eval --suite config/audit_suite.yml
//! policyqa-eval --json            # built-in suite, JSON summary on stdout
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use policyqa_backend::core::config::{AppPaths, ConfigService, PipelineSettings};
use policyqa_backend::core::logging;
use policyqa_backend::evaluation::suite::{run_suite, EvalSuite};
use policyqa_backend::pipeline::PipelineContext;

#[derive(Debug, Parser)]
#[command(name = "policyqa-eval", about = "Run the policy QA evaluation suite")]
struct Args {
    /// Suite file (YAML). Defaults to the built-in suite.
    #[arg(long)]
    suite: Option<PathBuf>,

    /// Suite file given positionally.
    #[arg(conflicts_with = "suite")]
    suite_path: Option<PathBuf>,

    /// Project root holding config.yml and the policy documents.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Print the summary as JSON instead of tables.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let paths = Arc::new(match &args.root {
        Some(root) => AppPaths::rooted_at(root),
        None => AppPaths::new(),
    });
    logging::init_with_file(&paths, "eval.log");

    let raw = ConfigService::new(paths.clone())
        .load_config()
        .context("Failed to load configuration")?;
    let settings = PipelineSettings::from_config(&raw).with_env_overrides();

    let suite = match args.suite.as_ref().or(args.suite_path.as_ref()) {
        Some(path) => EvalSuite::load(&paths.resolve(&path.to_string_lossy()))
            .with_context(|| format!("Failed to load suite {}", path.display()))?,
        None => EvalSuite::default_suite(),
    };

    let ctx = PipelineContext::initialize(&paths, settings)
        .await
        .context("Failed to initialize the policy pipeline")?;

    tracing::info!("Running {} evaluation cases", suite.cases.len());
    let summary = run_suite(&ctx, &suite).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.render());
    }

    if summary.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!("{} case(s) failed their gate", summary.failed_count());
        Ok(ExitCode::FAILURE)
    }
}
