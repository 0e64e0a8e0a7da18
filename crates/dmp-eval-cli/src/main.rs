//! DMP Evaluator CLI
//!
//! The `dmp-eval` command runs conformance tests against machine-actionable
//! Data Management Plans and keeps the results in append-only reports.
//!
//! ## Commands
//!
//! - `plugins`: List the registered evaluator plugins
//! - `import`: Load tests, metrics and benchmarks from a catalog bundle
//! - `tests`: List catalog tests
//! - `evaluate-test` / `evaluate-benchmark`: Evaluate a plan
//! - `report`: Show a report with its evaluations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dmp_eval_core::metrics::METRICS;
use dmp_eval_core::{
    builtin_registry, ingest_path, CatalogBundle, CatalogService, EngineConfig, EvaluationManager,
    EvaluationResult, ReportSummary, SharedRegistry, Stores,
};
use dmp_eval_lookup::{FairChampionClient, UnpaywallClient};
use dmp_eval_state::{BenchmarkId, ReportId, TestId};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "dmp-eval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate machine-actionable Data Management Plans", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered evaluator plugins and their functions
    Plugins,

    /// Import a catalog bundle (tests, metrics, benchmarks)
    Import {
        /// Path to the catalog bundle (JSON)
        #[arg(short, long)]
        catalog: PathBuf,
    },

    /// List catalog tests
    Tests,

    /// Evaluate a plan with a single test
    EvaluateTest {
        /// Path to the maDMP document (JSON)
        #[arg(short, long)]
        plan: PathBuf,

        /// Test id
        #[arg(short, long)]
        test: String,

        /// Report to append to (a new report is started when omitted)
        #[arg(short, long)]
        report: Option<String>,
    },

    /// Evaluate a plan with every test of a benchmark
    EvaluateBenchmark {
        /// Path to the maDMP document (JSON)
        #[arg(short, long)]
        plan: PathBuf,

        /// Benchmark id
        #[arg(short, long)]
        benchmark: String,

        /// Report to append to (a new report is started when omitted)
        #[arg(short, long)]
        report: Option<String>,
    },

    /// Show a report and its evaluations
    Report {
        /// Report id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    dmp_eval_core::telemetry::init_tracing(cli.json, level);

    let db = dmp_eval_state::handle::connect_from_env()
        .await
        .context("Failed to connect to the evaluator database")?;
    let stores = Stores::surreal(db);

    let outcome = match cli.command {
        Commands::Plugins => cmd_plugins(),
        Commands::Import { catalog } => cmd_import(stores, &catalog).await,
        Commands::Tests => cmd_tests(stores).await,
        Commands::EvaluateTest { plan, test, report } => {
            let manager = manager(stores)?;
            let document = ingest_path(&plan)
                .with_context(|| format!("Failed to read plan {}", plan.display()))?;
            let report = report.map(ReportId::from);
            let result = manager
                .evaluate_test(&TestId::from(test), &document, report.as_ref())
                .await?;
            print_result(&result)
        }
        Commands::EvaluateBenchmark {
            plan,
            benchmark,
            report,
        } => {
            let manager = manager(stores)?;
            let document = ingest_path(&plan)
                .with_context(|| format!("Failed to read plan {}", plan.display()))?;
            let report = report.map(ReportId::from);
            let result = manager
                .evaluate_benchmark(&BenchmarkId::from(benchmark), &document, report.as_ref())
                .await?;
            print_result(&result)
        }
        Commands::Report { id } => cmd_report(stores, &ReportId::from(id)).await,
    };

    METRICS.flush();
    outcome
}

fn registry() -> Result<SharedRegistry> {
    let open_access = UnpaywallClient::from_env().context("Failed to build Unpaywall client")?;
    let fair = FairChampionClient::from_env().context("Failed to build FAIR Champion client")?;
    let registry = builtin_registry(Arc::new(open_access), Arc::new(fair))?;
    Ok(SharedRegistry::new(registry))
}

fn manager(stores: Stores) -> Result<EvaluationManager> {
    let config = EngineConfig::from_env().context("Invalid engine configuration")?;
    Ok(EvaluationManager::new(stores, Arc::new(registry()?), config))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_result(result: &EvaluationResult) -> Result<()> {
    let summary = ReportSummary::from_evaluations(&result.report_id, &result.evaluations);
    info!(report_id = %result.report_id, "{summary}");
    print_json(result)
}

fn cmd_plugins() -> Result<()> {
    let registry = registry()?;
    print_json(&registry.snapshot().list_all())
}

async fn cmd_import(stores: Stores, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    let bundle: CatalogBundle =
        serde_json::from_str(&text).context("Catalog bundle is not valid JSON")?;
    let summary = CatalogService::new(stores).import_catalog(bundle).await?;
    println!(
        "Imported {} tests, {} metrics, {} benchmarks",
        summary.tests, summary.metrics, summary.benchmarks
    );
    Ok(())
}

async fn cmd_tests(stores: Stores) -> Result<()> {
    let tests = CatalogService::new(stores).list_tests().await?;
    if tests.is_empty() {
        println!("No tests in the catalog");
        return Ok(());
    }
    for test in tests {
        println!(
            "{}  {}::{}  {}",
            test.test_id, test.evaluator, test.function, test.title
        );
    }
    Ok(())
}

async fn cmd_report(stores: Stores, report_id: &ReportId) -> Result<()> {
    let manager = EvaluationManager::new(
        stores,
        Arc::new(SharedRegistry::new(dmp_eval_core::PluginRegistry::builder().build())),
        EngineConfig::default(),
    );
    let full = manager.get_full_report(report_id).await?;
    let summary = ReportSummary::from_evaluations(report_id, &full.evaluations);
    info!(report_id = %report_id, "{summary}");
    print_json(&full)
}
