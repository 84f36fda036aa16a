//! The `adaptest simulate` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use adaptest_core::engine::{ProgressReporter, SimulationEngine, SimulationReport};
use adaptest_core::parser;
use adaptest_core::selection::{BalancedStrategy, ExposureLedger, MaxInformation};
use adaptest_core::session::CompletedSession;
use adaptest_respondents::config::load_config_from;
use adaptest_respondents::simulated::DEFAULT_MEAN_TIME_SECS;
use adaptest_respondents::{create_population, RespondentConfig};

/// Respondents simulated when neither the config nor the flags name any.
const DEFAULT_POPULATION: usize = 100;

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_session_start(&self, _session_id: &str, _respondent_id: &str) {}

    fn on_session_complete(&self, session: &CompletedSession) {
        eprintln!(
            "  Done: {} θ {:+.2} SE {:.2} ({} items, {})",
            session.respondent_id,
            session.final_theta(),
            session.final_ability.standard_error,
            session.responses.len(),
            session.stop_reason,
        );
    }

    fn on_respondent_error(&self, respondent_id: &str, error: &str) {
        eprintln!("  ERROR: {respondent_id}: {error}");
    }

    fn on_run_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} respondents succeeded, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    bank_path: PathBuf,
    respondents: Option<usize>,
    parallelism: Option<usize>,
    seed: Option<u64>,
    strategy: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(p) = parallelism {
        anyhow::ensure!(p >= 1, "parallelism must be at least 1");
        config.parallelism = p;
    }
    if let Some(s) = seed {
        config.seed = s;
    }
    let count = match respondents {
        Some(n) => {
            anyhow::ensure!(n >= 1, "respondents must be at least 1");
            Some(n)
        }
        None if config.respondents.is_empty() => Some(DEFAULT_POPULATION),
        None => None,
    };
    if let Some(count) = count {
        config.respondents.clear();
        config.respondents.insert(
            "sim".into(),
            RespondentConfig::Simulated {
                count,
                theta: None,
                mean: 0.0,
                std_dev: 1.0,
                mean_time_secs: DEFAULT_MEAN_TIME_SECS,
            },
        );
    }

    let bank = Arc::new(parser::load_item_bank(&bank_path)?);
    anyhow::ensure!(!bank.is_empty(), "item bank {} has no items", bank.name());
    let population = create_population(&config)?;

    let mut engine = SimulationEngine::new(Arc::clone(&bank), config.simulation_config());
    match strategy.as_str() {
        "max-information" | "mfi" => {
            engine = engine.with_strategy(Arc::new(MaxInformation));
        }
        "balanced" => {
            let ledger = Arc::new(ExposureLedger::new());
            let balanced = BalancedStrategy::new(Arc::clone(&bank)).with_ledger(Arc::clone(&ledger));
            engine = engine
                .with_strategy(Arc::new(balanced))
                .with_exposure_ledger(ledger);
        }
        other => anyhow::bail!("unknown strategy '{other}'. Available: max-information, balanced"),
    }
    tracing::debug!(strategy = %strategy, respondents = population.len(), "engine configured");

    eprintln!(
        "adaptest v{}: simulating {} respondents x {} sessions on '{}' ({} items)",
        env!("CARGO_PKG_VERSION"),
        population.len(),
        config.sessions_per_respondent,
        bank.name(),
        bank.len()
    );
    eprintln!();

    let report = engine.run(&population, &ConsoleReporter).await?;
    print_summary(&report);

    let output = output.unwrap_or_else(|| config.output_dir.clone());
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
    let path = output.join(format!("simulation-{timestamp}.json"));
    report.save_json(&path)?;
    eprintln!("Simulation saved to: {}", path.display());

    Ok(())
}

fn print_summary(report: &SimulationReport) {
    use comfy_table::{Cell, Table};

    let precisions: Vec<f64> = report
        .sessions
        .iter()
        .map(|s| s.final_ability.standard_error)
        .collect();
    let mean_se = if precisions.is_empty() {
        0.0
    } else {
        precisions.iter().sum::<f64>() / precisions.len() as f64
    };

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![Cell::new("Strategy"), Cell::new(&report.strategy)]);
    table.add_row(vec![
        Cell::new("Respondents"),
        Cell::new(report.respondent_count),
    ]);
    table.add_row(vec![Cell::new("Sessions"), Cell::new(report.sessions.len())]);
    table.add_row(vec![
        Cell::new("Failed respondents"),
        Cell::new(report.failed_respondents.len()),
    ]);
    table.add_row(vec![
        Cell::new("Mean questions"),
        Cell::new(format!("{:.1}", report.mean_questions())),
    ]);
    table.add_row(vec![
        Cell::new("Mean final SE"),
        Cell::new(format!("{mean_se:.3}")),
    ]);
    if let Some(recovery) = report.recovery() {
        table.add_row(vec![
            Cell::new("θ bias"),
            Cell::new(format!("{:+.3}", recovery.bias)),
        ]);
        table.add_row(vec![
            Cell::new("θ RMSE"),
            Cell::new(format!("{:.3}", recovery.rmse)),
        ]);
    }
    for (reason, count) in report.stop_reasons() {
        table.add_row(vec![
            Cell::new(format!("Stopped: {reason}")),
            Cell::new(count),
        ]);
    }

    eprintln!("\n{table}");
}
