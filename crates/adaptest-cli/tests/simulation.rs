//! End-to-end simulation tests: bank file → engine → report → export.

use std::path::Path;
use std::sync::Arc;

use adaptest_core::engine::{NoopReporter, SimulationConfig, SimulationEngine};
use adaptest_core::parser;
use adaptest_core::report::{PsychometricReport, ReportOptions};
use adaptest_core::selection::{BalancedStrategy, ExposureLedger};
use adaptest_core::statistics;
use adaptest_core::stopping::StopReason;
use adaptest_core::traits::Respondent;
use adaptest_report::export::write_export;
use adaptest_report::html::write_html_report;
use adaptest_respondents::{generate_population, MockRespondent};

fn load_bank() -> adaptest_core::bank::ItemBank {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../item-banks/emotional-state.toml");
    parser::parse_item_bank(&path).unwrap()
}

fn population(n: usize, seed: u64) -> Vec<Arc<dyn Respondent>> {
    generate_population("sim", n, 0.0, 1.0, seed)
        .unwrap()
        .into_iter()
        .map(|r| Arc::new(r) as Arc<dyn Respondent>)
        .collect()
}

#[tokio::test]
async fn simulated_population_recovers_theta() {
    let bank = Arc::new(load_bank());
    let engine = SimulationEngine::new(Arc::clone(&bank), SimulationConfig::default());
    let run = engine.run(&population(40, 11), &NoopReporter).await.unwrap();

    assert_eq!(run.respondent_count, 40);
    assert_eq!(run.sessions.len(), 40);
    assert!(run.failed_respondents.is_empty());
    assert!(run.sessions.iter().all(|s| s.is_complete));
    assert!(run
        .sessions
        .iter()
        .all(|s| (1..=15).contains(&s.responses.len())));
    assert!(run
        .sessions
        .iter()
        .all(|s| s.stop_reason != StopReason::Manual));

    let recovery = run.recovery().unwrap();
    assert_eq!(recovery.sessions, 40);
    assert!(recovery.rmse < 1.5, "rmse {}", recovery.rmse);

    // Higher true θ yields higher estimates on average.
    let (mut low, mut high) = (Vec::new(), Vec::new());
    for s in &run.sessions {
        let truth = run.true_thetas[&s.respondent_id];
        if truth < -0.5 {
            low.push(s.final_theta());
        } else if truth > 0.5 {
            high.push(s.final_theta());
        }
    }
    assert!(!low.is_empty() && !high.is_empty());
    assert!(statistics::mean(&high) > statistics::mean(&low));
}

#[tokio::test]
async fn fixed_midpoint_answers_drive_theta_down() {
    let bank = Arc::new(load_bank());
    let engine = SimulationEngine::new(Arc::clone(&bank), SimulationConfig::default());
    let neutral: Arc<dyn Respondent> = Arc::new(MockRespondent::with_fixed_response("neutral", 3.0));

    let run = engine.run(&[neutral], &NoopReporter).await.unwrap();
    assert_eq!(run.sessions.len(), 1);
    let session = &run.sessions[0];
    assert!(session.responses.iter().all(|r| !r.correct));
    assert!(session.final_theta() < -1.0);
    assert!(run.recovery().is_none());
}

#[tokio::test]
async fn balanced_strategy_spreads_exposure() {
    let bank = Arc::new(load_bank());
    let ledger = Arc::new(ExposureLedger::new());
    let strategy = BalancedStrategy::new(Arc::clone(&bank)).with_ledger(Arc::clone(&ledger));
    let engine = SimulationEngine::new(Arc::clone(&bank), SimulationConfig::default())
        .with_strategy(Arc::new(strategy))
        .with_exposure_ledger(Arc::clone(&ledger));

    let run = engine.run(&population(20, 3), &NoopReporter).await.unwrap();
    assert_eq!(run.sessions.len(), 20);

    let exposed = bank.iter().filter(|item| ledger.count(&item.id) > 0).count();
    assert!(exposed >= 12, "only {exposed} items were ever presented");
}

#[tokio::test]
async fn full_pipeline_writes_reports() {
    let bank = Arc::new(load_bank());
    let config = SimulationConfig {
        parallelism: 8,
        sessions_per_respondent: 2,
        ..SimulationConfig::default()
    };
    let engine = SimulationEngine::new(Arc::clone(&bank), config);
    let run = engine.run(&population(25, 5), &NoopReporter).await.unwrap();
    assert_eq!(run.sessions.len(), 50);

    let dir = tempfile::tempdir().unwrap();
    let sim_path = dir.path().join("simulation.json");
    run.save_json(&sim_path).unwrap();
    let loaded = adaptest_core::engine::SimulationReport::load_json(&sim_path).unwrap();
    assert_eq!(loaded.sessions.len(), 50);

    let report = PsychometricReport::generate(&loaded.sessions, &bank, &ReportOptions::default());
    assert_eq!(report.metrics.session_count, 50);
    assert_eq!(report.criteria.criteria.len(), 4);
    assert!(report.metrics.cross_validation.is_some());
    assert!((0.0..=1.0).contains(&report.metrics.predictive_accuracy));
    assert!(report.metrics.test_retest_reliability > 0.0);
    assert!(report.theta_summary.is_some());

    let report_path = dir.path().join("report.json");
    report.save_json(&report_path).unwrap();
    let reloaded = PsychometricReport::load_json(&report_path).unwrap();
    assert!(!reloaded.compare(&report, 0.05).has_regressions());

    write_html_report(&report, &dir.path().join("report.html")).unwrap();
    let paths = write_export(&loaded.sessions, &bank, dir.path(), "responses").unwrap();
    let csv = std::fs::read_to_string(paths.data).unwrap();
    let rows = csv.lines().count() - 1;
    assert_eq!(rows, loaded.sessions.iter().map(|s| s.responses.len()).sum::<usize>());
}
