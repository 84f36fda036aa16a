//! Simulation engine.
//!
//! Drives a population of respondents through adaptive sessions with bounded
//! parallelism. Each respondent runs its sessions in order inside its own
//! controller; all controllers share the bank, the ability store, the
//! selection strategy and the optional exposure ledger.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::bank::{BankSummary, ItemBank};
use crate::controller::AdaptiveController;
use crate::selection::{ExposureLedger, MaxInformation, SelectionStrategy};
use crate::session::{CompletedSession, SessionOptions};
use crate::statistics;
use crate::store::{AbilityStore, InMemoryAbilityStore};
use crate::traits::{ItemRequest, Respondent};

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Maximum respondents simulated at once.
    pub parallelism: usize,
    /// Sessions run back to back for every respondent.
    pub sessions_per_respondent: usize,
    pub session: SessionOptions,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            sessions_per_respondent: 1,
            session: SessionOptions::default(),
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_session_start(&self, session_id: &str, respondent_id: &str);
    fn on_session_complete(&self, session: &CompletedSession);
    fn on_respondent_error(&self, respondent_id: &str, error: &str);
    fn on_run_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_session_start(&self, _: &str, _: &str) {}
    fn on_session_complete(&self, _: &CompletedSession) {}
    fn on_respondent_error(&self, _: &str, _: &str) {}
    fn on_run_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

pub struct SimulationEngine {
    bank: Arc<ItemBank>,
    store: Arc<dyn AbilityStore>,
    strategy: Arc<dyn SelectionStrategy>,
    ledger: Option<Arc<ExposureLedger>>,
    config: SimulationConfig,
}

impl SimulationEngine {
    pub fn new(bank: Arc<ItemBank>, config: SimulationConfig) -> Self {
        Self {
            bank,
            store: Arc::new(InMemoryAbilityStore::new()),
            strategy: Arc::new(MaxInformation),
            ledger: None,
            config,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn AbilityStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn SelectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_exposure_ledger(mut self, ledger: Arc<ExposureLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    fn controller(&self) -> AdaptiveController {
        let ctl = AdaptiveController::new(Arc::clone(&self.bank), Arc::clone(&self.store))
            .with_strategy(Arc::clone(&self.strategy));
        match &self.ledger {
            Some(ledger) => ctl.with_exposure_ledger(Arc::clone(ledger)),
            None => ctl,
        }
    }

    /// Run every respondent through the configured number of sessions.
    pub async fn run(
        &self,
        population: &[Arc<dyn Respondent>],
        progress: &dyn ProgressReporter,
    ) -> Result<SimulationReport> {
        self.config.session.validate()?;
        if self.config.parallelism == 0 {
            anyhow::bail!("parallelism must be at least 1");
        }

        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism));

        let mut futures = FuturesUnordered::new();
        for respondent in population {
            let respondent = Arc::clone(respondent);
            let semaphore = Arc::clone(&semaphore);
            let mut controller = self.controller();
            let config = self.config.clone();

            futures.push(async move {
                let respondent_id = respondent.id().to_string();
                let inner = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("semaphore closed"))?;

                    let mut sessions = Vec::with_capacity(config.sessions_per_respondent);
                    for _ in 0..config.sessions_per_respondent {
                        let session = run_session(
                            &mut controller,
                            respondent.as_ref(),
                            &config.session,
                            progress,
                        )
                        .await?;
                        sessions.push(session);
                    }
                    anyhow::Ok(sessions)
                };
                let result = inner.await;
                (respondent_id, respondent.true_theta(), result)
            });
        }

        let total = futures.len();
        let mut sessions = Vec::new();
        let mut true_thetas = BTreeMap::new();
        let mut failed_respondents = Vec::new();

        while let Some((respondent_id, true_theta, result)) = futures.next().await {
            match result {
                Ok(done) => {
                    if let Some(theta) = true_theta {
                        true_thetas.insert(respondent_id, theta);
                    }
                    sessions.extend(done);
                }
                Err(e) => {
                    tracing::error!("simulation failed for respondent {respondent_id}: {e:#}");
                    progress.on_respondent_error(&respondent_id, &format!("{e:#}"));
                    failed_respondents.push(respondent_id);
                }
            }
        }

        let elapsed = start.elapsed();
        progress.on_run_complete(
            total,
            total - failed_respondents.len(),
            failed_respondents.len(),
            elapsed,
        );

        sessions.sort_by(|a, b| {
            a.respondent_id
                .cmp(&b.respondent_id)
                .then(a.start_time.cmp(&b.start_time))
        });
        failed_respondents.sort();

        tracing::info!(
            respondents = total,
            sessions = sessions.len(),
            failed = failed_respondents.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "simulation finished"
        );

        Ok(SimulationReport {
            id: run_id,
            created_at: Utc::now(),
            bank: self.bank.summary(),
            strategy: self.strategy.name().to_string(),
            config: self.config.clone(),
            respondent_count: total,
            sessions,
            true_thetas,
            failed_respondents,
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}

/// Drive one session to completion.
async fn run_session(
    controller: &mut AdaptiveController,
    respondent: &dyn Respondent,
    options: &SessionOptions,
    progress: &dyn ProgressReporter,
) -> Result<CompletedSession> {
    let session_id = Uuid::new_v4().to_string();
    controller.start_session(session_id.clone(), respondent.id(), options.clone())?;
    progress.on_session_start(&session_id, respondent.id());

    let mut sequence = 0;
    while let Some(item) = controller.select_next_question(&session_id) {
        sequence += 1;
        let request = ItemRequest {
            session_id: session_id.clone(),
            respondent_id: respondent.id().to_string(),
            sequence,
            item,
        };
        let answer = respondent
            .respond(&request)
            .await
            .with_context(|| format!("respondent failed on item {}", request.item.id))?;
        controller.process_response(
            &session_id,
            &request.item.id,
            answer.response,
            answer.time_spent_secs,
        )?;
    }

    let record = controller
        .complete_session(&session_id)
        .with_context(|| format!("session {session_id} did not complete"))?;
    progress.on_session_complete(&record);
    Ok(record)
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub bank: BankSummary,
    /// Selection strategy name.
    pub strategy: String,
    pub config: SimulationConfig,
    pub respondent_count: usize,
    /// Completed sessions ordered by respondent then start time.
    pub sessions: Vec<CompletedSession>,
    /// Generating θ of simulated respondents.
    #[serde(default)]
    pub true_thetas: BTreeMap<String, f64>,
    #[serde(default)]
    pub failed_respondents: Vec<String>,
    pub duration_ms: u64,
}

/// How well final estimates recover the generating θ.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub sessions: usize,
    /// Mean of estimate − truth.
    pub bias: f64,
    pub rmse: f64,
    pub mean_absolute_error: f64,
}

impl SimulationReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize simulation")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write simulation to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read simulation from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse simulation JSON")
    }

    /// Mean number of items answered per session.
    pub fn mean_questions(&self) -> f64 {
        let counts: Vec<f64> = self
            .sessions
            .iter()
            .map(|s| s.responses.len() as f64)
            .collect();
        statistics::mean(&counts)
    }

    /// Sessions per stop reason.
    pub fn stop_reasons(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for s in &self.sessions {
            *counts.entry(s.stop_reason.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Estimation error against known generating θ, if any were recorded.
    pub fn recovery(&self) -> Option<RecoveryStats> {
        let errors: Vec<f64> = self
            .sessions
            .iter()
            .filter_map(|s| {
                let truth = self.true_thetas.get(&s.respondent_id)?;
                Some(s.final_theta() - truth)
            })
            .collect();
        if errors.is_empty() {
            return None;
        }
        let n = errors.len() as f64;
        Some(RecoveryStats {
            sessions: errors.len(),
            bias: errors.iter().sum::<f64>() / n,
            rmse: (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt(),
            mean_absolute_error: errors.iter().map(|e| e.abs()).sum::<f64>() / n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Item, ResponseScale};
    use crate::stopping::StopReason;
    use crate::traits::RespondentAnswer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Agrees with every item easier than its θ.
    struct Threshold {
        id: String,
        theta: f64,
        calls: AtomicUsize,
    }

    impl Threshold {
        fn new(id: &str, theta: f64) -> Arc<dyn Respondent> {
            Arc::new(Self {
                id: id.into(),
                theta,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Respondent for Threshold {
        fn id(&self) -> &str {
            &self.id
        }

        async fn respond(&self, request: &ItemRequest) -> anyhow::Result<RespondentAnswer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = if request.item.difficulty < self.theta { 4.0 } else { 2.0 };
            Ok(RespondentAnswer {
                response,
                time_spent_secs: 2.5,
            })
        }

        fn true_theta(&self) -> Option<f64> {
            Some(self.theta)
        }
    }

    struct Broken;

    #[async_trait]
    impl Respondent for Broken {
        fn id(&self) -> &str {
            "broken"
        }

        async fn respond(&self, _: &ItemRequest) -> anyhow::Result<RespondentAnswer> {
            anyhow::bail!("respondent went away")
        }
    }

    fn bank() -> Arc<ItemBank> {
        let items = (0..24).map(|i| {
            Item::new(
                format!("q{i:02}"),
                Category::ALL[i % 4],
                -3.0 + 6.0 * i as f64 / 23.0,
                1.6,
                0.0,
                ResponseScale::likert5(),
            )
            .unwrap()
        });
        Arc::new(ItemBank::from_items("sim", "Simulation", items).unwrap())
    }

    #[tokio::test]
    async fn runs_every_respondent() {
        let engine = SimulationEngine::new(
            bank(),
            SimulationConfig {
                parallelism: 2,
                sessions_per_respondent: 2,
                ..Default::default()
            },
        );
        let population = vec![
            Threshold::new("r1", -1.0),
            Threshold::new("r2", 0.5),
            Threshold::new("r3", 1.5),
        ];

        let report = engine.run(&population, &NoopReporter).await.unwrap();
        assert_eq!(report.respondent_count, 3);
        assert_eq!(report.sessions.len(), 6);
        assert!(report.failed_respondents.is_empty());
        assert_eq!(report.strategy, "max-information");
        assert_eq!(report.bank.item_count, 24);

        for s in &report.sessions {
            assert!(s.is_complete);
            assert!(s.responses.len() <= 15);
            assert!(s.responses.len() >= 5 || s.stop_reason == StopReason::PoolExhausted);
        }
        assert_eq!(report.sessions[0].respondent_id, "r1");
        assert_eq!(report.true_thetas.len(), 3);

        let recovery = report.recovery().unwrap();
        assert_eq!(recovery.sessions, 6);
        assert!(recovery.rmse < 1.5);
        assert!(report.mean_questions() > 0.0);
        assert_eq!(report.stop_reasons().values().sum::<usize>(), 6);
    }

    #[tokio::test]
    async fn failed_respondents_are_reported() {
        let engine = SimulationEngine::new(bank(), SimulationConfig::default());
        let population: Vec<Arc<dyn Respondent>> =
            vec![Threshold::new("ok", 0.0), Arc::new(Broken)];
        let report = engine.run(&population, &NoopReporter).await.unwrap();
        assert_eq!(report.sessions.len(), 1);
        assert_eq!(report.failed_respondents, vec!["broken".to_string()]);
    }

    #[tokio::test]
    async fn invalid_session_options_abort_the_run() {
        let config = SimulationConfig {
            session: SessionOptions {
                max_questions: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = SimulationEngine::new(bank(), config);
        assert!(engine.run(&[], &NoopReporter).await.is_err());
    }

    #[tokio::test]
    async fn shared_ledger_sees_all_sessions() {
        let ledger = Arc::new(ExposureLedger::new());
        let engine = SimulationEngine::new(bank(), SimulationConfig::default())
            .with_exposure_ledger(Arc::clone(&ledger));
        let population = vec![Threshold::new("a", 0.0), Threshold::new("b", 0.2)];
        engine.run(&population, &NoopReporter).await.unwrap();
        assert_eq!(ledger.sessions(), 2);
    }

    #[tokio::test]
    async fn report_round_trips_through_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("runs").join("sim.json");
        let engine = SimulationEngine::new(bank(), SimulationConfig::default());
        let report = engine
            .run(&[Threshold::new("r", 0.3)], &NoopReporter)
            .await
            .unwrap();
        report.save_json(&path).unwrap();
        let loaded = SimulationReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.sessions.len(), report.sessions.len());
        assert_eq!(loaded.sessions[0].session_id, report.sessions[0].session_id);
        assert_eq!(
            loaded.sessions[0].responses.len(),
            report.sessions[0].responses.len()
        );
    }
}
