//! Fans a symbol's analysis out to every registered producer, tolerates
//! partial failure, and synthesizes a confidence-weighted recommendation.

use advisor_core::{
    AgentKind, AgentRun, Analysis, AnalysisConfig, AnalysisError, AnalysisProducer, MissingAgent,
    Recommendation, RecommendationStore, RunRecorder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

pub mod admission;
pub mod screener;
mod synthesis;
#[cfg(test)]
pub(crate) mod testutil;

pub use admission::{AdmissionController, AdmissionPermit};
pub use screener::{rank_by_analysis_score, value_score, ScreeningPipeline};

/// Time box for each individual audit write. Audit failures are logged and
/// swallowed; they never affect the analysis result.
const AUDIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one producer task
enum ProducerOutcome {
    Success(Analysis),
    Missing { kind: AgentKind, reason: String },
}

pub struct Orchestrator {
    producers: Vec<Arc<dyn AnalysisProducer>>,
    recorder: Arc<dyn RunRecorder>,
    store: Arc<dyn RecommendationStore>,
    admission: AdmissionController,
    config: AnalysisConfig,
}

/// Builds the immutable producer set once at startup; the orchestrator is
/// frozen after `build`.
pub struct OrchestratorBuilder {
    producers: Vec<Arc<dyn AnalysisProducer>>,
    recorder: Option<Arc<dyn RunRecorder>>,
    store: Option<Arc<dyn RecommendationStore>>,
    config: AnalysisConfig,
}

impl OrchestratorBuilder {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            producers: Vec::new(),
            recorder: None,
            store: None,
            config,
        }
    }

    pub fn producer(mut self, producer: Arc<dyn AnalysisProducer>) -> Self {
        self.producers.push(producer);
        self
    }

    pub fn recorder(mut self, recorder: Arc<dyn RunRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn store(mut self, store: Arc<dyn RecommendationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<Orchestrator, AnalysisError> {
        if self.producers.is_empty() {
            return Err(AnalysisError::Config(
                "at least one analysis producer is required".to_string(),
            ));
        }
        for (i, producer) in self.producers.iter().enumerate() {
            if self.producers[..i].iter().any(|p| p.kind() == producer.kind()) {
                return Err(AnalysisError::Config(format!(
                    "duplicate producer registered for kind {}",
                    producer.kind()
                )));
            }
        }
        self.config.weights.validate()?;

        let recorder = self
            .recorder
            .ok_or_else(|| AnalysisError::Config("run recorder is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| AnalysisError::Config("recommendation store is required".to_string()))?;

        Ok(Orchestrator {
            admission: AdmissionController::new(self.config.max_concurrent_analyses),
            producers: self.producers,
            recorder,
            store,
            config: self.config,
        })
    }
}

impl Orchestrator {
    pub fn builder(config: AnalysisConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze a symbol across every registered producer and synthesize a
    /// recommendation from whichever succeed.
    ///
    /// Gated by the process-wide admission controller; callers over
    /// capacity get `AdmissionRejected` immediately and may retry.
    pub async fn analyze_symbol(&self, symbol: &str) -> Result<Recommendation, AnalysisError> {
        let _permit = self.admission.try_acquire()?;
        self.analyze_unadmitted(symbol).await
    }

    /// Fan-out body, used directly by the screening pipeline which carries
    /// its own concurrency limit instead of the admission gate.
    pub(crate) async fn analyze_unadmitted(
        &self,
        symbol: &str,
    ) -> Result<Recommendation, AnalysisError> {
        tracing::info!(
            "Starting analysis for {} across {} producers",
            symbol,
            self.producers.len()
        );

        let mut tasks = JoinSet::new();
        for producer in &self.producers {
            let producer = Arc::clone(producer);
            let recorder = Arc::clone(&self.recorder);
            let symbol = symbol.to_string();
            let timeout = self.config.producer_timeout();
            tasks.spawn(async move { run_producer(producer, recorder, symbol, timeout).await });
        }

        // Every task runs to a terminal state relative to its own timeout;
        // one producer failing or timing out never cancels its siblings.
        let mut analyses: Vec<Analysis> = Vec::new();
        let mut missing: Vec<MissingAgent> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(ProducerOutcome::Success(analysis)) => analyses.push(analysis),
                Ok(ProducerOutcome::Missing { kind, reason }) => {
                    missing.push(MissingAgent { kind, reason })
                }
                Err(e) => tracing::error!("Producer task failed to run: {}", e),
            }
        }

        // A task that panicked reports neither outcome; account for it so
        // completeness and the missing list stay consistent.
        for producer in &self.producers {
            let kind = producer.kind();
            if !analyses.iter().any(|a| a.kind == kind)
                && !missing.iter().any(|m| m.kind == kind)
            {
                missing.push(MissingAgent {
                    kind,
                    reason: "task aborted".to_string(),
                });
            }
        }

        if analyses.is_empty() {
            tracing::warn!("No producers succeeded for {}", symbol);
            return Err(AnalysisError::NoProducersSucceeded(symbol.to_string()));
        }

        let mut recommendation = synthesis::synthesize(
            symbol,
            &analyses,
            missing,
            self.producers.len(),
            &self.config,
        );

        // Best-effort save: a degraded in-memory result beats none
        match self.store.create(&recommendation).await {
            Ok(id) => recommendation.id = Some(id),
            Err(e) => tracing::warn!("Failed to persist recommendation for {}: {}", symbol, e),
        }

        tracing::info!(
            "Analysis for {} complete: {} score {:.1} (completeness {:.0}%)",
            symbol,
            recommendation.action,
            recommendation.score,
            recommendation.data_completeness,
        );
        Ok(recommendation)
    }
}

/// One producer invocation: audit "running" up front, time-boxed analyze,
/// terminal audit row afterwards regardless of outcome.
async fn run_producer(
    producer: Arc<dyn AnalysisProducer>,
    recorder: Arc<dyn RunRecorder>,
    symbol: String,
    timeout: Duration,
) -> ProducerOutcome {
    let kind = producer.kind();
    let started = Instant::now();
    let run = AgentRun::started(kind, &symbol);
    let run_id = record_begin(&recorder, &run).await;

    match tokio::time::timeout(timeout, producer.analyze(&symbol)).await {
        Ok(Ok(analysis)) => {
            let analysis = analysis.clamped();
            if let Some(id) = run_id {
                let output =
                    serde_json::to_value(&analysis).unwrap_or(serde_json::Value::Null);
                record_complete(&recorder, id, &output, elapsed_ms(started)).await;
            }
            ProducerOutcome::Success(analysis)
        }
        Ok(Err(e)) => {
            let reason = e.to_string();
            tracing::warn!("{} producer failed for {}: {}", kind, symbol, reason);
            if let Some(id) = run_id {
                record_fail(&recorder, id, &reason, elapsed_ms(started)).await;
            }
            ProducerOutcome::Missing { kind, reason }
        }
        Err(_) => {
            tracing::warn!(
                "{} producer timed out for {} after {:?}",
                kind,
                symbol,
                timeout
            );
            if let Some(id) = run_id {
                record_fail(&recorder, id, "timeout", elapsed_ms(started)).await;
            }
            ProducerOutcome::Missing {
                kind,
                reason: "timeout".to_string(),
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    started.elapsed().as_millis() as i64
}

async fn record_begin(recorder: &Arc<dyn RunRecorder>, run: &AgentRun) -> Option<i64> {
    match tokio::time::timeout(AUDIT_TIMEOUT, recorder.begin(run)).await {
        Ok(Ok(id)) => Some(id),
        Ok(Err(e)) => {
            tracing::warn!("Audit begin failed for {} {}: {}", run.kind, run.symbol, e);
            None
        }
        Err(_) => {
            tracing::warn!("Audit begin timed out for {} {}", run.kind, run.symbol);
            None
        }
    }
}

async fn record_complete(
    recorder: &Arc<dyn RunRecorder>,
    id: i64,
    output: &serde_json::Value,
    duration_ms: i64,
) {
    match tokio::time::timeout(AUDIT_TIMEOUT, recorder.complete(id, output, duration_ms)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Audit complete failed for run {}: {}", id, e),
        Err(_) => tracing::warn!("Audit complete timed out for run {}", id),
    }
}

async fn record_fail(recorder: &Arc<dyn RunRecorder>, id: i64, error: &str, duration_ms: i64) {
    match tokio::time::timeout(AUDIT_TIMEOUT, recorder.fail(id, error, duration_ms)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Audit fail-write failed for run {}: {}", id, e),
        Err(_) => tracing::warn!("Audit fail-write timed out for run {}", id),
    }
}
