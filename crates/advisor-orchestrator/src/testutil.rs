//! Shared in-memory test collaborators.

use advisor_core::{
    AgentKind, AgentRun, AgentRunStatus, Analysis, AnalysisError, AnalysisProducer,
    MarketDataSource, RawCandidate, Recommendation, RecommendationStore, RunRecorder,
    ScreenerCriteria, ScreenerRun, ScreenerRunStore,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tracks how many scripted producers are inside `analyze` at once
#[derive(Default)]
pub(crate) struct ConcurrencyGauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

pub(crate) struct GaugeGuard(Arc<ConcurrencyGauge>);

impl ConcurrencyGauge {
    pub(crate) fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(Arc::clone(self))
    }

    pub(crate) fn max_observed(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Behavior {
    Succeed {
        score: f64,
        confidence: f64,
        clamp: bool,
    },
    Fail(String),
    Hang(Duration),
}

pub(crate) struct ScriptedProducer {
    kind: AgentKind,
    behavior: Behavior,
    delay: Duration,
    gauge: Option<Arc<ConcurrencyGauge>>,
}

impl ScriptedProducer {
    pub(crate) fn succeeding(kind: AgentKind, score: f64, confidence: f64) -> Self {
        Self {
            kind,
            behavior: Behavior::Succeed {
                score,
                confidence,
                clamp: true,
            },
            delay: Duration::ZERO,
            gauge: None,
        }
    }

    pub(crate) fn slow_succeeding(
        kind: AgentKind,
        score: f64,
        confidence: f64,
        delay: Duration,
    ) -> Self {
        Self {
            delay,
            ..Self::succeeding(kind, score, confidence)
        }
    }

    /// Succeeds without self-clamping, like a misbehaving producer
    pub(crate) fn raw(kind: AgentKind, score: f64, confidence: f64) -> Self {
        Self {
            kind,
            behavior: Behavior::Succeed {
                score,
                confidence,
                clamp: false,
            },
            delay: Duration::ZERO,
            gauge: None,
        }
    }

    pub(crate) fn failing(kind: AgentKind, message: &str) -> Self {
        Self {
            kind,
            behavior: Behavior::Fail(message.to_string()),
            delay: Duration::ZERO,
            gauge: None,
        }
    }

    /// Sleeps long enough to trip the producer timeout
    pub(crate) fn hanging(kind: AgentKind, sleep: Duration) -> Self {
        Self {
            kind,
            behavior: Behavior::Hang(sleep),
            delay: Duration::ZERO,
            gauge: None,
        }
    }

    pub(crate) fn with_gauge(mut self, gauge: Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }
}

#[async_trait]
impl AnalysisProducer for ScriptedProducer {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn analyze(&self, symbol: &str) -> Result<Analysis, AnalysisError> {
        let _active = self.gauge.as_ref().map(|g| g.enter());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            Behavior::Succeed {
                score,
                confidence,
                clamp,
            } => {
                if *clamp {
                    Ok(Analysis::new(symbol, self.kind, *score, *confidence, "scripted"))
                } else {
                    Ok(Analysis {
                        symbol: symbol.to_string(),
                        kind: self.kind,
                        score: *score,
                        confidence: *confidence,
                        reasoning: "scripted".to_string(),
                        data: serde_json::Value::Null,
                        timestamp: Utc::now(),
                    })
                }
            }
            Behavior::Fail(message) => Err(AnalysisError::InsufficientData(message.clone())),
            Behavior::Hang(sleep) => {
                tokio::time::sleep(*sleep).await;
                Ok(Analysis::new(symbol, self.kind, 0.0, 10.0, "late"))
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct MemoryRunRecorder {
    runs: Mutex<Vec<AgentRun>>,
}

impl MemoryRunRecorder {
    pub(crate) fn records(&self) -> Vec<AgentRun> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunRecorder for MemoryRunRecorder {
    async fn begin(&self, run: &AgentRun) -> Result<i64, AnalysisError> {
        let mut runs = self.runs.lock().unwrap();
        let id = runs.len() as i64 + 1;
        let mut run = run.clone();
        run.id = Some(id);
        runs.push(run);
        Ok(id)
    }

    async fn complete(
        &self,
        id: i64,
        output: &serde_json::Value,
        duration_ms: i64,
    ) -> Result<(), AnalysisError> {
        let mut runs = self.runs.lock().unwrap();
        if let Some(run) = runs.iter_mut().find(|r| r.id == Some(id)) {
            run.status = AgentRunStatus::Completed;
            run.output = Some(output.clone());
            run.duration_ms = Some(duration_ms);
            run.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn fail(&self, id: i64, error: &str, duration_ms: i64) -> Result<(), AnalysisError> {
        let mut runs = self.runs.lock().unwrap();
        if let Some(run) = runs.iter_mut().find(|r| r.id == Some(id)) {
            run.status = AgentRunStatus::Failed;
            run.error = Some(error.to_string());
            run.duration_ms = Some(duration_ms);
            run.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryRecommendationStore {
    saved: Mutex<Vec<Recommendation>>,
}

impl MemoryRecommendationStore {
    pub(crate) fn saved(&self) -> Vec<Recommendation> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecommendationStore for MemoryRecommendationStore {
    async fn create(&self, recommendation: &Recommendation) -> Result<i64, AnalysisError> {
        let mut saved = self.saved.lock().unwrap();
        let id = saved.len() as i64 + 1;
        let mut recommendation = recommendation.clone();
        recommendation.id = Some(id);
        saved.push(recommendation);
        Ok(id)
    }
}

pub(crate) struct FailingRecommendationStore;

#[async_trait]
impl RecommendationStore for FailingRecommendationStore {
    async fn create(&self, _recommendation: &Recommendation) -> Result<i64, AnalysisError> {
        Err(AnalysisError::Store("disk full".to_string()))
    }
}

#[derive(Default)]
pub(crate) struct MemoryScreenerRunStore {
    runs: Mutex<Vec<ScreenerRun>>,
}

impl MemoryScreenerRunStore {
    pub(crate) fn stored(&self) -> Vec<ScreenerRun> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScreenerRunStore for MemoryScreenerRunStore {
    async fn create(&self, run: &ScreenerRun) -> Result<i64, AnalysisError> {
        let mut runs = self.runs.lock().unwrap();
        let id = runs.len() as i64 + 1;
        let mut run = run.clone();
        run.id = Some(id);
        runs.push(run);
        Ok(id)
    }

    async fn update(&self, run: &ScreenerRun) -> Result<(), AnalysisError> {
        let mut runs = self.runs.lock().unwrap();
        match runs.iter_mut().find(|r| r.id == run.id) {
            Some(stored) => {
                *stored = run.clone();
                Ok(())
            }
            None => Err(AnalysisError::Store(format!(
                "screener run {:?} not found",
                run.id
            ))),
        }
    }

    async fn get_latest(&self) -> Result<Option<ScreenerRun>, AnalysisError> {
        Ok(self.runs.lock().unwrap().last().cloned())
    }

    async fn get_history(&self, limit: usize) -> Result<Vec<ScreenerRun>, AnalysisError> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ScreenerRun>, AnalysisError> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == Some(id))
            .cloned())
    }
}

pub(crate) struct ScriptedMarketDataSource {
    candidates: Vec<RawCandidate>,
    fail: bool,
}

impl ScriptedMarketDataSource {
    pub(crate) fn with_candidates(candidates: Vec<RawCandidate>) -> Self {
        Self {
            candidates,
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            candidates: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl MarketDataSource for ScriptedMarketDataSource {
    async fn screen(
        &self,
        _criteria: &ScreenerCriteria,
    ) -> Result<Vec<RawCandidate>, AnalysisError> {
        if self.fail {
            return Err(AnalysisError::DataFetch("feed offline".to_string()));
        }
        Ok(self.candidates.clone())
    }
}

pub(crate) fn raw_candidate(symbol: &str, pe: f64, pb: f64, dividend_yield: f64) -> RawCandidate {
    RawCandidate {
        symbol: symbol.to_string(),
        name: format!("{} Inc", symbol),
        sector: Some("Technology".to_string()),
        market_cap: 50e9,
        pe_ratio: pe,
        pb_ratio: pb,
        eps: 4.0,
        dividend_yield,
        price: 100.0,
        beta: 1.1,
    }
}
