use crate::{
    AgentKind, AgentRun, Analysis, AnalysisError, RawCandidate, Recommendation, ScreenerCriteria,
    ScreenerRun,
};
use async_trait::async_trait;

/// Capability every analysis producer implements. The orchestrator depends
/// only on this trait, never on a concrete producer.
///
/// A weak or ambiguous signal must map to a low-confidence neutral
/// `Analysis`, not an error; failure means the producer's required input
/// was unusable.
#[async_trait]
pub trait AnalysisProducer: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn analyze(&self, symbol: &str) -> Result<Analysis, AnalysisError>;
}

/// Audit log for producer invocations. Write-only from the core's
/// perspective; records are never read back for decisions.
#[async_trait]
pub trait RunRecorder: Send + Sync {
    /// Record a "running" row, returning its id for the terminal update
    async fn begin(&self, run: &AgentRun) -> Result<i64, AnalysisError>;

    async fn complete(
        &self,
        id: i64,
        output: &serde_json::Value,
        duration_ms: i64,
    ) -> Result<(), AnalysisError>;

    async fn fail(&self, id: i64, error: &str, duration_ms: i64) -> Result<(), AnalysisError>;
}

/// Persistence for synthesized recommendations
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn create(&self, recommendation: &Recommendation) -> Result<i64, AnalysisError>;
}

/// Persistence for screener runs
#[async_trait]
pub trait ScreenerRunStore: Send + Sync {
    async fn create(&self, run: &ScreenerRun) -> Result<i64, AnalysisError>;

    async fn update(&self, run: &ScreenerRun) -> Result<(), AnalysisError>;

    async fn get_latest(&self) -> Result<Option<ScreenerRun>, AnalysisError>;

    async fn get_history(&self, limit: usize) -> Result<Vec<ScreenerRun>, AnalysisError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ScreenerRun>, AnalysisError>;
}

/// External source of screener candidates
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn screen(&self, criteria: &ScreenerCriteria)
        -> Result<Vec<RawCandidate>, AnalysisError>;
}
