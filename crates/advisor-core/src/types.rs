use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Analytical dimension a producer scores a symbol along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Fundamental,
    Technical,
    Sentiment,
}

impl AgentKind {
    /// Fixed reporting order for combined reasoning, independent of
    /// task completion order.
    pub const REPORT_ORDER: [AgentKind; 3] = [
        AgentKind::Fundamental,
        AgentKind::Sentiment,
        AgentKind::Technical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Fundamental => "fundamental",
            AgentKind::Technical => "technical",
            AgentKind::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single producer's opinion on a symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub symbol: String,
    pub kind: AgentKind,
    /// -100 (strong sell) to 100 (strong buy)
    pub score: f64,
    /// 0 to 100
    pub confidence: f64,
    pub reasoning: String,
    /// Producer-specific metrics, audit/debug only; synthesis never reads it
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Analysis {
    pub fn new(symbol: &str, kind: AgentKind, score: f64, confidence: f64, reasoning: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
            score,
            confidence,
            reasoning: reasoning.to_string(),
            data: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
        .clamped()
    }

    /// Clamp score and confidence into their documented ranges.
    /// Producers are expected to self-clamp; the orchestrator applies this
    /// again as a second safety net.
    pub fn clamped(mut self) -> Self {
        self.score = self.score.clamp(-100.0, 100.0);
        self.confidence = self.confidence.clamp(0.0, 100.0);
        self
    }
}

/// Trading action derived from the synthesized score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommendation lifecycle. The orchestrator only ever creates `Pending`;
/// later transitions belong to an external approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
}

/// Raw per-kind scores carried on a recommendation. Missing producers
/// default to 0; disambiguate via `missing_agents` / `data_completeness`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentScores {
    pub fundamental: f64,
    pub technical: f64,
    pub sentiment: f64,
}

impl AgentScores {
    pub fn get(&self, kind: AgentKind) -> f64 {
        match kind {
            AgentKind::Fundamental => self.fundamental,
            AgentKind::Technical => self.technical,
            AgentKind::Sentiment => self.sentiment,
        }
    }

    pub fn set(&mut self, kind: AgentKind, score: f64) {
        match kind {
            AgentKind::Fundamental => self.fundamental = score,
            AgentKind::Technical => self.technical = score,
            AgentKind::Sentiment => self.sentiment = score,
        }
    }
}

/// Producer that did not contribute to a recommendation, with the reason
/// ("timeout" or the producer's error text)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingAgent {
    pub kind: AgentKind,
    pub reason: String,
}

/// Synthesized trading recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Store-assigned id, set after a successful save
    #[serde(default)]
    pub id: Option<i64>,
    pub symbol: String,
    pub action: Action,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub target_price: Option<f64>,
    /// Synthesized score, -100 to 100
    pub score: f64,
    /// Aggregate confidence, 0 to 100
    pub confidence: f64,
    pub reasoning: String,
    pub scores: AgentScores,
    /// 100 x succeeded / registered producers
    pub data_completeness: f64,
    pub missing_agents: Vec<MissingAgent>,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
}

/// Audit status of a single producer invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRunStatus {
    Running,
    Completed,
    Failed,
}

/// Append-only audit record of one producer invocation. Never read back
/// for decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    #[serde(default)]
    pub id: Option<i64>,
    pub kind: AgentKind,
    pub symbol: String,
    pub status: AgentRunStatus,
    pub input: serde_json::Value,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl AgentRun {
    pub fn started(kind: AgentKind, symbol: &str) -> Self {
        Self {
            id: None,
            kind,
            symbol: symbol.to_string(),
            status: AgentRunStatus::Running,
            input: serde_json::json!({ "symbol": symbol }),
            output: None,
            error: None,
            duration_ms: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Candidate as returned by the market data source, before scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
    pub market_cap: f64,
    pub pe_ratio: f64,
    pub pb_ratio: f64,
    pub eps: f64,
    /// Dividend yield in percent (2.5 = 2.5%)
    pub dividend_yield: f64,
    pub price: f64,
    pub beta: f64,
}

/// Candidate flowing through the screening pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerCandidate {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
    pub market_cap: f64,
    pub pe_ratio: f64,
    pub pb_ratio: f64,
    pub eps: f64,
    pub dividend_yield: f64,
    pub price: f64,
    pub beta: f64,
    /// Stage-A pre-filter score, always set
    pub value_score: f64,
    /// Stage-B combined score, set only on successful analysis
    #[serde(default)]
    pub analysis_score: Option<f64>,
    #[serde(default)]
    pub analysis_confidence: Option<f64>,
    pub analyzed: bool,
    #[serde(default)]
    pub recommendation_id: Option<i64>,
}

impl ScreenerCandidate {
    pub fn from_raw(raw: RawCandidate, value_score: f64) -> Self {
        Self {
            symbol: raw.symbol,
            name: raw.name,
            sector: raw.sector,
            market_cap: raw.market_cap,
            pe_ratio: raw.pe_ratio,
            pb_ratio: raw.pb_ratio,
            eps: raw.eps,
            dividend_yield: raw.dividend_yield,
            price: raw.price,
            beta: raw.beta,
            value_score,
            analysis_score: None,
            analysis_confidence: None,
            analyzed: false,
            recommendation_id: None,
        }
    }

    /// Record a completed Stage-B analysis. The only mutation a candidate
    /// ever sees.
    pub fn record_analysis(&mut self, score: f64, confidence: f64, recommendation_id: Option<i64>) {
        self.analysis_score = Some(score);
        self.analysis_confidence = Some(confidence);
        self.analyzed = true;
        self.recommendation_id = recommendation_id;
    }

    /// Ranking key for the final top-pick sort
    pub fn ranking_score(&self) -> Option<f64> {
        match (self.analysis_score, self.analysis_confidence) {
            (Some(score), Some(confidence)) if self.analyzed => {
                Some(score * confidence / 100.0)
            }
            _ => None,
        }
    }
}

/// Coarse bounds and counts a screener run was started with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerCriteria {
    pub min_market_cap: f64,
    pub max_pe_ratio: f64,
    pub max_pb_ratio: f64,
    pub prefilter_count: usize,
    pub top_pick_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenerRunStatus {
    Running,
    Completed,
    Failed,
}

/// One screening run, persisted at creation and again at its terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerRun {
    #[serde(default)]
    pub id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub criteria: ScreenerCriteria,
    pub candidates: Vec<ScreenerCandidate>,
    /// Recommendation ids of the top picks, best first
    pub top_pick_ids: Vec<i64>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    pub status: ScreenerRunStatus,
    #[serde(default)]
    pub error: Option<String>,
}

impl ScreenerRun {
    pub fn started(criteria: ScreenerCriteria) -> Self {
        Self {
            id: None,
            started_at: Utc::now(),
            criteria,
            candidates: Vec::new(),
            top_pick_ids: Vec::new(),
            duration_ms: None,
            status: ScreenerRunStatus::Running,
            error: None,
        }
    }
}
