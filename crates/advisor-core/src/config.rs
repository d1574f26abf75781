use crate::{AgentKind, AnalysisError, ScreenerCriteria};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Parse an env var, falling back to the default on absence or parse failure
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Static per-kind synthesis weights. Intended, not enforced, to sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentWeights {
    pub fundamental: f64,
    pub technical: f64,
    pub sentiment: f64,
}

impl Default for AgentWeights {
    fn default() -> Self {
        Self {
            fundamental: 0.4,
            technical: 0.3,
            sentiment: 0.3,
        }
    }
}

impl AgentWeights {
    pub fn for_kind(&self, kind: AgentKind) -> f64 {
        match kind {
            AgentKind::Fundamental => self.fundamental,
            AgentKind::Technical => self.technical,
            AgentKind::Sentiment => self.sentiment,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, w) in [
            ("fundamental", self.fundamental),
            ("technical", self.technical),
            ("sentiment", self.sentiment),
        ] {
            if w < 0.0 || !w.is_finite() {
                return Err(AnalysisError::Config(format!(
                    "{} weight must be non-negative, got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Per-producer time box, seconds
    pub producer_timeout_secs: u64,
    /// Admission controller capacity for top-level analysis calls
    pub max_concurrent_analyses: usize,
    pub weights: AgentWeights,
    /// Synthesized score above this is a BUY (strict)
    pub buy_threshold: f64,
    /// Synthesized score below this is a SELL (strict)
    pub sell_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            producer_timeout_secs: 30,
            max_concurrent_analyses: 3,
            weights: AgentWeights::default(),
            buy_threshold: 25.0,
            sell_threshold: -25.0,
        }
    }
}

impl AnalysisConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            producer_timeout_secs: env_or(
                "ADVISOR_PRODUCER_TIMEOUT_SECS",
                defaults.producer_timeout_secs,
            ),
            max_concurrent_analyses: env_or(
                "ADVISOR_MAX_CONCURRENT_ANALYSES",
                defaults.max_concurrent_analyses,
            ),
            weights: AgentWeights {
                fundamental: env_or("ADVISOR_WEIGHT_FUNDAMENTAL", defaults.weights.fundamental),
                technical: env_or("ADVISOR_WEIGHT_TECHNICAL", defaults.weights.technical),
                sentiment: env_or("ADVISOR_WEIGHT_SENTIMENT", defaults.weights.sentiment),
            },
            buy_threshold: env_or("ADVISOR_BUY_THRESHOLD", defaults.buy_threshold),
            sell_threshold: env_or("ADVISOR_SELL_THRESHOLD", defaults.sell_threshold),
        }
    }

    pub fn producer_timeout(&self) -> Duration {
        Duration::from_secs(self.producer_timeout_secs)
    }
}

/// Screening pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Stage-A survivors passed on to full analysis
    pub prefilter_count: usize,
    /// Final top picks
    pub top_pick_count: usize,
    pub min_market_cap: f64,
    pub max_pe_ratio: f64,
    pub max_pb_ratio: f64,
    /// Stage-B worker count
    pub stage_concurrency: usize,
    /// Shared Stage-B deadline, seconds
    pub stage_deadline_secs: u64,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            prefilter_count: 15,
            top_pick_count: 3,
            min_market_cap: 1_000_000_000.0,
            max_pe_ratio: 25.0,
            max_pb_ratio: 3.0,
            stage_concurrency: 5,
            stage_deadline_secs: 120,
        }
    }
}

impl ScreenerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            prefilter_count: env_or("SCREENER_PREFILTER_COUNT", defaults.prefilter_count),
            top_pick_count: env_or("SCREENER_TOP_PICKS", defaults.top_pick_count),
            min_market_cap: env_or("SCREENER_MIN_MARKET_CAP", defaults.min_market_cap),
            max_pe_ratio: env_or("SCREENER_MAX_PE", defaults.max_pe_ratio),
            max_pb_ratio: env_or("SCREENER_MAX_PB", defaults.max_pb_ratio),
            stage_concurrency: env_or("SCREENER_CONCURRENCY", defaults.stage_concurrency),
            stage_deadline_secs: env_or("SCREENER_DEADLINE_SECS", defaults.stage_deadline_secs),
        }
    }

    /// Snapshot recorded on each run and handed to the market data source
    pub fn criteria(&self) -> ScreenerCriteria {
        ScreenerCriteria {
            min_market_cap: self.min_market_cap,
            max_pe_ratio: self.max_pe_ratio,
            max_pb_ratio: self.max_pb_ratio,
            prefilter_count: self.prefilter_count,
            top_pick_count: self.top_pick_count,
        }
    }

    pub fn stage_deadline(&self) -> Duration {
        Duration::from_secs(self.stage_deadline_secs)
    }
}
