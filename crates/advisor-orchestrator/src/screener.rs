//! Two-stage value screening pipeline: a cheap formula-based pre-filter
//! over the candidate universe, then bounded-concurrency full analysis on
//! the survivors, re-ranked by analysis score.

use crate::Orchestrator;
use advisor_core::{
    AnalysisError, MarketDataSource, ScreenerCandidate, ScreenerConfig, ScreenerRun,
    ScreenerRunStatus, ScreenerRunStore,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

// Fixed Stage-B blend of per-kind raw scores. Deliberately independent of
// the orchestrator's own confidence-weighted final score; the two numbers
// can diverge.
const COMBINED_FUNDAMENTAL_WEIGHT: f64 = 0.4;
const COMBINED_SENTIMENT_WEIGHT: f64 = 0.3;
const COMBINED_TECHNICAL_WEIGHT: f64 = 0.3;

/// Stage-A pre-filter score from valuation multiples and dividend yield.
///
/// P/E contributes nothing at or above 20, P/B nothing at or above 2.5,
/// and yield saturates at 5%.
pub fn value_score(pe_ratio: f64, pb_ratio: f64, dividend_yield: f64) -> f64 {
    let pe_sub = (100.0 - pe_ratio * 5.0).max(0.0);
    let pb_sub = (100.0 - pb_ratio * 40.0).max(0.0);
    let div_sub = (dividend_yield * 20.0).min(100.0);
    pe_sub * 0.5 + pb_sub * 0.3 + div_sub * 0.2
}

/// Analyzed candidates sorted descending by `score x confidence/100`.
/// Unanalyzed candidates are excluded, never ranked.
pub fn rank_by_analysis_score(candidates: &[ScreenerCandidate]) -> Vec<ScreenerCandidate> {
    let mut ranked: Vec<ScreenerCandidate> = candidates
        .iter()
        .filter(|c| c.ranking_score().is_some())
        .cloned()
        .collect();
    ranked.sort_by(|a, b| {
        b.ranking_score()
            .partial_cmp(&a.ranking_score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

pub struct ScreeningPipeline {
    orchestrator: Arc<Orchestrator>,
    market_data: Arc<dyn MarketDataSource>,
    runs: Arc<dyn ScreenerRunStore>,
    config: ScreenerConfig,
}

impl ScreeningPipeline {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        market_data: Arc<dyn MarketDataSource>,
        runs: Arc<dyn ScreenerRunStore>,
        config: ScreenerConfig,
    ) -> Self {
        Self {
            orchestrator,
            market_data,
            runs,
            config,
        }
    }

    /// Screen the candidate universe down to the configured top picks.
    ///
    /// Only a Stage-A fetch failure fails the run; individual Stage-B
    /// candidate failures leave that candidate unanalyzed and the run
    /// completes around them.
    pub async fn run_screen(&self) -> Result<ScreenerRun, AnalysisError> {
        let started = Instant::now();
        let criteria = self.config.criteria();
        let mut run = ScreenerRun::started(criteria.clone());

        // Without this row the run would be untrackable, so run creation
        // is the one store call that propagates.
        let run_id = self.runs.create(&run).await?;
        run.id = Some(run_id);

        let raw = match self.market_data.screen(&criteria).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Screener data fetch failed: {}", e);
                run.status = ScreenerRunStatus::Failed;
                run.error = Some(e.to_string());
                run.duration_ms = Some(started.elapsed().as_millis() as i64);
                self.persist_update(&run).await;
                return Err(e);
            }
        };
        tracing::info!("Screening {} raw candidates", raw.len());

        // Stage A: cheap formula ranking, keep the top of the universe
        let mut shortlist: Vec<ScreenerCandidate> = raw
            .into_iter()
            .map(|r| {
                let score = value_score(r.pe_ratio, r.pb_ratio, r.dividend_yield);
                ScreenerCandidate::from_raw(r, score)
            })
            .collect();
        shortlist.sort_by(|a, b| {
            b.value_score
                .partial_cmp(&a.value_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        shortlist.truncate(self.config.prefilter_count);

        // Stage B: full analysis on the survivors
        let candidates = self.analyze_shortlist(shortlist).await;
        let analyzed = candidates.iter().filter(|c| c.analyzed).count();

        let ranked = rank_by_analysis_score(&candidates);
        run.top_pick_ids = ranked
            .iter()
            .take(self.config.top_pick_count)
            .filter_map(|c| c.recommendation_id)
            .collect();
        run.candidates = candidates;
        run.status = ScreenerRunStatus::Completed;
        run.duration_ms = Some(started.elapsed().as_millis() as i64);
        self.persist_update(&run).await;

        tracing::info!(
            "Screen complete: {}/{} candidates analyzed, {} picks in {} ms",
            analyzed,
            run.candidates.len(),
            run.top_pick_ids.len(),
            run.duration_ms.unwrap_or(0),
        );
        Ok(run)
    }

    /// Bounded-concurrency analysis loop. Candidates are partitioned by
    /// index stride across the workers, each worker owns only its assigned
    /// candidates, and results merge into a freshly allocated list.
    async fn analyze_shortlist(
        &self,
        shortlist: Vec<ScreenerCandidate>,
    ) -> Vec<ScreenerCandidate> {
        if shortlist.is_empty() {
            return shortlist;
        }

        let deadline = tokio::time::Instant::now() + self.config.stage_deadline();
        let workers = self.config.stage_concurrency.max(1).min(shortlist.len());
        let shortlist = Arc::new(shortlist);

        let mut tasks = JoinSet::new();
        for worker in 0..workers {
            let candidates = Arc::clone(&shortlist);
            let orchestrator = Arc::clone(&self.orchestrator);
            tasks.spawn(async move {
                let mut updated = Vec::new();
                let mut index = worker;
                while index < candidates.len() {
                    let mut candidate = candidates[index].clone();
                    // Shared stage deadline: a candidate still in flight
                    // when it fires is marked failed on its own; completed
                    // siblings keep their results.
                    match tokio::time::timeout_at(
                        deadline,
                        orchestrator.analyze_unadmitted(&candidate.symbol),
                    )
                    .await
                    {
                        Ok(Ok(rec)) => {
                            let combined = rec.scores.fundamental * COMBINED_FUNDAMENTAL_WEIGHT
                                + rec.scores.sentiment * COMBINED_SENTIMENT_WEIGHT
                                + rec.scores.technical * COMBINED_TECHNICAL_WEIGHT;
                            candidate.record_analysis(combined, rec.confidence, rec.id);
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(
                                "Analysis failed for candidate {}: {}",
                                candidate.symbol,
                                e
                            );
                        }
                        Err(_) => {
                            tracing::warn!(
                                "Candidate {} missed the stage deadline",
                                candidate.symbol
                            );
                        }
                    }
                    updated.push((index, candidate));
                    index += workers;
                }
                updated
            });
        }

        let mut merged: Vec<Option<ScreenerCandidate>> =
            (0..shortlist.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(list) => {
                    for (index, candidate) in list {
                        merged[index] = Some(candidate);
                    }
                }
                Err(e) => tracing::error!("Stage worker failed: {}", e),
            }
        }
        merged
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.unwrap_or_else(|| shortlist[i].clone()))
            .collect()
    }

    async fn persist_update(&self, run: &ScreenerRun) {
        if let Err(e) = self.runs.update(run).await {
            tracing::warn!("Failed to persist screener run update: {}", e);
        }
    }

    /// Top picks of the most recent run, in pick order
    pub async fn latest_picks(&self) -> Result<Vec<ScreenerCandidate>, AnalysisError> {
        let Some(run) = self.runs.get_latest().await? else {
            return Ok(Vec::new());
        };
        Ok(run
            .top_pick_ids
            .iter()
            .filter_map(|id| {
                run.candidates
                    .iter()
                    .find(|c| c.recommendation_id == Some(*id))
                    .cloned()
            })
            .collect())
    }

    pub async fn latest_run(&self) -> Result<Option<ScreenerRun>, AnalysisError> {
        self.runs.get_latest().await
    }

    pub async fn run_history(&self, limit: usize) -> Result<Vec<ScreenerRun>, AnalysisError> {
        self.runs.get_history(limit).await
    }

    pub async fn run(&self, id: i64) -> Result<Option<ScreenerRun>, AnalysisError> {
        self.runs.get_by_id(id).await
    }
}
