//! Confidence-weighted combination of producer analyses into one
//! recommendation.

use advisor_core::{
    Action, AgentKind, AgentScores, Analysis, AnalysisConfig, MissingAgent, Recommendation,
    RecommendationStatus,
};
use chrono::Utc;

/// Combine the successful analyses for one symbol into a recommendation.
///
/// Effective weight per producer = static weight x confidence/100.
/// Final score = weighted mean of scores under effective weights, 0 when
/// every effective weight is 0. Final confidence = unweighted mean of the
/// contributing confidences.
pub(crate) fn synthesize(
    symbol: &str,
    analyses: &[Analysis],
    missing_agents: Vec<MissingAgent>,
    registered: usize,
    config: &AnalysisConfig,
) -> Recommendation {
    let mut scores = AgentScores::default();
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut confidence_sum = 0.0;

    for analysis in analyses {
        // Producers self-clamp and the orchestrator clamps on receipt;
        // clamp once more so synthesis is safe on any input.
        let score = analysis.score.clamp(-100.0, 100.0);
        let confidence = analysis.confidence.clamp(0.0, 100.0);
        scores.set(analysis.kind, score);

        let effective = config.weights.for_kind(analysis.kind) * (confidence / 100.0);
        weighted_sum += score * effective;
        weight_sum += effective;
        confidence_sum += confidence;
    }

    let final_score = if weight_sum > 0.0 {
        weighted_sum / weight_sum
    } else {
        0.0
    };
    let final_confidence = if analyses.is_empty() {
        0.0
    } else {
        confidence_sum / analyses.len() as f64
    };

    let data_completeness = if registered == 0 {
        0.0
    } else {
        100.0 * analyses.len() as f64 / registered as f64
    };

    Recommendation {
        id: None,
        symbol: symbol.to_string(),
        action: decide_action(final_score, config),
        quantity: None,
        target_price: None,
        score: final_score,
        confidence: final_confidence,
        reasoning: combined_reasoning(analyses, &scores, final_score),
        scores,
        data_completeness,
        missing_agents,
        status: RecommendationStatus::Pending,
        created_at: Utc::now(),
    }
}

/// Strict thresholds: the boundary values themselves resolve to HOLD
pub(crate) fn decide_action(score: f64, config: &AnalysisConfig) -> Action {
    if score > config.buy_threshold {
        Action::Buy
    } else if score < config.sell_threshold {
        Action::Sell
    } else {
        Action::Hold
    }
}

/// Deterministic summary line followed by one line per contributing
/// producer in fixed kind order, regardless of completion order.
fn combined_reasoning(analyses: &[Analysis], scores: &AgentScores, final_score: f64) -> String {
    let mut lines = vec![format!(
        "{} producer(s) contributed (fundamental {:.1}, sentiment {:.1}, technical {:.1}); final score {:.1}",
        analyses.len(),
        scores.fundamental,
        scores.sentiment,
        scores.technical,
        final_score,
    )];

    for kind in AgentKind::REPORT_ORDER {
        if let Some(analysis) = analyses.iter().find(|a| a.kind == kind) {
            lines.push(format!(
                "{} (score {:.1}, confidence {:.1}): \"{}\"",
                kind, analysis.score, analysis.confidence, analysis.reasoning,
            ));
        }
    }

    lines.join("\n")
}
