//! Scoring collaborator contract.
//!
//! A [`Scorer`] grades one model output for a prompt. [`rank`] applies a
//! scorer to a batch of results and returns them best-first.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::clients::ModelResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound of the score scale.
pub const MAX_SCORE: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub score: f64,
    pub reason: String,
}

pub trait Scorer: Send + Sync {
    fn score(&self, prompt: &str, result: &ModelResult) -> Score;
}

/// A result with its score, as returned by [`rank`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult<T> {
    pub item: T,
    pub result: ModelResult,
    pub score: f64,
    pub reason: String,
}

/// Score every result and sort by score, highest first.
///
/// `T` carries caller context (e.g. which model produced the result). Ties
/// keep their input order.
pub fn rank<T>(
    scorer: &dyn Scorer,
    prompt: &str,
    results: Vec<(T, ModelResult)>,
) -> Vec<ScoredResult<T>> {
    let mut scored: Vec<ScoredResult<T>> = results
        .into_iter()
        .map(|(item, result)| {
            let Score { score, reason } = scorer.score(prompt, &result);
            ScoredResult {
                item,
                result,
                score,
                reason,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}

/// Scores by how many distinct prompt terms the output mentions.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermOverlapScorer;

impl TermOverlapScorer {
    fn terms(text: &str) -> BTreeSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 2)
            .map(str::to_lowercase)
            .collect()
    }
}

impl Scorer for TermOverlapScorer {
    fn score(&self, prompt: &str, result: &ModelResult) -> Score {
        let wanted = Self::terms(prompt);
        if wanted.is_empty() {
            return Score {
                score: 0.0,
                reason: "prompt has no scorable terms".to_string(),
            };
        }

        let found = Self::terms(&result.text);
        let hits = wanted.intersection(&found).count();
        let score = (MAX_SCORE * hits as f64 / wanted.len() as f64 * 100.0).round() / 100.0;

        Score {
            score,
            reason: format!("covers {} of {} prompt terms", hits, wanted.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn result(text: &str) -> ModelResult {
        ModelResult {
            text: text.to_string(),
            tokens_in: 1,
            tokens_out: 1,
            cost_usd: 0.0,
            latency_ms: 0,
            raw: Value::Null,
        }
    }

    #[test]
    fn test_rank_sorts_descending() {
        let prompt = "Explain quantum computing simply";
        let ranked = rank(
            &TermOverlapScorer,
            prompt,
            vec![
                ("partial", result("Quantum things happen")),
                ("full", result("Explain: quantum computing, simply put")),
                ("none", result("No idea")),
            ],
        );

        let order: Vec<&str> = ranked.iter().map(|r| r.item).collect();
        assert_eq!(order, vec!["full", "partial", "none"]);
        assert_eq!(ranked[0].score, MAX_SCORE);
        assert_eq!(ranked[2].score, 0.0);
        assert_eq!(ranked[1].reason, "covers 1 of 4 prompt terms");
    }

    #[test]
    fn test_empty_prompt_scores_zero() {
        let score = TermOverlapScorer.score("a b", &result("anything"));
        assert_eq!(score.score, 0.0);
    }
}
