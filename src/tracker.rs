//! Per-layer attempt bookkeeping.
//!
//! [`ResultTracker`] records every attempt of a layer, scores it through a
//! [`ScoringPolicy`] and keeps the best-scoring one. Ties keep the earlier
//! attempt.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::state_machine::AttemptResult;

/// Upper bound of any attempt score.
pub const MAX_SCORE: f64 = 100.0;

/// Turns an attempt result into a score in `0..=100`.
///
/// Implemented for plain closures so callers can swap scoring schemes without
/// touching the engine.
pub trait ScoringPolicy: Send + Sync {
    fn score(&self, result: &AttemptResult) -> f64;
}

impl<F> ScoringPolicy for F
where
    F: Fn(&AttemptResult) -> f64 + Send + Sync,
{
    fn score(&self, result: &AttemptResult) -> f64 {
        self(result)
    }
}

/// Additive scoring: fixed bonuses for success and validation plus capped
/// bonuses for item count and field coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedScoring {
    #[serde(default = "default_success_weight")]
    pub success_weight: f64,
    #[serde(default = "default_validated_weight")]
    pub validated_weight: f64,
    /// Maximum bonus from `metadata.itemCount` (one point per item).
    #[serde(default = "default_bonus_cap")]
    pub item_count_cap: f64,
    /// Maximum bonus from `metadata.fieldCoverage` (one point per 10%).
    #[serde(default = "default_bonus_cap")]
    pub field_coverage_cap: f64,
}

fn default_success_weight() -> f64 {
    40.0
}

fn default_validated_weight() -> f64 {
    40.0
}

fn default_bonus_cap() -> f64 {
    10.0
}

impl Default for WeightedScoring {
    fn default() -> Self {
        Self {
            success_weight: default_success_weight(),
            validated_weight: default_validated_weight(),
            item_count_cap: default_bonus_cap(),
            field_coverage_cap: default_bonus_cap(),
        }
    }
}

impl ScoringPolicy for WeightedScoring {
    fn score(&self, result: &AttemptResult) -> f64 {
        let mut score = 0.0;
        if result.success {
            score += self.success_weight;
        }
        if result.validated {
            score += self.validated_weight;
        }
        if let Some(items) = result.item_count() {
            score += items.max(0.0).min(self.item_count_cap);
        }
        if let Some(coverage) = result.field_coverage() {
            score += (coverage / 10.0).floor().max(0.0).min(self.field_coverage_cap);
        }
        score
    }
}

/// An attempt as recorded by the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredAttempt {
    pub attempt: u32,
    pub score: f64,
    pub result: AttemptResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptScore {
    pub attempt: u32,
    pub score: f64,
}

/// Summary of a layer's attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerDiagnostics {
    pub total_attempts: u32,
    pub best_attempt: Option<u32>,
    pub best_score: Option<f64>,
    pub scores: Vec<AttemptScore>,
    pub successful_attempts: u32,
    pub validated_attempts: u32,
}

/// Records the attempts of one layer and tracks the best of them.
pub struct ResultTracker {
    policy: Arc<dyn ScoringPolicy>,
    attempts: Vec<ScoredAttempt>,
    best: Option<usize>,
}

impl ResultTracker {
    pub fn new(policy: Arc<dyn ScoringPolicy>) -> Self {
        Self {
            policy,
            attempts: Vec::new(),
            best: None,
        }
    }

    /// Score `result`, store it, and return the score.
    ///
    /// The tracked best moves only on a strictly higher score.
    pub fn add_attempt(&mut self, attempt: u32, mut result: AttemptResult) -> f64 {
        let score = self.score(&result);
        result.score = Some(score);

        let improves = match self.best_score() {
            Some(best) => score > best,
            None => true,
        };
        self.attempts.push(ScoredAttempt {
            attempt,
            score,
            result,
        });
        if improves {
            self.best = Some(self.attempts.len() - 1);
        }
        score
    }

    /// Apply the policy and clamp into `0..=100`.
    pub fn score(&self, result: &AttemptResult) -> f64 {
        let raw = self.policy.score(result);
        if raw.is_nan() {
            0.0
        } else {
            raw.clamp(0.0, MAX_SCORE)
        }
    }

    pub fn best(&self) -> Option<&ScoredAttempt> {
        self.best.map(|i| &self.attempts[i])
    }

    pub fn best_result(&self) -> Option<&AttemptResult> {
        self.best().map(|a| &a.result)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best().map(|a| a.score)
    }

    pub fn attempts(&self) -> &[ScoredAttempt] {
        &self.attempts
    }

    pub fn last(&self) -> Option<&ScoredAttempt> {
        self.attempts.last()
    }

    pub fn score_of(&self, attempt: u32) -> Option<f64> {
        self.attempts
            .iter()
            .find(|a| a.attempt == attempt)
            .map(|a| a.score)
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn diagnostics(&self) -> TrackerDiagnostics {
        let best = self.best();
        TrackerDiagnostics {
            total_attempts: self.attempts.len() as u32,
            best_attempt: best.map(|a| a.attempt),
            best_score: best.map(|a| a.score),
            scores: self
                .attempts
                .iter()
                .map(|a| AttemptScore {
                    attempt: a.attempt,
                    score: a.score,
                })
                .collect(),
            successful_attempts: self.attempts.iter().filter(|a| a.result.success).count() as u32,
            validated_attempts: self.attempts.iter().filter(|a| a.result.validated).count() as u32,
        }
    }

    pub fn reset(&mut self) {
        self.attempts.clear();
        self.best = None;
    }
}

impl Default for ResultTracker {
    fn default() -> Self {
        Self::new(Arc::new(WeightedScoring::default()))
    }
}
