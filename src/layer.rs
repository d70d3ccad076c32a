//! Single-layer execution.
//!
//! [`LayerExecutor`] runs the bounded attempt loop of one layer. It is the one
//! place where a fault raised by the attempt function is tolerated: an `Err`
//! from [`AttemptRunner::attempt`] is downgraded into a failed
//! [`AttemptResult`] and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::patterns::{PatternDetector, PatternMatch};
use crate::progress::{ProgressEvent, ProgressSink, ProgressStatus};
use crate::state_machine::{
    AttemptResult, LayerOutcome, LayerRun, LayerState, StateMachine, Transition, Verdict,
};
use crate::tracker::{ResultTracker, ScoringPolicy};
use crate::workflow::{LayerSpec, OnFailure};

/// Everything an attempt function gets to see.
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext<'a> {
    pub layer: &'a str,
    /// 1-based attempt number within the layer.
    pub attempt: u32,
    pub max_attempts: u32,
    /// Caller-supplied context shared by every layer of the run.
    pub workflow_context: &'a Value,
    /// Outcomes of the layers that already ran, in order.
    pub prior_layers: &'a [LayerOutcome],
}

/// The caller's hook: execute one attempt of a named layer.
///
/// Return `Err` for faults; the executor converts them into a failed attempt.
#[allow(async_fn_in_trait)]
pub trait AttemptRunner {
    async fn attempt(&self, ctx: &AttemptContext<'_>) -> anyhow::Result<AttemptResult>;

    /// Whether this runner knows how to execute `layer`. Checked for every
    /// layer before a workflow starts.
    fn handles(&self, _layer: &str) -> bool {
        true
    }
}

/// Runs one layer's attempts and aggregates them into a [`LayerOutcome`].
pub struct LayerExecutor {
    spec: LayerSpec,
    tracker: ResultTracker,
    detector: PatternDetector,
}

impl LayerExecutor {
    /// Build an executor; fails if the layer's custom patterns are invalid.
    pub fn new(spec: LayerSpec, scoring: Arc<dyn ScoringPolicy>) -> Result<Self> {
        let detector = PatternDetector::with_custom(&spec.patterns)?;
        Ok(Self {
            spec,
            tracker: ResultTracker::new(scoring),
            detector,
        })
    }

    pub fn spec(&self) -> &LayerSpec {
        &self.spec
    }

    pub fn tracker(&self) -> &ResultTracker {
        &self.tracker
    }

    /// Run the attempt loop. Never fails: every outcome is a value.
    pub async fn run<R: AttemptRunner>(
        &mut self,
        runner: &R,
        workflow_context: &Value,
        prior_layers: &[LayerOutcome],
        progress: &dyn ProgressSink,
    ) -> LayerOutcome {
        self.tracker.reset();
        let mut run = LayerRun::new(self.spec.name.clone(), self.spec.max_attempts);
        let mut last_pattern: Option<PatternMatch> = None;

        info!(layer = %self.spec.name, max_attempts = self.spec.max_attempts, "layer started");
        progress.notify(&ProgressEvent::new(
            &self.spec.name,
            ProgressStatus::Started,
            format!("starting layer '{}'", self.spec.name),
        ));

        let mut transition = StateMachine::next(&mut run, Verdict::Retry);
        let final_state = loop {
            let attempt = match transition {
                Transition::Attempt(k) => k,
                Transition::Complete(state) => break state,
            };

            let delay_ms = self.spec.delay_before_attempt(attempt);
            if delay_ms > 0 {
                debug!(layer = %self.spec.name, attempt, delay_ms, "backing off");
                sleep(Duration::from_millis(delay_ms)).await;
            }

            progress.notify(
                &ProgressEvent::new(
                    &self.spec.name,
                    ProgressStatus::Progress,
                    format!("attempt {attempt}/{}", self.spec.max_attempts),
                )
                .at_attempt(attempt),
            );

            let ctx = AttemptContext {
                layer: &self.spec.name,
                attempt,
                max_attempts: self.spec.max_attempts,
                workflow_context,
                prior_layers,
            };
            let result = match runner.attempt(&ctx).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(
                        layer = %self.spec.name,
                        attempt,
                        error = %err,
                        "attempt raised an error"
                    );
                    AttemptResult::failure(format!("{err:#}"))
                }
            };

            let score = self.tracker.add_attempt(attempt, result);
            let verdict = self.judge(&mut last_pattern);
            debug!(layer = %self.spec.name, attempt, score, ?verdict, "attempt recorded");

            transition = StateMachine::next(&mut run, verdict);
        };

        let outcome = self.build_outcome(&run, final_state, last_pattern);
        info!(
            layer = %outcome.layer,
            state = %outcome.state,
            attempts = outcome.attempts_made,
            success = outcome.success,
            "layer finished"
        );
        progress.notify(
            &ProgressEvent::new(
                &outcome.layer,
                if outcome.success {
                    ProgressStatus::Completed
                } else {
                    ProgressStatus::Failed
                },
                format!("layer '{}' {}", outcome.layer, outcome.state),
            )
            .with_data(json!({
                "attempts": outcome.attempts_made,
                "best_attempt": outcome.best_attempt,
                "pattern": outcome.detected_pattern.as_ref().map(|p| p.name.clone()),
            })),
        );
        outcome
    }

    /// Decide what the most recently recorded attempt means for the layer.
    ///
    /// `last_pattern` always ends up describing this attempt: it is cleared
    /// when the attempt is accepted or matches nothing.
    fn judge(&self, last_pattern: &mut Option<PatternMatch>) -> Verdict {
        *last_pattern = None;
        let Some((current, prior)) = self.tracker.attempts().split_last() else {
            return Verdict::Retry;
        };
        if current.result.is_complete() {
            return Verdict::Accept;
        }

        let Some(pattern) = self.detector.detect(&current.result, prior) else {
            return Verdict::Retry;
        };
        let escalate = pattern.escalate && self.spec.on_failure == OnFailure::Escalate;
        if escalate {
            warn!(
                layer = %self.spec.name,
                attempt = current.attempt,
                pattern = %pattern.name,
                "escalating"
            );
        } else {
            debug!(
                layer = %self.spec.name,
                attempt = current.attempt,
                pattern = %pattern.name,
                "pattern detected"
            );
        }
        *last_pattern = Some(pattern);
        if escalate { Verdict::Escalate } else { Verdict::Retry }
    }

    fn build_outcome(
        &self,
        run: &LayerRun,
        state: LayerState,
        pattern: Option<PatternMatch>,
    ) -> LayerOutcome {
        let best = self.tracker.best();
        let chosen = match state {
            LayerState::Succeeded => self.tracker.last(),
            LayerState::Escalated => best,
            _ if self.spec.on_failure == OnFailure::ReturnBest => best,
            _ => self.tracker.last(),
        };
        let result = chosen.map(|a| &a.result);

        LayerOutcome {
            layer: self.spec.name.clone(),
            state,
            success: state == LayerState::Succeeded,
            output: result.map(|r| r.output.clone()).unwrap_or(Value::Null),
            validated: result.is_some_and(|r| r.validated),
            attempts_made: run.attempts_made,
            best_attempt: best.map(|a| a.attempt),
            best_score: best.map(|a| a.score),
            suggested_fix: pattern.as_ref().map(|p| p.suggested_fix.clone()),
            detected_pattern: pattern,
            error: result.and_then(|r| r.error.clone()),
            diagnostics: self.tracker.diagnostics(),
            started_at: run.started_at,
            finished_at: Utc::now(),
        }
    }
}
