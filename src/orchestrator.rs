use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::Catalogs;
use crate::error::{IafError, Result};
use crate::layer::{AttemptRunner, LayerExecutor};
use crate::progress::ProgressSink;
use crate::state_machine::{HaltReason, LayerOutcome, WorkflowDiagnostics, WorkflowOutcome};
use crate::tracker::{ScoringPolicy, WeightedScoring};
use crate::workflow::{OnFailure, OnSuccess, WorkflowDefinition};

/// Drives a workflow through its layers in order and folds their outcomes
/// into one [`WorkflowOutcome`].
pub struct IterativeWrapper {
    definition: WorkflowDefinition,
    scoring: Arc<dyn ScoringPolicy>,
}

impl IterativeWrapper {
    /// Validate `definition` and check every tool and validator it references
    /// against `catalogs`. Nothing runs if this fails.
    pub fn new(definition: WorkflowDefinition, catalogs: &Catalogs) -> Result<Self> {
        definition.validate()?;
        catalogs.check_references(&definition)?;
        Ok(Self {
            definition,
            scoring: Arc::new(WeightedScoring::default()),
        })
    }

    /// Replace the default weighted scoring.
    pub fn with_scoring(mut self, scoring: Arc<dyn ScoringPolicy>) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Run every layer until one of the layer policies halts the workflow.
    ///
    /// Returns `Err` only from preflight, before any attempt executes: when
    /// `runner` does not handle one of the layers. Once the first layer
    /// starts, the result is always `Ok`.
    pub async fn run<R: AttemptRunner>(
        &self,
        runner: &R,
        context: &Value,
        progress: &dyn ProgressSink,
    ) -> Result<WorkflowOutcome> {
        if let Some(layer) = self
            .definition
            .layers
            .iter()
            .find(|l| !runner.handles(&l.name))
        {
            return Err(IafError::UnhandledLayer(layer.name.clone()));
        }
        let mut executors = self
            .definition
            .layers
            .iter()
            .map(|spec| LayerExecutor::new(spec.clone(), Arc::clone(&self.scoring)))
            .collect::<Result<Vec<_>>>()?;

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            workflow = self.definition.name.as_deref().unwrap_or("unnamed"),
            layers = executors.len(),
            "workflow started"
        );

        let mut outcomes: Vec<LayerOutcome> = Vec::with_capacity(executors.len());
        let mut total_attempts = 0;
        let mut halt = (HaltReason::Completed, None);

        for executor in executors.iter_mut() {
            let outcome = executor.run(runner, context, &outcomes, progress).await;
            total_attempts += outcome.attempts_made;

            let spec = executor.spec();
            let reason = if outcome.success {
                match spec.on_success {
                    OnSuccess::ReturnBest => Some(HaltReason::ReturnedOnSuccess),
                    OnSuccess::Continue => None,
                }
            } else {
                match spec.on_failure {
                    OnFailure::Fail => Some(HaltReason::FailedFast),
                    OnFailure::ReturnBest => Some(HaltReason::ReturnedBestOnFailure),
                    OnFailure::Escalate | OnFailure::Continue => None,
                }
            };
            outcomes.push(outcome);

            if let Some(reason) = reason {
                halt = (reason, Some(spec.name.clone()));
                break;
            }
        }

        let (halt_reason, halted_at) = halt;
        let completed_at = Utc::now();
        let diagnostics = WorkflowDiagnostics {
            run_id,
            workflow: self.definition.name.clone(),
            layers_configured: self.definition.layers.len(),
            layers_executed: outcomes.len(),
            halt_reason,
            halted_at,
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        };

        // The final outcome mirrors the last layer that ran.
        let (success, output, validated) = match outcomes.last() {
            Some(last) => (last.success, last.output.clone(), last.validated),
            None => (false, Value::Null, false),
        };
        if success {
            info!(run_id = %diagnostics.run_id, total_attempts, ?halt_reason, "workflow succeeded");
        } else {
            warn!(run_id = %diagnostics.run_id, total_attempts, ?halt_reason, "workflow failed");
        }

        Ok(WorkflowOutcome {
            success,
            output,
            validated,
            total_attempts,
            layer_outcomes: outcomes,
            diagnostics,
        })
    }
}
