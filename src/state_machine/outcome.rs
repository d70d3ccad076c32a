use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::state::LayerState;
use crate::patterns::PatternMatch;
use crate::tracker::TrackerDiagnostics;

/// Metadata key holding the number of items an attempt extracted.
pub const ITEM_COUNT_KEY: &str = "itemCount";
/// Metadata key holding the percentage of expected fields an attempt filled.
pub const FIELD_COVERAGE_KEY: &str = "fieldCoverage";

/// The structured result of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Score assigned by the tracker when the attempt was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AttemptResult {
    /// A successful attempt whose output has not been validated yet.
    pub fn success(output: Value) -> Self {
        Self {
            success: true,
            output,
            validated: false,
            error: None,
            score: None,
            metadata: Map::new(),
        }
    }

    /// A successful attempt that also passed validation.
    pub fn validated(output: Value) -> Self {
        Self {
            validated: true,
            ..Self::success(output)
        }
    }

    /// A failed attempt carrying an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            validated: false,
            error: Some(error.into()),
            score: None,
            metadata: Map::new(),
        }
    }

    /// A failed attempt with no error text (e.g. empty extraction).
    pub fn empty() -> Self {
        Self {
            error: None,
            ..Self::failure("")
        }
    }

    pub fn with_validated(mut self, validated: bool) -> Self {
        self.validated = validated;
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = output;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_item_count(self, count: u64) -> Self {
        self.with_metadata(ITEM_COUNT_KEY, count)
    }

    pub fn with_field_coverage(self, percent: f64) -> Self {
        self.with_metadata(FIELD_COVERAGE_KEY, percent)
    }

    /// Success and validation both hold.
    pub fn is_complete(&self) -> bool {
        self.success && self.validated
    }

    /// `metadata.itemCount` when it is numeric.
    pub fn item_count(&self) -> Option<f64> {
        self.metadata.get(ITEM_COUNT_KEY).and_then(Value::as_f64)
    }

    /// `metadata.fieldCoverage` when it is numeric.
    pub fn field_coverage(&self) -> Option<f64> {
        self.metadata.get(FIELD_COVERAGE_KEY).and_then(Value::as_f64)
    }

    /// The error text, or an empty string.
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}

/// Aggregated result of one layer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerOutcome {
    pub layer: String,
    pub state: LayerState,
    pub success: bool,
    pub output: Value,
    pub validated: bool,
    pub attempts_made: u32,
    /// Attempt number of the best-scoring attempt, if any attempt ran.
    pub best_attempt: Option<u32>,
    pub best_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_pattern: Option<PatternMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub diagnostics: TrackerDiagnostics,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LayerOutcome {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Why the orchestrator stopped where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// Every configured layer ran.
    Completed,
    /// A layer succeeded with `on_success = return_best`.
    ReturnedOnSuccess,
    /// A layer failed with `on_failure = fail`.
    FailedFast,
    /// A layer failed with `on_failure = return_best`.
    ReturnedBestOnFailure,
}

/// Run-level diagnostics attached to a [`WorkflowOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDiagnostics {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    pub layers_configured: usize,
    pub layers_executed: usize,
    pub halt_reason: HaltReason,
    /// Layer whose policy ended the run early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// The terminal artifact of a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub success: bool,
    pub output: Value,
    pub validated: bool,
    pub total_attempts: u32,
    pub layer_outcomes: Vec<LayerOutcome>,
    pub diagnostics: WorkflowDiagnostics,
}
