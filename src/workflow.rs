//! Workflow definitions: the ordered layers a run walks through.
//!
//! Definitions are plain data. They can be built in code or read from TOML or
//! JSON; [`WorkflowDefinition::validate`] performs the structural checks that
//! must pass before anything executes.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IafError, Result};
use crate::patterns::FailurePattern;

/// How a layer schedules its attempts.
///
/// Only `Sequential` is executed; the rest are accepted by the parser and
/// rejected at preflight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Sequential,
    Parallel,
    Consensus,
    ProgressiveRefinement,
    RandomSampling,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Sequential => "sequential",
            Strategy::Parallel => "parallel",
            Strategy::Consensus => "consensus",
            Strategy::ProgressiveRefinement => "progressive_refinement",
            Strategy::RandomSampling => "random_sampling",
        };
        f.write_str(s)
    }
}

/// What the workflow does after a layer succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnSuccess {
    /// Run the next layer anyway.
    #[default]
    Continue,
    /// Stop and return this layer's result.
    ReturnBest,
}

/// What a layer does when it fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Stop the workflow with a failure.
    #[default]
    Fail,
    /// Stop the workflow and hand back the best attempt.
    ReturnBest,
    /// Allow escalating patterns to cut the layer short, then move on.
    Escalate,
    /// Move on to the next layer.
    Continue,
}

/// One stage of bounded-retry attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub max_attempts: u32,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub on_success: OnSuccess,
    #[serde(default)]
    pub on_failure: OnFailure,
    /// Custom failure patterns checked before the built-ins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<FailurePattern>,
    /// Tools the attempt logic of this layer relies on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// Validators the attempt logic of this layer relies on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<String>,
    /// Base delay for exponential backoff between attempts; 0 disables it.
    #[serde(default)]
    pub backoff_ms: u64,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            max_attempts,
            strategy: Strategy::Sequential,
            on_success: OnSuccess::Continue,
            on_failure: OnFailure::Fail,
            patterns: Vec::new(),
            tools: Vec::new(),
            validators: Vec::new(),
            backoff_ms: 0,
        }
    }

    pub fn on_success(mut self, policy: OnSuccess) -> Self {
        self.on_success = policy;
        self
    }

    pub fn on_failure(mut self, policy: OnFailure) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_pattern(mut self, pattern: FailurePattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn with_tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push(name.into());
        self
    }

    pub fn with_validator(mut self, name: impl Into<String>) -> Self {
        self.validators.push(name.into());
        self
    }

    pub fn with_backoff(mut self, base_delay_ms: u64) -> Self {
        self.backoff_ms = base_delay_ms;
        self
    }

    /// Delay before `attempt`: base * 2^(attempt - 2), none before the first.
    pub fn delay_before_attempt(&self, attempt: u32) -> u64 {
        if self.backoff_ms == 0 || attempt <= 1 {
            return 0;
        }
        self.backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(2)))
    }
}

/// An ordered list of layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "layer", alias = "layers", default)]
    pub layers: Vec<LayerSpec>,
}

impl WorkflowDefinition {
    pub fn new(layers: Vec<LayerSpec>) -> Self {
        Self { name: None, layers }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load from a `.json` file, or TOML for any other extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Structural checks: at least one layer, unique non-empty names,
    /// positive attempt budgets, sequential strategies, valid patterns.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(IafError::InvalidWorkflow(
                "workflow has no layers".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for layer in &self.layers {
            if layer.name.trim().is_empty() {
                return Err(IafError::InvalidWorkflow(
                    "layer name must not be empty".to_string(),
                ));
            }
            if !seen.insert(layer.name.as_str()) {
                return Err(IafError::InvalidWorkflow(format!(
                    "duplicate layer name '{}'",
                    layer.name
                )));
            }
            if layer.max_attempts == 0 {
                return Err(IafError::InvalidWorkflow(format!(
                    "layer '{}' must allow at least one attempt",
                    layer.name
                )));
            }
            if layer.strategy != Strategy::Sequential {
                return Err(IafError::UnsupportedStrategy {
                    layer: layer.name.clone(),
                    strategy: layer.strategy.to_string(),
                });
            }
            for pattern in &layer.patterns {
                pattern.validate()?;
            }
        }
        Ok(())
    }

    pub fn layer(&self, name: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_TOML: &str = r#"
name = "meetings"

[[layer]]
name = "static_html"
max_attempts = 3
on_failure = "escalate"
tools = ["fetch_page"]

[[layer.patterns]]
name = "LOGIN_WALL"
suggested_fix = "Use an authenticated session"
escalate = true
error_contains = ["401", "login"]

[[layer]]
name = "headless_browser"
max_attempts = 2
on_success = "return_best"
on_failure = "return_best"
backoff_ms = 500
"#;

    #[test]
    fn parse_toml_definition() {
        let def = WorkflowDefinition::from_toml_str(SAMPLE_TOML).unwrap();
        assert_eq!(def.name.as_deref(), Some("meetings"));
        assert_eq!(def.layers.len(), 2);

        let first = &def.layers[0];
        assert_eq!(first.on_failure, OnFailure::Escalate);
        assert_eq!(first.on_success, OnSuccess::Continue);
        assert_eq!(first.strategy, Strategy::Sequential);
        assert_eq!(first.patterns[0].confidence, 0.5);
        assert_eq!(first.tools, vec!["fetch_page"]);

        let second = &def.layers[1];
        assert_eq!(second.on_success, OnSuccess::ReturnBest);
        assert_eq!(second.backoff_ms, 500);
        def.validate().unwrap();
    }

    #[test]
    fn parse_json_definition() {
        let json = r#"{
            "layers": [
                {"name": "api", "max_attempts": 2, "strategy": "consensus"}
            ]
        }"#;
        let def = WorkflowDefinition::from_json_str(json).unwrap();
        assert_eq!(def.layers[0].strategy, Strategy::Consensus);
        assert_eq!(def.layers[0].on_failure, OnFailure::Fail);
    }

    #[test]
    fn from_file_picks_format_by_extension() {
        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        toml_file.write_all(SAMPLE_TOML.as_bytes()).unwrap();
        let def = WorkflowDefinition::from_file(toml_file.path()).unwrap();
        assert_eq!(def.layers.len(), 2);

        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        json_file
            .write_all(br#"{"layer": [{"name": "only", "max_attempts": 1}]}"#)
            .unwrap();
        let def = WorkflowDefinition::from_file(json_file.path()).unwrap();
        assert_eq!(def.layers[0].name, "only");
    }

    #[test]
    fn validate_rejects_structural_problems() {
        assert!(matches!(
            WorkflowDefinition::default().validate(),
            Err(IafError::InvalidWorkflow(_))
        ));

        let zero = WorkflowDefinition::new(vec![LayerSpec::new("a", 0)]);
        assert!(matches!(zero.validate(), Err(IafError::InvalidWorkflow(_))));

        let dup = WorkflowDefinition::new(vec![LayerSpec::new("a", 1), LayerSpec::new("a", 2)]);
        assert!(matches!(dup.validate(), Err(IafError::InvalidWorkflow(_))));

        let parallel = WorkflowDefinition::new(vec![
            LayerSpec::new("a", 1).with_strategy(Strategy::Parallel),
        ]);
        match parallel.validate() {
            Err(IafError::UnsupportedStrategy { layer, strategy }) => {
                assert_eq!(layer, "a");
                assert_eq!(strategy, "parallel");
            }
            other => panic!("expected UnsupportedStrategy, got {other:?}"),
        }
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let layer = LayerSpec::new("a", 5).with_backoff(100);
        assert_eq!(layer.delay_before_attempt(1), 0);
        assert_eq!(layer.delay_before_attempt(2), 100);
        assert_eq!(layer.delay_before_attempt(3), 200);
        assert_eq!(layer.delay_before_attempt(4), 400);

        assert_eq!(LayerSpec::new("b", 5).delay_before_attempt(3), 0);
    }
}
