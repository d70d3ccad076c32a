//! Iterative agent framework.
//!
//! Runs a task through an ordered list of layers. Each layer makes bounded,
//! scored attempts through a caller-supplied [`AttemptRunner`], classifies
//! failures into [`patterns`], and decides whether to retry, escalate or stop.
//! The [`IterativeWrapper`] chains the layers into one [`WorkflowOutcome`].

pub mod catalog;
pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod layer;
pub mod orchestrator;
pub mod patterns;
pub mod progress;
pub mod state_machine;
pub mod tracker;
pub mod ui;
pub mod workflow;

pub use catalog::{Catalogs, Tool, ToolCatalog, ValidationReport, Validator, ValidatorCatalog};
pub use error::{IafError, Result};
pub use layer::{AttemptContext, AttemptRunner, LayerExecutor};
pub use orchestrator::IterativeWrapper;
pub use patterns::{FailurePattern, PatternDetector, PatternMatch};
pub use progress::{NoProgress, ProgressEvent, ProgressSink, ProgressStatus};
pub use state_machine::{AttemptResult, LayerOutcome, LayerState, WorkflowOutcome};
pub use tracker::{ResultTracker, ScoringPolicy, WeightedScoring};
pub use workflow::{LayerSpec, OnFailure, OnSuccess, Strategy, WorkflowDefinition};
