mod outcome;
mod state;

pub use outcome::{
    AttemptResult, FIELD_COVERAGE_KEY, HaltReason, ITEM_COUNT_KEY, LayerOutcome,
    WorkflowDiagnostics, WorkflowOutcome,
};
pub use state::{LayerRun, LayerState, StateMachine, Transition, Verdict};
