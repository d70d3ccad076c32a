//! Catalogs of tools and validators used by attempt logic.
//!
//! Catalogs are explicit instances owned by the caller. The orchestrator only
//! consults them at preflight to check that every name a workflow references
//! is registered.

pub mod schema;
mod tools;
mod validators;

pub use tools::{Tool, ToolCatalog, ToolInfo};
pub use validators::{ValidationReport, Validator, ValidatorCatalog, ValidatorInfo};

use crate::error::{IafError, Result};
use crate::workflow::WorkflowDefinition;

/// The tool and validator catalogs a workflow run can draw on.
#[derive(Default, Clone)]
pub struct Catalogs {
    pub tools: ToolCatalog,
    pub validators: ValidatorCatalog,
}

impl Catalogs {
    pub fn new(tools: ToolCatalog, validators: ValidatorCatalog) -> Self {
        Self { tools, validators }
    }

    /// Fail on the first tool or validator name the workflow references but
    /// no catalog provides.
    pub fn check_references(&self, definition: &WorkflowDefinition) -> Result<()> {
        for layer in &definition.layers {
            if let Some(missing) = layer.tools.iter().find(|t| !self.tools.has(t)) {
                return Err(IafError::ToolNotFound(missing.clone()));
            }
            if let Some(missing) = layer.validators.iter().find(|v| !self.validators.has(v)) {
                return Err(IafError::ValidatorNotFound(missing.clone()));
            }
        }
        Ok(())
    }
}
