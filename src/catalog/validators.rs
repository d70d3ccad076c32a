//! Validator catalog.
//!
//! A validator inspects a raw attempt output and reports pass/fail with
//! diagnostics. Faults raised by a validator's check are folded into a failed
//! report rather than propagated.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::schema;
use crate::error::{IafError, Result};

/// Outcome of running one or more validators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub validated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Set when the validator itself faulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl ValidationReport {
    pub fn pass() -> Self {
        Self {
            validated: true,
            errors: Vec::new(),
            error: None,
            details: Value::Null,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self::fail_with_errors(vec![error.into()])
    }

    pub fn fail_with_errors(errors: Vec<String>) -> Self {
        Self {
            validated: false,
            errors,
            ..Self::pass()
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    fn faulted(err: &anyhow::Error) -> Self {
        Self {
            validated: false,
            errors: Vec::new(),
            error: Some(format!("validator error: {err:#}")),
            details: Value::Null,
        }
    }

    /// Fold `other` into this report; any failure makes the whole report fail.
    pub fn merge(&mut self, other: ValidationReport) {
        self.validated &= other.validated;
        self.errors.extend(other.errors);
        if self.error.is_none() {
            self.error = other.error;
        }
        if !other.details.is_null() {
            self.details = match self.details.take() {
                Value::Null => Value::Array(vec![other.details]),
                Value::Array(mut items) => {
                    items.push(other.details);
                    Value::Array(items)
                }
                first => Value::Array(vec![first, other.details]),
            };
        }
    }
}

/// Checks a raw result against expected criteria.
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema the inspected value must satisfy before `check` runs.
    fn input_schema(&self) -> Value {
        Value::Object(Default::default())
    }

    async fn check(&self, value: &Value) -> anyhow::Result<ValidationReport>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatorInfo {
    pub name: String,
    pub description: String,
}

/// Name → validator map. The first registration of a name wins.
#[derive(Default, Clone)]
pub struct ValidatorCatalog {
    validators: HashMap<String, Arc<dyn Validator>>,
}

impl ValidatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, validator: Arc<dyn Validator>) -> Result<()> {
        let name = validator.name().to_string();
        if self.validators.contains_key(&name) {
            return Err(IafError::DuplicateValidator(name));
        }
        debug!(validator = %name, "registered validator");
        self.validators.insert(name, validator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Validator>> {
        self.validators.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    pub fn list(&self) -> Vec<ValidatorInfo> {
        let mut infos: Vec<ValidatorInfo> = self
            .validators
            .values()
            .map(|v| ValidatorInfo {
                name: v.name().to_string(),
                description: v.description().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Validator>> {
        self.validators.remove(name)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run a validator by name.
    ///
    /// Unknown names and schema mismatches are errors; a fault inside the
    /// validator becomes a failed report with `error = "validator error: ..."`.
    pub async fn execute(&self, name: &str, value: &Value) -> Result<ValidationReport> {
        let validator = self
            .validators
            .get(name)
            .ok_or_else(|| IafError::ValidatorNotFound(name.to_string()))?;

        let errors = schema::check(&validator.input_schema(), value);
        if !errors.is_empty() {
            return Err(IafError::SchemaValidation {
                name: name.to_string(),
                errors,
            });
        }

        match validator.check(value).await {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!(validator = %name, error = %err, "validator faulted");
                Ok(ValidationReport::faulted(&err))
            }
        }
    }

    /// Run several validators in order and merge their reports.
    pub async fn run_all(&self, names: &[String], value: &Value) -> Result<ValidationReport> {
        let mut merged = ValidationReport::pass();
        for name in names {
            merged.merge(self.execute(name, value).await?);
        }
        Ok(merged)
    }
}
