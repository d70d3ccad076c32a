//! Built-in demonstration workflow.
//!
//! Two layers try to collect meeting listings: a cheap static fetch that finds
//! nothing (and escalates on `NO_ITEMS`), then a rendered fetch that succeeds.
//! The attempt logic shows how domain code leans on the tool and validator
//! catalogs while the engine only sees attempt results.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::catalog::{Catalogs, Tool, ToolCatalog, ValidationReport, Validator, ValidatorCatalog};
use crate::layer::{AttemptContext, AttemptRunner};
use crate::state_machine::AttemptResult;
use crate::workflow::{LayerSpec, OnFailure, OnSuccess, WorkflowDefinition};

pub const STATIC_LAYER: &str = "static_fetch";
pub const RENDERED_LAYER: &str = "rendered_fetch";

/// Simulated page fetch without script execution: the listing is empty.
struct StaticFetch;

#[async_trait]
impl Tool for StaticFetch {
    fn name(&self) -> &str {
        "static_fetch"
    }

    fn description(&self) -> &str {
        "Fetch raw HTML and extract listing rows"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"url": {"type": "string"}},
            "required": ["url"]
        })
    }

    async fn execute(&self, _params: Value) -> anyhow::Result<Value> {
        Ok(json!([]))
    }
}

/// Simulated rendered fetch: returns a fixed listing.
struct RenderedFetch;

#[async_trait]
impl Tool for RenderedFetch {
    fn name(&self) -> &str {
        "rendered_fetch"
    }

    fn description(&self) -> &str {
        "Render the page and extract listing rows"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"url": {"type": "string"}},
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let source = params["url"].as_str().unwrap_or_default();
        Ok(json!([
            {"title": "City Council", "date": "2026-11-02", "source": source},
            {"title": "Planning Board", "date": "2026-11-09", "source": source},
            {"title": "Parks Committee", "date": "2026-11-16", "source": source}
        ]))
    }
}

/// Every row needs a title and a date.
struct RequiredFields;

#[async_trait]
impl Validator for RequiredFields {
    fn name(&self) -> &str {
        "required_fields"
    }

    fn description(&self) -> &str {
        "Each row has a non-empty title and date"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "array"})
    }

    async fn check(&self, value: &Value) -> anyhow::Result<ValidationReport> {
        let rows = value.as_array().map(Vec::as_slice).unwrap_or_default();
        if rows.is_empty() {
            return Ok(ValidationReport::fail("no rows"));
        }
        let errors: Vec<String> = rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| {
                ["title", "date"].into_iter().filter_map(move |field| {
                    let present = row[field].as_str().is_some_and(|s| !s.is_empty());
                    (!present).then(|| format!("row {i}: missing {field}"))
                })
            })
            .collect();
        let coverage = 100.0 * (1.0 - errors.len() as f64 / (rows.len() * 2) as f64);
        let report = if errors.is_empty() {
            ValidationReport::pass()
        } else {
            ValidationReport::fail_with_errors(errors)
        };
        Ok(report.with_details(json!({"fieldCoverage": coverage})))
    }
}

/// Catalogs holding the demo tools and validator.
pub fn demo_catalogs() -> crate::error::Result<Catalogs> {
    let mut tools = ToolCatalog::new();
    tools.register(Arc::new(StaticFetch))?;
    tools.register(Arc::new(RenderedFetch))?;

    let mut validators = ValidatorCatalog::new();
    validators.register(Arc::new(RequiredFields))?;

    Ok(Catalogs::new(tools, validators))
}

/// The two-layer demo workflow.
pub fn demo_workflow(max_attempts: u32) -> WorkflowDefinition {
    WorkflowDefinition::new(vec![
        LayerSpec::new(STATIC_LAYER, max_attempts)
            .on_failure(OnFailure::Escalate)
            .with_tool("static_fetch"),
        LayerSpec::new(RENDERED_LAYER, max_attempts)
            .on_success(OnSuccess::ReturnBest)
            .on_failure(OnFailure::ReturnBest)
            .with_tool("rendered_fetch")
            .with_validator("required_fields"),
    ])
    .named("meeting-listings-demo")
}

/// Attempt logic for the demo: call the layer's tool, then validate.
pub struct DemoRunner<'a> {
    catalogs: &'a Catalogs,
}

impl<'a> DemoRunner<'a> {
    pub fn new(catalogs: &'a Catalogs) -> Self {
        Self { catalogs }
    }
}

impl AttemptRunner for DemoRunner<'_> {
    async fn attempt(&self, ctx: &AttemptContext<'_>) -> Result<AttemptResult> {
        let url = ctx.workflow_context["url"].as_str().unwrap_or("about:blank");
        let rows = self.catalogs.tools.execute(ctx.layer, json!({"url": url})).await?;
        let count = rows.as_array().map(Vec::len).unwrap_or_default() as u64;
        if count == 0 {
            return Ok(AttemptResult::empty().with_item_count(0));
        }

        let report = self
            .catalogs
            .validators
            .execute("required_fields", &rows)
            .await?;
        let mut result = AttemptResult::success(rows)
            .with_validated(report.validated)
            .with_item_count(count);
        if let Some(coverage) = report.details["fieldCoverage"].as_f64() {
            result = result.with_field_coverage(coverage);
        }
        if !report.validated {
            result.error = Some(report.error.unwrap_or_else(|| report.errors.join("; ")));
        }
        Ok(result)
    }

    fn handles(&self, layer: &str) -> bool {
        layer == STATIC_LAYER || layer == RENDERED_LAYER
    }
}
