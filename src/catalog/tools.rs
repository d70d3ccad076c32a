//! Tool catalog.
//!
//! Tools are capabilities the attempt logic can call by name: fetch a page,
//! run a query, transform a document. The engine never calls them itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::schema;
use crate::error::{IafError, Result};

/// A named capability with a JSON-schema-described input.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within a catalog.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema the params must satisfy before `execute` is called.
    fn input_schema(&self) -> Value;

    async fn execute(&self, params: Value) -> anyhow::Result<Value>;
}

/// Listing entry for a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Name → tool map. The first registration of a name wins.
#[derive(Default, Clone)]
pub struct ToolCatalog {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; fails if the name is already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(IafError::DuplicateTool(name));
        }
        debug!(tool = %name, "registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tools sorted by name.
    pub fn list(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate `params` against the tool's schema, then run it.
    pub async fn execute(&self, name: &str, params: Value) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| IafError::ToolNotFound(name.to_string()))?;

        let errors = schema::check(&tool.input_schema(), &params);
        if !errors.is_empty() {
            return Err(IafError::SchemaValidation {
                name: name.to_string(),
                errors,
            });
        }

        tool.execute(params)
            .await
            .map_err(|e| IafError::ToolExecution {
                name: name.to_string(),
                message: format!("{e:#}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Echoes the `text` param back, optionally prefixed.
    struct EchoTool {
        prefix: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }
        async fn execute(&self, params: Value) -> anyhow::Result<Value> {
            let text = params["text"].as_str().unwrap_or_default();
            Ok(json!(format!("{}{text}", self.prefix)))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn input_schema(&self) -> Value {
            json!({})
        }
        async fn execute(&self, _params: Value) -> anyhow::Result<Value> {
            anyhow::bail!("upstream returned 503")
        }
    }

    #[tokio::test]
    async fn register_and_execute() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Arc::new(EchoTool { prefix: "" })).unwrap();

        assert!(catalog.has("echo"));
        let out = catalog.execute("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, json!("hi"));
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_first() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Arc::new(EchoTool { prefix: "first:" })).unwrap();

        let err = catalog
            .register(Arc::new(EchoTool { prefix: "second:" }))
            .unwrap_err();
        assert!(matches!(err, IafError::DuplicateTool(ref n) if n == "echo"));

        assert_eq!(catalog.len(), 1);
        let out = catalog.execute("echo", json!({"text": "x"})).await.unwrap();
        assert_eq!(out, json!("first:x"));
    }

    #[tokio::test]
    async fn get_returns_registered_tool() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Arc::new(EchoTool { prefix: "got:" })).unwrap();

        let tool = catalog.get("echo").unwrap();
        assert_eq!(tool.name(), "echo");
        assert_eq!(tool.input_schema()["required"], json!(["text"]));
        assert_eq!(tool.execute(json!({"text": "a"})).await.unwrap(), json!("got:a"));
        assert!(catalog.get("missing").is_none());
    }

    #[tokio::test]
    async fn execute_unknown_tool() {
        let catalog = ToolCatalog::new();
        let err = catalog.execute("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, IafError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn execute_rejects_bad_params() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Arc::new(EchoTool { prefix: "" })).unwrap();

        let err = catalog.execute("echo", json!({"text": 5})).await.unwrap_err();
        match err {
            IafError::SchemaValidation { name, errors } => {
                assert_eq!(name, "echo");
                assert_eq!(errors, vec!["'params.text' must be string, got integer"]);
            }
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn execution_failure_is_reported() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Arc::new(BrokenTool)).unwrap();
        let err = catalog.execute("broken", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Tool 'broken' failed: upstream returned 503");
    }

    #[test]
    fn list_and_unregister() {
        let mut catalog = ToolCatalog::new();
        catalog.register(Arc::new(EchoTool { prefix: "" })).unwrap();
        catalog.register(Arc::new(BrokenTool)).unwrap();

        let names: Vec<String> = catalog.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["broken", "echo"]);

        assert!(catalog.unregister("broken").is_some());
        assert!(catalog.unregister("broken").is_none());
        assert!(!catalog.has("broken"));
    }
}
