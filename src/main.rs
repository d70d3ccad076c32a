use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use serde_json::json;
use tracing::debug;

use iaf::cli::{Cli, Command};
use iaf::config::IafConfig;
use iaf::demo::{DemoRunner, demo_catalogs, demo_workflow};
use iaf::ui::TerminalProgress;
use iaf::{IterativeWrapper, WorkflowDefinition};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = IafConfig::load()?;
    init_tracing(&cli, &config);

    match cli.command {
        Command::Check { ref file } => check(file, cli.max_attempts),
        Command::Demo { json } => demo(&config, cli.max_attempts, json).await,
    }
}

fn init_tracing(cli: &Cli, config: &IafConfig) {
    let filter = if cli.verbose { "debug" } else { config.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_override(definition: &mut WorkflowDefinition, max_attempts: Option<u32>) {
    if let Some(max) = max_attempts {
        for layer in &mut definition.layers {
            layer.max_attempts = max;
        }
    }
}

fn check(file: &std::path::Path, max_attempts: Option<u32>) -> Result<()> {
    let mut definition = WorkflowDefinition::from_file(file)
        .with_context(|| format!("failed to load workflow {}", file.display()))?;
    apply_override(&mut definition, max_attempts);
    definition.validate()?;

    let green = Style::new().green().bold();
    let dim = Style::new().dim();
    println!(
        "  {} {} — {} layer(s)",
        green.apply_to("✓"),
        definition.name.as_deref().unwrap_or("workflow"),
        definition.layers.len()
    );
    for (i, layer) in definition.layers.iter().enumerate() {
        println!(
            "    {}. {} (max {} attempt(s), on_success={:?}, on_failure={:?})",
            i + 1,
            layer.name,
            layer.max_attempts,
            layer.on_success,
            layer.on_failure
        );
        if !layer.tools.is_empty() || !layer.validators.is_empty() {
            println!(
                "       {}",
                dim.apply_to(format!(
                    "tools: [{}] validators: [{}]",
                    layer.tools.join(", "),
                    layer.validators.join(", ")
                ))
            );
        }
    }
    Ok(())
}

async fn demo(config: &IafConfig, max_attempts: Option<u32>, print_json: bool) -> Result<()> {
    let catalogs = demo_catalogs()?;
    let definition = demo_workflow(max_attempts.unwrap_or(config.default_max_attempts));
    let wrapper = IterativeWrapper::new(definition, &catalogs)?
        .with_scoring(Arc::new(config.scoring.clone()));
    debug!(
        tools = catalogs.tools.len(),
        validators = catalogs.validators.len(),
        "demo catalogs ready"
    );

    let progress = TerminalProgress::start("meeting-listings-demo");
    let runner = DemoRunner::new(&catalogs);
    let context = json!({"url": "https://example.org/meetings"});
    let outcome = wrapper.run(&runner, &context, &progress).await?;

    progress.finish(&outcome);
    if print_json {
        progress.print_outcome(&outcome);
    }
    Ok(())
}
