use std::sync::Mutex;

use serde_json::{Value, json};

use iaf::patterns::NO_ITEMS;
use iaf::{
    AttemptContext, AttemptResult, AttemptRunner, Catalogs, IterativeWrapper, LayerSpec,
    LayerState, NoProgress, OnFailure, OnSuccess, ProgressEvent, ProgressStatus,
    WorkflowDefinition,
};

/// Meeting-listing scraper stand-in: the static layer never finds rows, the
/// rendered layer validates on its first try.
struct ListingRunner {
    calls: Mutex<Vec<(String, u32)>>,
}

impl ListingRunner {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    fn attempts_for(&self, layer: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == layer)
            .count()
    }
}

impl AttemptRunner for ListingRunner {
    async fn attempt(&self, ctx: &AttemptContext<'_>) -> anyhow::Result<AttemptResult> {
        self.calls
            .lock()
            .unwrap()
            .push((ctx.layer.to_string(), ctx.attempt));
        match ctx.layer {
            "static_html" => Ok(AttemptResult::empty().with_item_count(0)),
            "headless" => {
                Ok(AttemptResult::validated(json!([{"title": "Council"}])).with_item_count(1))
            }
            other => anyhow::bail!("no strategy for {other}"),
        }
    }
}

fn two_layer_workflow() -> WorkflowDefinition {
    WorkflowDefinition::new(vec![
        LayerSpec::new("static_html", 3).on_failure(OnFailure::Escalate),
        LayerSpec::new("headless", 2).on_success(OnSuccess::ReturnBest),
    ])
}

#[tokio::test]
async fn escalation_hands_over_to_next_layer() {
    let wrapper = IterativeWrapper::new(two_layer_workflow(), &Catalogs::default()).unwrap();
    let runner = ListingRunner::new();

    let outcome = wrapper
        .run(&runner, &Value::Null, &NoProgress)
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.total_attempts, 2);
    assert_eq!(outcome.layer_outcomes.len(), 2);
    assert_eq!(runner.attempts_for("static_html"), 1);
    assert_eq!(runner.attempts_for("headless"), 1);

    let first = &outcome.layer_outcomes[0];
    assert_eq!(first.state, LayerState::Escalated);
    assert_eq!(first.detected_pattern.as_ref().unwrap().name, NO_ITEMS);
    assert_eq!(outcome.output, json!([{"title": "Council"}]));
}

#[tokio::test]
async fn total_attempts_is_sum_of_layers() {
    let definition = WorkflowDefinition::new(vec![
        LayerSpec::new("static_html", 3).on_failure(OnFailure::Continue),
        LayerSpec::new("headless", 2),
    ]);
    let wrapper = IterativeWrapper::new(definition, &Catalogs::default()).unwrap();
    let outcome = wrapper
        .run(&ListingRunner::new(), &Value::Null, &NoProgress)
        .await
        .unwrap();

    let sum: u32 = outcome.layer_outcomes.iter().map(|l| l.attempts_made).sum();
    assert_eq!(outcome.total_attempts, sum);
    assert_eq!(outcome.total_attempts, 4);
}

#[tokio::test]
async fn attempt_faults_never_escape_the_run() {
    let definition = WorkflowDefinition::new(vec![
        LayerSpec::new("mystery", 2).on_failure(OnFailure::ReturnBest),
    ]);
    let wrapper = IterativeWrapper::new(definition, &Catalogs::default()).unwrap();
    let outcome = wrapper
        .run(&ListingRunner::new(), &Value::Null, &NoProgress)
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.total_attempts, 2);
    assert_eq!(
        outcome.layer_outcomes[0].error.as_deref(),
        Some("no strategy for mystery")
    );
}

#[tokio::test]
async fn progress_follows_layer_order() {
    let events = Mutex::new(Vec::new());
    let sink = |e: &ProgressEvent| {
        if e.status != ProgressStatus::Progress {
            events.lock().unwrap().push(format!("{}:{:?}", e.layer, e.status));
        }
    };
    let wrapper = IterativeWrapper::new(two_layer_workflow(), &Catalogs::default()).unwrap();
    wrapper
        .run(&ListingRunner::new(), &Value::Null, &sink)
        .await
        .unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "static_html:Started",
            "static_html:Failed",
            "headless:Started",
            "headless:Completed",
        ]
    );
}

#[test]
fn workflow_file_round_trips_through_validation() {
    let definition = WorkflowDefinition::from_toml_str(
        r#"
        name = "listings"

        [[layer]]
        name = "static_html"
        max_attempts = 3
        on_failure = "escalate"

        [[layer]]
        name = "headless"
        max_attempts = 2
        on_success = "return_best"
        "#,
    )
    .unwrap();
    assert_eq!(definition.layers, two_layer_workflow().layers);
    assert!(IterativeWrapper::new(definition, &Catalogs::default()).is_ok());
}
