use async_trait::async_trait;
use futures::future::join_all;
use pretty_assertions::assert_eq;
use prompt_pipeline::api::{Invoke, InvokeError, Stage, VariablePool};
use prompt_pipeline::{Pipeline, PipelineError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every call and answers like a slow model would.
struct ScriptedModel {
    tag: &'static str,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(tag: &'static str) -> Arc<Self> {
        Arc::new(Self {
            tag,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Invoke for ScriptedModel {
    async fn invoke(&self, input: &str) -> Result<String, InvokeError> {
        self.calls.lock().unwrap().push(input.to_string());
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(format!("{}({})", self.tag, input))
    }
}

fn prefixed(i: usize) -> impl Fn(&str) -> Result<String, InvokeError> + Send + Sync + 'static {
    move |s: &str| Ok(format!("S{}:{}", i, s))
}

#[tokio::test]
async fn four_prefix_stages_compose() {
    let pipeline = Pipeline::builder()
        .stage_fn("one", None, "a", prefixed(1))
        .stage_fn("two", Some("a"), "b", prefixed(2))
        .stage_fn("three", Some("b"), "c", prefixed(3))
        .stage_fn("four", Some("c"), "d", prefixed(4))
        .build()
        .unwrap();

    assert_eq!(pipeline.run("hello").await.unwrap(), "S4:S3:S2:S1:hello");
}

#[tokio::test]
async fn custom_invokers_see_previous_output() {
    let first = ScriptedModel::new("draft");
    let second = ScriptedModel::new("edit");

    let pipeline = Pipeline::builder()
        .input_key("topic")
        .stage(Stage::new("draft", None, "draft", first.clone()))
        .stage(Stage::new("edit", Some("draft"), "edited", second.clone()))
        .build()
        .unwrap();

    let out = pipeline.run("rust").await.unwrap();
    assert_eq!(out, "edit(draft(rust))");
    assert_eq!(first.calls(), vec!["rust"]);
    assert_eq!(second.calls(), vec!["draft(rust)"]);
}

#[tokio::test]
async fn dangling_reference_fails_before_any_call() {
    let spy = ScriptedModel::new("spy");

    let result = Pipeline::builder()
        .stage(Stage::new("first", None, "a", spy.clone()))
        .stage(Stage::new("second", Some("not-produced"), "b", spy.clone()))
        .build();

    assert!(matches!(
        result,
        Err(PipelineError::InvalidPipelineDefinition(_))
    ));
    assert!(spy.calls().is_empty());
}

#[test]
fn shared_output_key_is_rejected() {
    let result = Pipeline::builder()
        .stage_fn("first", None, "same", prefixed(1))
        .stage_fn("second", Some("same"), "same", prefixed(2))
        .build();

    assert!(matches!(
        result,
        Err(PipelineError::InvalidPipelineDefinition(_))
    ));
}

#[tokio::test]
async fn failing_stage_leaves_no_output() {
    let pipeline = Pipeline::builder()
        .stage_fn("only", None, "out", |_: &str| Err("rate limited".into()))
        .build()
        .unwrap();

    assert!(matches!(
        pipeline.run("x").await,
        Err(PipelineError::StageInvocationFailed { .. })
    ));

    let mut pool = VariablePool::new("input", "x");
    assert!(pipeline.execute(&mut pool, &mut |_| {}).await.is_err());
    assert_eq!(pool.keys().collect::<Vec<_>>(), vec!["input"]);
}

#[tokio::test]
async fn concurrent_runs_do_not_interfere() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let model = ScriptedModel::new("m");
    let counter = Arc::clone(&invocations);

    let pipeline = Arc::new(
        Pipeline::builder()
            .stage(Stage::new("model", None, "answer", model.clone()))
            .stage_fn("count", Some("answer"), "counted", move |s: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(s.to_uppercase())
            })
            .build()
            .unwrap(),
    );

    let inputs: Vec<String> = (0..8).map(|i| format!("q{}", i)).collect();
    let runs = inputs.iter().map(|input| {
        let pipeline = Arc::clone(&pipeline);
        let input = input.clone();
        async move { pipeline.run_traced(input).await }
    });
    let results = join_all(runs).await;

    for (input, result) in inputs.iter().zip(results) {
        let out = result.unwrap();
        assert_eq!(out.output, format!("M({})", input.to_uppercase()));
        assert_eq!(out.variables.len(), 3);
        assert_eq!(out.variables.get("input"), Some(input.as_str()));
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 8);
    assert_eq!(model.calls().len(), 8);
}
