//! This example builds a pipeline in code and plugs in a custom `Invoke`
//! implementation next to plain closures.
//!
//! No provider or API key is needed:
//! `cargo run --example custom_invoke -- "ownership in Rust"`

use async_trait::async_trait;
use prompt_pipeline::api::{Invoke, InvokeError, Stage};
use prompt_pipeline::{Pipeline, PipelineError};
use std::sync::Arc;

/// Pretends to be a model by turning the input into a bullet list.
struct Outliner;

#[async_trait]
impl Invoke for Outliner {
    async fn invoke(&self, input: &str) -> Result<String, InvokeError> {
        let bullets: Vec<String> = input
            .split_whitespace()
            .map(|word| format!("- {}", word))
            .collect();
        Ok(bullets.join("\n"))
    }

    fn describe(&self) -> String {
        "outliner".to_string()
    }
}

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let topic = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ownership in Rust".to_string());

    // 1. Stages are wired by variable name; the chain is checked on build.
    let pipeline = Pipeline::builder()
        .input_key("topic")
        .stage(Stage::new("outline", None, "outline", Arc::new(Outliner)))
        .stage_fn("title", Some("outline"), "document", |s: &str| {
            Ok(format!("# Notes\n\n{}", s))
        })
        .build()?;

    for stage in pipeline.stages() {
        println!("{} -> {}", stage.name(), stage.output_key());
    }

    // 2. Each run gets its own variable pool.
    let out = pipeline.run_traced(topic).await?;
    for (key, value) in out.variables.iter() {
        println!("\n[{}]\n{}", key, value);
    }
    Ok(())
}
