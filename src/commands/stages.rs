use crate::api::RunError;
use crate::core::config::{load_pipeline_file, resolve_config_path, BuildMode, StageKind};
use console::style;
use std::path::Path;

/// List every stage in execution order with the variables it reads and writes.
pub fn run(config: Option<&Path>) -> Result<(), RunError> {
    let path = resolve_config_path(config)?;
    let file = load_pipeline_file(&path)?;
    let pipeline = file.build(BuildMode::DryRun)?;

    let width = pipeline
        .stages()
        .iter()
        .map(|s| s.name().len())
        .max()
        .unwrap_or(0);

    println!("{}", style(format!("Pipeline {}", path.display())).bold().underlined());
    for (i, (stage, conf)) in pipeline.stages().iter().zip(&file.stages).enumerate() {
        let target = match conf.kind {
            StageKind::Template => "template".to_string(),
            StageKind::Llm => {
                let provider = conf.provider.as_deref().unwrap_or_default();
                match file.providers.get(provider) {
                    Some(p) => format!("{} ({}:{})", provider, p.backend, p.model),
                    None => provider.to_string(),
                }
            }
        };
        println!(
            "{:>2}. {}  {} → {}  {}",
            i + 1,
            style(format!("{:<width$}", stage.name(), width = width)).cyan(),
            pipeline.resolved_input(stage),
            style(stage.output_key()).green(),
            style(target).dim()
        );
    }
    println!(
        "\n{} {}",
        style("Final output:").bold(),
        style(pipeline.output_key()).green()
    );
    Ok(())
}
