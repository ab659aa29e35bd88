use crate::api::RunError;
use crate::core::config::{load_pipeline_file, resolve_config_path, BuildMode};
use console::style;
use std::path::Path;

/// Load and assemble a pipeline without calling any provider.
pub fn run(config: Option<&Path>) -> Result<(), RunError> {
    let path = resolve_config_path(config)?;
    let file = load_pipeline_file(&path)?;
    let pipeline = file.build(BuildMode::DryRun)?;

    println!(
        "{} '{}' is valid: {} stage(s), {} → {}",
        style("✔").green(),
        style(path.display()).yellow(),
        pipeline.stages().len(),
        style(pipeline.input_key()).cyan(),
        style(pipeline.output_key()).cyan()
    );
    Ok(())
}
