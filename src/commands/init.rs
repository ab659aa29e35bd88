use crate::api::{ConfigError, RunError};
use crate::core::config::{resolve_config_path, save_pipeline_file, PipelineFile};
use crate::core::utils::ensure_parent_dir;
use console::style;
use std::path::Path;

/// Write the sample four-stage pipeline definition.
pub fn run(path: Option<&Path>, force: bool) -> Result<(), RunError> {
    let path = resolve_config_path(path)?;
    if path.exists() && !force {
        return Err(ConfigError::Invalid(format!(
            "'{}' already exists. Use --force to overwrite it.",
            path.display()
        ))
        .into());
    }

    ensure_parent_dir(&path)?;
    save_pipeline_file(&path, &PipelineFile::sample())?;

    println!(
        "{} Sample pipeline written to {}",
        style("✔").green().bold(),
        style(path.display()).yellow()
    );
    println!(
        "Set {} and {}, then try: prompt-pipeline run --config {} --input \"ownership in Rust\"",
        style("OPENAI_API_KEY").cyan(),
        style("ANTHROPIC_API_KEY").cyan(),
        path.display()
    );
    Ok(())
}
