use crate::api::{PipelineOutput, RunError, RunState};
use crate::core::config::{load_pipeline_file, resolve_config_path, BuildMode};
use crate::core::utils::read_input;
use console::{style, Term};
use spinners::{Spinner, Spinners, Stream};
use std::path::Path;
use tracing::info;

/// How the result of a run is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Final,
    Steps,
    Json,
}

/// Run the pipeline on one input and print the result.
pub async fn run(
    config: Option<&Path>,
    input: Option<String>,
    input_file: Option<&Path>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<(), RunError> {
    let path = resolve_config_path(config)?;
    let file = load_pipeline_file(&path)?;
    let mode = if dry_run {
        BuildMode::DryRun
    } else {
        BuildMode::Live
    };
    let pipeline = file.build(mode)?;
    let input = read_input(input, input_file)?;

    info!(config = %path.display(), stages = pipeline.stages().len(), ?mode, "pipeline loaded");
    if dry_run {
        eprintln!(
            "{}",
            style("Dry run: prompts are rendered locally, no provider is called.").yellow()
        );
    }

    let show_progress = Term::stderr().is_term();
    let mut spinner: Option<Spinner> = None;
    let mut observer = |state: RunState| match state {
        RunState::Running {
            index,
            total,
            stage,
        } => {
            if show_progress {
                spinner = Some(Spinner::with_stream(
                    Spinners::Dots9,
                    format!("[{}/{}] Running stage '{}'...", index + 1, total, stage),
                    Stream::Stderr,
                ));
            }
        }
        RunState::StageFinished {
            index,
            total,
            stage,
            elapsed,
        } => {
            if let Some(mut sp) = spinner.take() {
                sp.stop_with_message(format!(
                    "{} [{}/{}] {} ({:.1}s)",
                    style("✔").green(),
                    index + 1,
                    total,
                    stage,
                    elapsed.as_secs_f64()
                ));
            }
        }
        RunState::Failed { stage, .. } => {
            if let Some(mut sp) = spinner.take() {
                sp.stop_with_message(format!("{} Stage '{}' failed.", style("✘").red(), stage));
            }
        }
        RunState::Completed => {}
    };

    let output = pipeline.run_observed(input, &mut observer).await?;
    print_output(&output, format)
}

fn print_output(output: &PipelineOutput, format: OutputFormat) -> Result<(), RunError> {
    match format {
        OutputFormat::Final => println!("{}", output.output),
        OutputFormat::Steps => {
            for (key, value) in output.variables.iter() {
                println!("{}", style(format!("[{}]", key)).cyan().bold());
                println!("{}\n", value);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output.variables)?);
        }
    }
    Ok(())
}
