use crate::api::RunError;
use crate::cli::Cmd;

pub mod init;
pub mod run;
pub mod stages;
pub mod validate;

/// Dispatches the parsed command to the appropriate handler.
pub async fn dispatch(command: Cmd) -> Result<(), RunError> {
    match command {
        Cmd::Run {
            config,
            input,
            input_file,
            dry_run,
            show_steps,
            json,
        } => {
            let format = if json {
                run::OutputFormat::Json
            } else if show_steps {
                run::OutputFormat::Steps
            } else {
                run::OutputFormat::Final
            };
            run::run(
                config.as_deref(),
                input,
                input_file.as_deref(),
                dry_run,
                format,
            )
            .await
        }
        Cmd::Validate { config } => validate::run(config.as_deref()),
        Cmd::Stages { config } => stages::run(config.as_deref()),
        Cmd::Init { path, force } => init::run(path.as_deref(), force),
    }
}
