//! Defines the command-line interface structure using clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::config::CONFIG_ENV;

#[derive(Parser, Debug)]
#[command(
    name = "prompt-pipeline",
    version,
    about = "Run validated chains of LLM prompts, each stage feeding the next"
)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv). RUST_LOG overrides this.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Run the pipeline on one input and print the final output
    Run {
        /// Pipeline definition file (TOML or YAML)
        #[arg(long, env = CONFIG_ENV)]
        config: Option<PathBuf>,
        /// Input text; read from stdin when neither --input nor --input-file is given
        #[arg(long)]
        input: Option<String>,
        /// Read the input from a file
        #[arg(long, conflicts_with = "input")]
        input_file: Option<PathBuf>,
        /// Render prompts locally instead of calling any provider
        #[arg(long)]
        dry_run: bool,
        /// Print every variable produced by the run, in order
        #[arg(long)]
        show_steps: bool,
        /// Print all variables as a JSON object
        #[arg(long, conflicts_with = "show_steps")]
        json: bool,
    },
    /// Check that a pipeline definition is well formed
    Validate {
        #[arg(long, env = CONFIG_ENV)]
        config: Option<PathBuf>,
    },
    /// List the stages of a pipeline in execution order
    Stages {
        #[arg(long, env = CONFIG_ENV)]
        config: Option<PathBuf>,
    },
    /// Write a sample four-stage pipeline definition
    Init {
        /// Destination (defaults to the standard config location)
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "prompt-pipeline",
            "-vv",
            "run",
            "--config",
            "p.toml",
            "--input",
            "hello",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Cmd::Run {
                config,
                input,
                dry_run,
                show_steps,
                ..
            } => {
                assert_eq!(config, Some(PathBuf::from("p.toml")));
                assert_eq!(input.as_deref(), Some("hello"));
                assert!(dry_run);
                assert!(!show_steps);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_input_sources_conflict() {
        let res = Cli::try_parse_from([
            "prompt-pipeline",
            "run",
            "--input",
            "a",
            "--input-file",
            "b.txt",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_init() {
        let cli = Cli::try_parse_from(["prompt-pipeline", "init", "x.yaml", "--force"]).unwrap();
        assert!(matches!(cli.command, Cmd::Init { force: true, .. }));
    }
}
