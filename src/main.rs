use clap::Parser;
use prompt_pipeline::cli::Cli;
use prompt_pipeline::commands;
use prompt_pipeline::core::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);

    if let Err(e) = commands::dispatch(cli.command).await {
        eprintln!("• {}", e);
        std::process::exit(1);
    }
}
