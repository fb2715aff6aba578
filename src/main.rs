mod cli;
mod commands;
mod formatting;
mod logging;
mod settings;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();
    logging::init(cli.verbose);
    commands::run(cli).await
}
