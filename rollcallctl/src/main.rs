use std::process::ExitCode;

use clap::Parser;
use rollcallctl::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    rollcallctl::run(cli).await
}
