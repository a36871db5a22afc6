// Harmony sync server - main.rs
// Parses the CLI and hands off to the selected command.

use clap::Parser;
use harmony_sync::cli::{run, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("harmony_sync: {e:#}");
        std::process::exit(1);
    }
}
