// src/main.rs - LinguaMetrica entry point

use clap::Parser;

use linguametrica::cli::{Cli, Commands};
use linguametrica::infra::logger;

#[tokio::main]
async fn main() {
    // .env from the working directory or its ancestors; `analyze` also reads
    // the project's own .env.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logger::init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Analyze {
            path,
            output,
            format,
        } => linguametrica::cli::analyze::run_analyze(&path, output.as_deref(), &format).await,
    }
}
