//! adaptrank - Main entry point

use clap::Parser;

use adaptrank::cli::{cmd_launch, cmd_show, cmd_toy, Cli, Commands};

fn main() -> adaptrank::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adaptrank=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Launch {
            cluster,
            method,
            rescale,
            cheat,
            forward,
        } => cmd_launch(cluster, &method, rescale, cheat, forward)?,
        Commands::Toy { method, seed } => cmd_toy(&method, seed)?,
        Commands::Show { file } => cmd_show(&file)?,
    }

    Ok(())
}
