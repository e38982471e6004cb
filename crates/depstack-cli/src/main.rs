//! depstack - build and stage a C dependency chain from source.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use depstack_cli::{cmd, config, Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build(args) => cmd::build::run(&args),
        Commands::Certs(args) => cmd::certs::run(&args),
        Commands::List(args) => {
            for spec in config::packages(&args.install_root) {
                println!("{:<12} {:<14} {}", spec.name, spec.version, spec.url);
            }
            Ok(())
        }
    }
}
