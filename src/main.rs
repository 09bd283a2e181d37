use clap::Parser;
use rustic::config::{Cli, RenderConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = RenderConfig::try_from(cli)?;
    rustic::run(config)?;
    Ok(())
}
