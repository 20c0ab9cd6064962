use anyhow::Result;
use clap::Parser;

use smartfand::{application::Application, cli::Cli, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config)?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(interval) = cli.interval {
        config.tick_seconds = interval;
    }

    Application::builder()
        .with_config(config)
        .build()?
        .run()
        .await
}
