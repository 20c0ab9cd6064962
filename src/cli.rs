use clap::Parser;
use std::path::PathBuf;

/// smartfand — client for the smart room-cooling controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: standard lookup locations)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Device controller base URL (overrides config)
    #[arg(short = 'e', long = "endpoint")]
    pub endpoint: Option<String>,

    /// Polling cadence in seconds (overrides config)
    #[arg(short = 'i', long = "interval")]
    pub interval: Option<u16>,
}
