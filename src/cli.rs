//! Command line interface

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Detection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Score traffic against the model, raising anomaly alerts
    Detection,
    /// Train from live traffic and suppress anomaly alerts
    Learning,
}

/// Network intrusion detection pipeline
#[derive(Debug, Parser)]
#[command(name = "flowsentry", version, about)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Signature rule file, overrides the configured path
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Base path for model persistence, overrides the configured path
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Replay packets from a JSONL capture instead of running live
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Detection or learning mode
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Verbose logging
    #[arg(short, long)]
    pub debug: bool,
}
