use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flowsentry::alert::MultiSink;
use flowsentry::cli::{Cli, Mode};
use flowsentry::config::Config;
use flowsentry::engine::Engine;
use flowsentry::flow::FlowTracker;
use flowsentry::ml::AnomalyEngine;
use flowsentry::replay;
use flowsentry::signatures::SignatureEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "flowsentry=debug" } else { "flowsentry=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(rules) = cli.rules {
        config.signatures.rules_path = Some(rules);
    }
    if let Some(model) = cli.model {
        config.anomaly.model_path = Some(model);
    }
    if let Some(mode) = cli.mode {
        config.anomaly.learning_mode = mode == Mode::Learning;
    }

    let signatures = SignatureEngine::from_config(&config.signatures);
    info!("Signature engine ready with {} rules", signatures.rule_count());

    let tracker = FlowTracker::new(config.flow.clone());
    let anomaly = AnomalyEngine::new(config.anomaly.clone());
    let sink = Box::new(MultiSink::from_config(&config.alerts)?);

    let engine = Engine::start(config.engine.clone(), signatures, tracker, anomaly, sink);

    if let Some(capture) = cli.replay {
        replay::replay_file(&capture, &engine.sender())?;
        engine.stop();
        return Ok(());
    }

    info!("Running until interrupted");
    tokio::signal::ctrl_c().await?;
    engine.stop();
    Ok(())
}
