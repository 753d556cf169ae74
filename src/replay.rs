//! Packet replay
//!
//! Reads [`PacketEvent`] records from a JSONL file and feeds them into a
//! running pipeline. Used for offline analysis and for exercising the
//! detectors against recorded traffic.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::PacketEvent;
use crate::engine::PacketSender;

/// Replay one JSONL file into the pipeline. Malformed lines are skipped
/// with a warning. Returns the number of events submitted.
pub fn replay_file(path: &Path, sender: &PacketSender) -> Result<u64> {
    let file = File::open(path).with_context(|| format!("opening replay file {path:?}"))?;
    let reader = BufReader::new(file);

    let mut submitted = 0u64;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading replay file {path:?}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: PacketEvent = match serde_json::from_str(&line) {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping malformed replay record at line {}: {e}", idx + 1);
                continue;
            }
        };
        if sender.send(event) {
            submitted += 1;
        }
    }

    info!("Replayed {submitted} events from {:?}", path);
    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::CollectSink;
    use crate::engine::{Engine, EngineConfig};
    use crate::flow::{FlowConfig, FlowTracker};
    use crate::ml::{AnomalyConfig, AnomalyEngine};
    use crate::signatures::SignatureEngine;
    use chrono::Utc;
    use std::io::Write;

    #[test]
    fn test_replay_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jsonl");

        let evt = PacketEvent::new(
            Utc::now(),
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
            6,
            100,
        );
        let mut f = File::create(&path).unwrap();
        writeln!(f, "{}", serde_json::to_string(&evt).unwrap()).unwrap();
        writeln!(f, "not json").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "{}", serde_json::to_string(&evt).unwrap()).unwrap();
        drop(f);

        let engine = Engine::start(
            EngineConfig::default(),
            SignatureEngine::new(),
            FlowTracker::new(FlowConfig::default()),
            AnomalyEngine::new(AnomalyConfig::default()),
            Box::new(CollectSink::new()),
        );

        let submitted = replay_file(&path, &engine.sender()).unwrap();
        assert_eq!(submitted, 2);

        engine.stop();
    }

    #[test]
    fn test_replay_missing_file_errors() {
        let engine = Engine::start(
            EngineConfig::default(),
            SignatureEngine::new(),
            FlowTracker::new(FlowConfig::default()),
            AnomalyEngine::new(AnomalyConfig::default()),
            Box::new(CollectSink::new()),
        );
        let result = replay_file(Path::new("/nonexistent/capture.jsonl"), &engine.sender());
        assert!(result.is_err());
        engine.stop();
    }
}
