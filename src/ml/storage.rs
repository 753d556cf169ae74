//! Model persistence
//!
//! A trained model is stored as two artifacts, scorer and scaler, at a
//! path pair derived from one configured base path. A missing pair at
//! startup simply leaves the engine untrained.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use super::forest::IsolationForest;
use super::scaler::StandardScaler;

/// Errors while persisting or loading model artifacts
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("model I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("model encode failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("model decode failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Path pair for one model: scorer at `<stem>.model`, scaler at
/// `<stem>.scaler`, both siblings of the configured base path.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
}

impl ModelPaths {
    /// Derive the pair from a base path (extension is replaced)
    pub fn from_base(base: &Path) -> Self {
        Self {
            model: base.with_extension("model"),
            scaler: base.with_extension("scaler"),
        }
    }

    /// Both artifacts exist on disk
    pub fn exist(&self) -> bool {
        self.model.exists() && self.scaler.exists()
    }
}

/// Write both artifacts
pub fn save(
    paths: &ModelPaths,
    forest: &IsolationForest,
    scaler: &StandardScaler,
) -> Result<(), StorageError> {
    if let Some(dir) = paths.model.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let mut writer = BufWriter::new(File::create(&paths.model)?);
    bincode::serde::encode_into_std_write(forest, &mut writer, bincode::config::standard())?;

    let mut writer = BufWriter::new(File::create(&paths.scaler)?);
    bincode::serde::encode_into_std_write(scaler, &mut writer, bincode::config::standard())?;

    info!("Saved anomaly model to {:?} / {:?}", paths.model, paths.scaler);
    Ok(())
}

/// Read both artifacts
pub fn load(paths: &ModelPaths) -> Result<(IsolationForest, StandardScaler), StorageError> {
    let mut reader = BufReader::new(File::open(&paths.model)?);
    let forest: IsolationForest =
        bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;

    let mut reader = BufReader::new(File::open(&paths.scaler)?);
    let scaler: StandardScaler =
        bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;

    Ok((forest, scaler))
}
