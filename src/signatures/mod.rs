//! Signature rule engine
//!
//! Declarative per-packet rules loaded from a TOML file. The active rule
//! set is an immutable snapshot behind a lock: readers clone an `Arc` and
//! evaluate against a consistent set while reloads swap in a new one.

pub mod loader;
pub mod matcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{Alert, PacketEvent};

pub use loader::{CompiledRule, RuleError, RuleSet, RuleSpec};

/// Settings for the signature path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Rule file path; no file means an empty rule set
    pub rules_path: Option<PathBuf>,
}

/// The signature engine. Cheap to share; evaluation never blocks a reload
/// for longer than the snapshot swap.
pub struct SignatureEngine {
    rules: Arc<RwLock<Arc<RuleSet>>>,
}

impl SignatureEngine {
    /// Engine with an empty rule set
    pub fn new() -> Self {
        Self {
            rules: Arc::new(RwLock::new(Arc::new(RuleSet::default()))),
        }
    }

    /// Engine loaded from a rule file
    pub fn from_file(path: &Path) -> Self {
        let engine = Self::new();
        engine.reload(path);
        engine
    }

    /// Engine built from the signature config section
    pub fn from_config(config: &SignatureConfig) -> Self {
        match &config.rules_path {
            Some(path) => Self::from_file(path),
            None => Self::new(),
        }
    }

    /// Evaluate one packet against the current snapshot
    pub fn evaluate(&self, event: &PacketEvent) -> Vec<Alert> {
        let snapshot = Arc::clone(&self.rules.read());
        matcher::evaluate(&snapshot, event)
    }

    /// Append a rule to the active set. In-flight evaluations keep their
    /// snapshot; later ones see the extended set.
    pub fn add_rule(&self, spec: RuleSpec) -> Result<(), RuleError> {
        let rule = CompiledRule::compile(spec)?;
        let mut guard = self.rules.write();
        let mut rules = guard.rules().to_vec();
        rules.push(rule);
        *guard = Arc::new(RuleSet::from_rules(rules));
        Ok(())
    }

    /// Replace the active set with a fresh load of the rule file
    pub fn reload(&self, path: &Path) {
        let set = Arc::new(RuleSet::load(path));
        info!("Activating rule set with {} rules", set.len());
        *self.rules.write() = set;
    }

    /// Number of active rules
    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }
}

impl Default for SignatureEngine {
    fn default() -> Self {
        Self::new()
    }
}
