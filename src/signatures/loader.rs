//! Rule loading and compilation
//!
//! Two-phase load: each raw record is deserialized on its own, then
//! compiled into an immutable [`CompiledRule`]. A malformed record is
//! skipped with a warning; a wholly unreadable file yields an empty set.

use std::net::IpAddr;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Errors for a single rule record
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid rule record: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid payload pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

/// A rule as written in the rule file (`[[rules]]` array of tables)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Confidence weight, defaults to 1.0
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub src_ip: Option<IpAddr>,
    #[serde(default)]
    pub dst_ip: Option<IpAddr>,
    /// IP protocol number
    #[serde(default)]
    pub protocol: Option<u8>,
    /// Case-insensitive text pattern matched against the decoded payload
    #[serde(default)]
    pub pattern: Option<String>,
}

/// An immutable, match-ready rule
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub description: String,
    pub confidence: f64,
    pub src_ip: Option<IpAddr>,
    pub dst_ip: Option<IpAddr>,
    pub protocol: Option<u8>,
    pub pattern: Option<Regex>,
}

impl CompiledRule {
    /// Compile a raw spec; fails only on an invalid pattern
    pub fn compile(spec: RuleSpec) -> Result<Self, RuleError> {
        let pattern = match spec.pattern {
            Some(p) => Some(
                RegexBuilder::new(&p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| RuleError::Pattern { pattern: p, source })?,
            ),
            None => None,
        };

        Ok(Self {
            id: spec.id.unwrap_or_else(|| "unknown".to_string()),
            description: spec
                .description
                .unwrap_or_else(|| "Signature match".to_string()),
            confidence: spec.confidence.unwrap_or(1.0),
            src_ip: spec.src_ip,
            dst_ip: spec.dst_ip,
            protocol: spec.protocol,
            pattern,
        })
    }
}

/// An immutable, ordered rule set, replaced as a unit on reload
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Build a set from already-compiled rules
    pub fn from_rules(rules: Vec<CompiledRule>) -> Self {
        Self { rules }
    }

    /// Load a rule file. Individual malformed records are skipped with a
    /// warning; an unreadable or unparseable file yields an empty set.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Unable to read rule file {:?}: {e}", path);
                return Self::default();
            }
        };
        let set = Self::parse(&content);
        info!("Loaded {} rules from {:?}", set.len(), path);
        set
    }

    /// Parse rule file content
    pub fn parse(content: &str) -> Self {
        let doc: toml::Value = match toml::from_str(content) {
            Ok(v) => v,
            Err(e) => {
                warn!("Unable to parse rule file: {e}");
                return Self::default();
            }
        };

        let records = match doc.get("rules").and_then(|v| v.as_array()) {
            Some(arr) => arr.clone(),
            None => {
                warn!("Rule file has no [[rules]] entries");
                return Self::default();
            }
        };

        let mut rules = Vec::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            let spec: RuleSpec = match record.try_into() {
                Ok(s) => s,
                Err(e) => {
                    warn!("Skipping malformed rule #{idx}: {e}");
                    continue;
                }
            };
            match CompiledRule::compile(spec) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!("Skipping rule #{idx}: {e}"),
            }
        }

        Self { rules }
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
