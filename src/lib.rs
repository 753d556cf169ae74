//! flowsentry: a hybrid network intrusion detection pipeline.
//!
//! Packet events flow through two parallel detection paths. The signature
//! path matches each packet against declarative rules. The behavioral path
//! aggregates packets into flows, extracts statistical features from
//! expired flows, and scores them with an online-trained isolation forest.
//! Alerts from both paths converge on a configurable sink.

pub mod alert;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod flow;
pub mod ml;
pub mod replay;
pub mod signatures;

pub use config::Config;
pub use engine::{Engine, EngineConfig, PacketSender};
