//! Core domain types shared across the pipeline

pub mod alert;
pub mod flow;
pub mod packet;

pub use alert::{Alert, AlertContext, AlertKind};
pub use flow::{FlowKey, FlowRecord};
pub use packet::PacketEvent;
