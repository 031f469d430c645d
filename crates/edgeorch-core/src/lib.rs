//! edgeorch-core — shared vocabulary for the EdgeOrch decision engine.
//!
//! Every other crate in the workspace speaks in these types: device
//! scores, peer entries, service descriptors, placement decisions, and
//! the engine's error taxonomy. Configuration parsing (`edgeorch.toml`
//! and service descriptor directories) also lives here.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CipherKind, EngineConfig, load_service_dir, parse_duration};
pub use error::{EngineError, EngineResult};
pub use types::*;
