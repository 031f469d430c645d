//! edgeorch-engine — the decision engine a device runs.
//!
//! Owns every table (admission, peer registry) and capability (telemetry,
//! executor, transport, cipher) and exposes the operations the REST layer
//! and the daemon call:
//!
//! - `register_service` / `store_requesters` / `apply_descriptor`
//! - `invoke`: admission → placement → dispatch
//! - `execute_remote`: the receiving side of a forwarded invocation
//! - `score`, `peers`, `observe` for the exchange protocol
//!
//! # Architecture
//!
//! ```text
//! DecisionEngine
//!   ├── RequesterAdmission ─┐
//!   ├── CommandAdmission ───┼── Placer ── ResourceScorer ── Telemetry
//!   ├── PeerRegistry ───────┘
//!   ├── HttpDiscovery (feeds PeerRegistry)
//!   └── Dispatcher ── Executor | SecureTransport + Cipher
//! ```

pub mod builder;
pub mod engine;
pub mod reload;

pub use builder::EngineBuilder;
pub use engine::DecisionEngine;
pub use reload::DescriptorReloader;
