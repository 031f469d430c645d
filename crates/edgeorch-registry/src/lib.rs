//! edgeorch-registry — who else is out there, and how fit are they.
//!
//! # Architecture
//!
//! ```text
//! ScoreExchange (background task)
//!   ├── ResourceScorer → local DeviceScore
//!   └── DiscoveryTransport
//!       ├── publish(score) → peers
//!       └── expire(window) → PeerEvents::on_peer_expire
//!
//! HttpDiscovery (DiscoveryTransport)
//!   └── observe(announcement) → PeerEvents::on_peer_update
//!
//! PeerRegistry (PeerEvents + AddressBook)
//!   └── device_id → PeerEntry, one lock, lexical snapshot order
//! ```
//!
//! The registry never evicts on its own; liveness belongs to the
//! transport, which calls `remove` explicitly.

pub mod discovery;
pub mod exchange;
pub mod registry;

pub use discovery::HttpDiscovery;
pub use exchange::{DiscoveryTransport, PeerEvents, ScoreExchange};
pub use registry::PeerRegistry;
