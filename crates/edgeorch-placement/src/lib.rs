//! EdgeOrch placement — local or remote, decided per invocation.
//!
//! Placement does not own any state. It reads the admission tables, the
//! local score and a registry snapshot, and produces a
//! [`PlacementDecision`](edgeorch_core::PlacementDecision) that is used
//! once and dropped.
//!
//! # Components
//!
//! - **`placer`** — `select_target` (pure selection) and `Placer`
//!   (admission + scoring + selection)

pub mod placer;

pub use placer::{Candidate, Placer, select_target};
