//! edgeorch-scoring — turns device telemetry into one fitness score.
//!
//! # Components
//!
//! - **`telemetry`** — the `Telemetry` capability and the system-backed sampler
//! - **`probe`** — HTTP ping used for round-trip latency
//! - **`scorer`** — the non-linear fitness blend and `ResourceScorer`
//!
//! Scoring is all-or-nothing: if any metric cannot be sampled the device
//! scores exactly `0.0` and is treated as unavailable for placement.

pub mod probe;
pub mod scorer;
pub mod telemetry;

pub use scorer::{ResourceScorer, ScoreError, TelemetrySample, cpu_score, net_score, render_score, total_score};
pub use telemetry::{SystemTelemetry, Telemetry, TelemetryError, TelemetryResult};
