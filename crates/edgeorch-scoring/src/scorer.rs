//! Fitness scoring for placement decisions.
//!
//! Blends CPU, network and latency terms non-linearly so that devices of
//! very different classes (phone vs. gateway) rank sensibly against each
//! other instead of being compared by raw magnitude:
//!
//! ```text
//! cpu    = ( 1/(5.66·freq^-0.66) + 1/(3.22·usage^-0.241) + 1/(4·count^-0.3) ) / 3
//! net    = 1/(8770·bandwidth^-0.9)
//! render = rtt > 0 ? 0.77·rtt^-0.43 : 0
//! total  = net + cpu/2 + render
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

use crate::telemetry::{Telemetry, TelemetryError};

/// One complete set of telemetry readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// CPU utilization in percent.
    pub cpu_usage: f64,
    /// Logical CPU count.
    pub cpu_count: f64,
    /// CPU frequency in MHz.
    pub cpu_freq: f64,
    pub bandwidth: f64,
    /// Round-trip time to the target device in seconds.
    pub rtt: f64,
}

/// Why a score could not be produced. Never surfaced past placement.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("score unavailable: {metric} sample failed: {source}")]
    Unavailable {
        metric: &'static str,
        #[source]
        source: TelemetryError,
    },

    #[error("scorer has been closed")]
    Closed,
}

pub fn cpu_score(usage: f64, count: f64, freq: f64) -> f64 {
    ((1.0 / (5.66 * freq.powf(-0.66)))
        + (1.0 / (3.22 * usage.powf(-0.241)))
        + (1.0 / (4.0 * count.powf(-0.3))))
        / 3.0
}

pub fn net_score(bandwidth: f64) -> f64 {
    1.0 / (8770.0 * bandwidth.powf(-0.9))
}

pub fn render_score(rtt: f64) -> f64 {
    if rtt > 0.0 { 0.77 * rtt.powf(-0.43) } else { 0.0 }
}

/// Combine a full sample into the fitness score.
///
/// Anything that is not a finite, non-negative number collapses to `0.0`.
pub fn total_score(sample: &TelemetrySample) -> f64 {
    let total = net_score(sample.bandwidth)
        + cpu_score(sample.cpu_usage, sample.cpu_count, sample.cpu_freq) / 2.0
        + render_score(sample.rtt);

    if total.is_finite() && total > 0.0 { total } else { 0.0 }
}

/// Scores the local device through an injected telemetry capability.
pub struct ResourceScorer {
    telemetry: Arc<dyn Telemetry>,
    closed: AtomicBool,
}

impl ResourceScorer {
    pub fn new(telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            telemetry,
            closed: AtomicBool::new(false),
        }
    }

    /// Sample every metric, aborting on the first failure.
    pub async fn sample(&self, target_device_id: &str) -> Result<TelemetrySample, ScoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ScoreError::Closed);
        }

        let t = &self.telemetry;
        let cpu_usage = t.cpu_usage().await.map_err(unavailable("cpu/usage"))?;
        let cpu_count = t.cpu_count().await.map_err(unavailable("cpu/count"))?;
        let cpu_freq = t.cpu_freq().await.map_err(unavailable("cpu/freq"))?;
        let bandwidth = t.network_bandwidth().await.map_err(unavailable("network/bandwidth"))?;
        let rtt = t
            .round_trip_time(target_device_id)
            .await
            .map_err(unavailable("network/rtt"))?;

        Ok(TelemetrySample {
            cpu_usage,
            cpu_count,
            cpu_freq,
            bandwidth,
            rtt,
        })
    }

    pub async fn try_score(&self, target_device_id: &str) -> Result<f64, ScoreError> {
        let sample = self.sample(target_device_id).await?;
        Ok(total_score(&sample))
    }

    /// Score against `target_device_id`; any sampling failure yields `0.0`.
    pub async fn score(&self, target_device_id: &str) -> f64 {
        match self.try_score(target_device_id).await {
            Ok(score) => {
                debug!(target = %target_device_id, score, "scored local device");
                score
            }
            Err(e) => {
                debug!(target = %target_device_id, error = %e, "local device unavailable");
                0.0
            }
        }
    }

    /// Release sampling resources. Later calls to `score` yield `0.0`.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.telemetry.close();
        }
    }
}

fn unavailable(metric: &'static str) -> impl Fn(TelemetryError) -> ScoreError {
    move |source| ScoreError::Unavailable { metric, source }
}
