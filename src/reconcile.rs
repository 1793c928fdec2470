use crate::audio::time_stretch;
use crate::error::{Result, RevoiceError};
use crate::timeline::Timeline;
use tracing::{info, warn};

/// Default allowed gap between output and source duration, in seconds.
pub const DEFAULT_TOLERANCE_SECS: f64 = 1.0;

/// What [`DurationReconciler::reconcile`] did to the timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Already within tolerance.
    Unchanged,
    /// Stretched by `rate` (output duration scaled by `1 / rate`).
    Stretched { timeline: Timeline, rate: f64 },
}

/// Summary of a reconciliation attempt, kept for the run statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    pub before_secs: f64,
    pub after_secs: f64,
    pub rate: Option<f64>,
    pub error: Option<String>,
}

impl ReconcileReport {
    pub fn applied(&self) -> bool {
        self.rate.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct DurationReconciler {
    tolerance: f64,
}

impl Default for DurationReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_SECS)
    }
}

impl DurationReconciler {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Whether `output` seconds is close enough to `source` seconds.
    pub fn within_tolerance(&self, output: f64, source: f64) -> bool {
        (output - source).abs() <= self.tolerance
    }

    pub fn reconcile(&self, timeline: &Timeline, source_duration: f64) -> Result<ReconcileOutcome> {
        let output_duration = timeline.duration_secs();

        if self.within_tolerance(output_duration, source_duration) {
            info!(
                "Output duration {:.2}s within {:.2}s of source {:.2}s, no adjustment",
                output_duration, self.tolerance, source_duration
            );
            return Ok(ReconcileOutcome::Unchanged);
        }

        if !source_duration.is_finite() || source_duration <= 0.0 {
            return Err(RevoiceError::TimeStretch(format!(
                "cannot match a source duration of {}s",
                source_duration
            )));
        }

        let rate = output_duration / source_duration;
        info!(
            "Matching duration: {:.2}s -> {:.2}s (rate: {:.3})",
            output_duration, source_duration, rate
        );

        let stretched = time_stretch(timeline.samples(), rate)?;
        Ok(ReconcileOutcome::Stretched {
            timeline: Timeline::from_samples(stretched, timeline.sample_rate()),
            rate,
        })
    }

    /// Reconcile, falling back to the input timeline if stretching fails.
    pub fn reconcile_or_keep(
        &self,
        timeline: Timeline,
        source_duration: f64,
    ) -> (Timeline, ReconcileReport) {
        let before_secs = timeline.duration_secs();
        match self.reconcile(&timeline, source_duration) {
            Ok(ReconcileOutcome::Unchanged) => (
                timeline,
                ReconcileReport {
                    before_secs,
                    after_secs: before_secs,
                    rate: None,
                    error: None,
                },
            ),
            Ok(ReconcileOutcome::Stretched { timeline, rate }) => {
                let after_secs = timeline.duration_secs();
                (
                    timeline,
                    ReconcileReport {
                        before_secs,
                        after_secs,
                        rate: Some(rate),
                        error: None,
                    },
                )
            }
            Err(e) => {
                warn!("Duration adjustment failed, keeping unadjusted audio: {}", e);
                (
                    timeline,
                    ReconcileReport {
                        before_secs,
                        after_secs: before_secs,
                        rate: None,
                        error: Some(e.to_string()),
                    },
                )
            }
        }
    }
}
