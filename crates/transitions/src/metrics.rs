//! Timing instrumentation with bounded retention.
//!
//! A finite-state timing machine keyed to the four lifecycle phases feeds a
//! fixed-capacity FIFO of [`TransitionSample`]s. Only one transition's
//! in-flight state is tracked at a time; a second before-preparation while
//! one is pending overwrites it (rapid overlapping transitions lose the
//! older measurement — a documented limitation, not guarded against).

use crate::orchestrator::TransitionPhase;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// How many completed samples are retained; oldest evicted on overflow.
pub const SAMPLE_CAPACITY: usize = 10;

/// One completed transition measurement.
#[derive(Clone, Debug, Serialize)]
pub struct TransitionSample {
    /// Navigation intent to prepared content, in milliseconds.
    pub preparation_ms: u64,
    /// DOM swap duration, in milliseconds.
    pub swap_ms: u64,
    /// Full transition duration, in milliseconds.
    pub total_ms: u64,
    /// Commit time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Optional label forwarded by the embedder's router.
    pub transition_type: Option<String>,
}

/// Aggregate view over the retained samples.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct MetricsSummary {
    pub sample_count: usize,
    pub avg_preparation_ms: f64,
    pub avg_swap_ms: f64,
    pub avg_total_ms: f64,
    pub min_total_ms: u64,
    pub max_total_ms: u64,
}

#[derive(Debug)]
struct InFlight {
    started_at: Instant,
    preparation_ms: Option<u64>,
    swap_started_at: Option<Instant>,
    transition_type: Option<String>,
}

/// Collects per-transition timing samples into a bounded ring.
#[derive(Debug)]
pub struct MetricsCollector {
    enabled: bool,
    in_flight: Option<InFlight>,
    samples: VecDeque<TransitionSample>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            in_flight: None,
            samples: VecDeque::with_capacity(SAMPLE_CAPACITY),
        }
    }

    /// Toggle collection. Disabling drops any in-flight state but keeps the
    /// already-committed samples.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.in_flight = None;
        }
    }

    /// Advance the timing machine for one lifecycle phase.
    pub fn on_phase(&mut self, phase: TransitionPhase, transition_type: Option<&str>) {
        self.on_phase_at(phase, Instant::now(), transition_type);
    }

    /// Phase handler with an explicit clock, the actual state machine.
    pub fn on_phase_at(
        &mut self,
        phase: TransitionPhase,
        now: Instant,
        transition_type: Option<&str>,
    ) {
        if !self.enabled {
            return;
        }
        match phase {
            TransitionPhase::BeforePreparation => {
                // Overwrites any pending measurement.
                self.in_flight = Some(InFlight {
                    started_at: now,
                    preparation_ms: None,
                    swap_started_at: None,
                    transition_type: transition_type.map(str::to_owned),
                });
            }
            TransitionPhase::AfterPreparation => {
                if let Some(pending) = self.in_flight.as_mut() {
                    let elapsed = now.duration_since(pending.started_at).as_millis() as u64;
                    pending.preparation_ms = Some(elapsed);
                }
            }
            TransitionPhase::BeforeSwap => {
                if let Some(pending) = self.in_flight.as_mut() {
                    pending.swap_started_at = Some(now);
                }
            }
            TransitionPhase::AfterSwap => {
                if let Some(pending) = self.in_flight.take() {
                    let swap_from = pending.swap_started_at.unwrap_or(pending.started_at);
                    let sample = TransitionSample {
                        preparation_ms: pending.preparation_ms.unwrap_or(0),
                        swap_ms: now.duration_since(swap_from).as_millis() as u64,
                        total_ms: now.duration_since(pending.started_at).as_millis() as u64,
                        timestamp_ms: epoch_millis(),
                        transition_type: pending.transition_type,
                    };
                    self.commit(sample);
                }
            }
        }
    }

    fn commit(&mut self, sample: TransitionSample) {
        if self.samples.len() == SAMPLE_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Most recently committed sample.
    #[must_use]
    pub fn latest(&self) -> Option<&TransitionSample> {
        self.samples.back()
    }

    /// Retained samples, oldest first.
    #[must_use]
    pub fn samples(&self) -> impl Iterator<Item = &TransitionSample> {
        self.samples.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Arithmetic means and total-duration extremes over the ring.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        if self.samples.is_empty() {
            return MetricsSummary::default();
        }
        let count = self.samples.len();
        let mut prep_sum = 0u64;
        let mut swap_sum = 0u64;
        let mut total_sum = 0u64;
        let mut min_total = u64::MAX;
        let mut max_total = 0u64;
        for sample in &self.samples {
            prep_sum += sample.preparation_ms;
            swap_sum += sample.swap_ms;
            total_sum += sample.total_ms;
            min_total = min_total.min(sample.total_ms);
            max_total = max_total.max(sample.total_ms);
        }
        MetricsSummary {
            sample_count: count,
            avg_preparation_ms: prep_sum as f64 / count as f64,
            avg_swap_ms: swap_sum as f64 / count as f64,
            avg_total_ms: total_sum as f64 / count as f64,
            min_total_ms: min_total,
            max_total_ms: max_total,
        }
    }

    /// JSON diagnostic export of the summary plus the raw ring.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Export<'ring> {
            summary: MetricsSummary,
            samples: &'ring VecDeque<TransitionSample>,
        }
        serde_json::to_string(&Export {
            summary: self.summary(),
            samples: &self.samples,
        })
    }

    /// Drop all retained samples and any in-flight state.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.in_flight = None;
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
