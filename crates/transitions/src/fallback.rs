//! Failure detection and hard-reload recovery.
//!
//! A per-transition timeout is armed at before-preparation and disarmed at
//! after-swap; expiry, or a fault reported by the navigation layer, enters
//! degraded mode exactly once: a state class zeroes the duration tokens, a
//! full-page reload of the current URL is scheduled after the configured
//! delay, and the handler re-enables itself after a fixed cool-down.
//! Faults are a tagged taxonomy surfaced by the navigation layer itself,
//! not inferred from error message text.

use crate::host::{BrowserCapabilities, HostPage};
use core::fmt;
use log::warn;
use serde::Serialize;
use std::time::{Duration, Instant};

/// State class applied while degraded; page styles zero the duration tokens
/// under it.
pub const FALLBACK_CLASS: &str = "transitions-degraded";
/// Fixed cool-down before the handler re-enables after degrading.
pub const COOLDOWN_MS: u64 = 5000;

/// Fault taxonomy reported by the navigation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum TransitionFault {
    /// No after-swap arrived within the allowed transition duration.
    Timeout,
    /// The preparation phase failed to produce new content.
    PreparationFailed,
    /// The DOM swap itself failed.
    SwapFailed,
    /// The host reported a transition-related error.
    Host(String),
}

impl fmt::Display for TransitionFault {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(formatter, "transition timed out"),
            Self::PreparationFailed => write!(formatter, "preparation failed"),
            Self::SwapFailed => write!(formatter, "swap failed"),
            Self::Host(detail) => write!(formatter, "host fault: {detail}"),
        }
    }
}

/// Capability probe consumed by the orchestrator for progressive
/// enhancement: three booleans, straight from the host report.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct SupportProbe {
    pub view_transition_api: bool,
    pub start_callable: bool,
    pub css_view_transitions: bool,
}

/// Probe the host for native transition support.
#[must_use]
pub fn probe_support(capabilities: BrowserCapabilities) -> SupportProbe {
    SupportProbe {
        view_transition_api: capabilities.view_transition_api,
        start_callable: capabilities.start_callable,
        css_view_transitions: capabilities.css_view_transitions,
    }
}

/// Read-only fallback state for status snapshots.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct FallbackStatus {
    pub degraded: bool,
    pub armed: bool,
}

/// Timeout/error detector with a degraded-mode recovery path.
///
/// Arming is per transition; two overlapping transitions re-arm the same
/// deadline slot, so the older transition stops being watched (documented
/// limitation shared with the metrics collector).
pub struct FallbackHandler {
    fallback_delay: Duration,
    max_transition_duration: Duration,
    /// Deadline for the transition currently being watched.
    armed_deadline: Option<Instant>,
    /// When the cool-down ends and the handler re-enables.
    degraded_until: Option<Instant>,
}

impl FallbackHandler {
    #[must_use]
    pub const fn new(fallback_delay: Duration, max_transition_duration: Duration) -> Self {
        Self {
            fallback_delay,
            max_transition_duration,
            armed_deadline: None,
            degraded_until: None,
        }
    }

    /// Push updated timings from a config change.
    pub const fn update_timings(
        &mut self,
        fallback_delay: Duration,
        max_transition_duration: Duration,
    ) {
        self.fallback_delay = fallback_delay;
        self.max_transition_duration = max_transition_duration;
    }

    /// Arm the timeout for a transition that just started.
    pub fn arm_at(&mut self, now: Instant) {
        if self.degraded_until.is_none() {
            self.armed_deadline = Some(now + self.max_transition_duration);
        }
    }

    /// The transition completed; clear the timer.
    pub fn disarm(&mut self) {
        self.armed_deadline = None;
    }

    /// A fault reported by the navigation layer. Enters degraded mode
    /// unless already degraded.
    pub fn report_fault_at(&mut self, fault: &TransitionFault, now: Instant, host: &dyn HostPage) {
        self.enter_degraded(fault, now, host);
    }

    /// Drive the timeout and the cool-down.
    pub fn tick_at(&mut self, now: Instant, host: &dyn HostPage) {
        if let Some(deadline) = self.armed_deadline
            && now >= deadline
        {
            self.armed_deadline = None;
            self.enter_degraded(&TransitionFault::Timeout, now, host);
        }
        if let Some(until) = self.degraded_until
            && now >= until
        {
            // Cool-down over; back to enabled.
            self.degraded_until = None;
            host.remove_class(FALLBACK_CLASS);
        }
    }

    fn enter_degraded(&mut self, fault: &TransitionFault, now: Instant, host: &dyn HostPage) {
        if self.degraded_until.is_some() {
            return;
        }
        warn!("entering degraded mode: {fault}");
        self.armed_deadline = None;
        self.degraded_until = Some(now + Duration::from_millis(COOLDOWN_MS));
        host.add_class(FALLBACK_CLASS);
        // Recovery of last resort: trade the enhancement for a navigation
        // that is guaranteed to land.
        host.schedule_reload(self.fallback_delay);
    }

    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded_until.is_some()
    }

    #[must_use]
    pub const fn status(&self) -> FallbackStatus {
        FallbackStatus {
            degraded: self.degraded_until.is_some(),
            armed: self.armed_deadline.is_some(),
        }
    }

    /// Remove injected state and clear timers. Idempotent.
    pub fn cleanup(&mut self, host: &dyn HostPage) {
        host.remove_class(FALLBACK_CLASS);
        self.armed_deadline = None;
        self.degraded_until = None;
    }
}
