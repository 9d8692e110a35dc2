//! The orchestrator: owns the four feature modules and wires them to the
//! host's navigation lifecycle.
//!
//! The embedder's router reports each navigation as the fixed phase sequence
//! before-preparation, after-preparation, before-swap, after-swap, and
//! drives deadline timers by calling [`TransitionOrchestrator::tick`] from
//! its loop. Everything runs cooperatively on that loop; the only async
//! work is the fire-and-forget preload fetches, which the transition
//! pipeline never awaits.

use crate::accessibility::{AccessibilityManager, AccessibilityStatus};
use crate::config::{
    validate, ConfigValidationError, DurationTokens, TransitionConfig, TransitionConfigInput,
};
use crate::fallback::{
    probe_support, FallbackHandler, FallbackStatus, SupportProbe, TransitionFault,
};
use crate::fetch::Fetcher;
use crate::host::{HostPage, LinkCandidate};
use crate::metrics::{MetricsCollector, MetricsSummary, TransitionSample};
use crate::preload::{PreloadManager, PreloadStats};
use anyhow::Error;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::runtime::Handle;
use tracing::info_span;

/// The four lifecycle hooks the embedder's router fires around each
/// navigation, in fixed order for a single transition. Overlap between two
/// transitions is not guarded against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPhase {
    /// Navigation intent; new content is about to be fetched/built.
    BeforePreparation,
    /// New content is ready; the swap has not happened yet.
    AfterPreparation,
    /// The DOM swap is about to run.
    BeforeSwap,
    /// The DOM swap completed.
    AfterSwap,
}

/// CSS custom property for the fast duration tier.
pub const CSS_PROP_FAST: &str = "--transition-fast";
/// CSS custom property for the normal duration tier.
pub const CSS_PROP_NORMAL: &str = "--transition-normal";
/// CSS custom property for the slow duration tier.
pub const CSS_PROP_SLOW: &str = "--transition-slow";

/// Read-only aggregate snapshot across all modules.
#[derive(Clone, Debug, Serialize)]
pub struct OrchestratorStatus {
    pub initialized: bool,
    pub support: SupportProbe,
    pub config: TransitionConfig,
    pub accessibility: AccessibilityStatus,
    pub fallback: FallbackStatus,
    pub preload: PreloadStats,
    pub metrics: MetricsSummary,
}

#[derive(Serialize)]
struct Diagnostics {
    timestamp_ms: u64,
    status: OrchestratorStatus,
    latest_sample: Option<TransitionSample>,
}

/// Owns the module instances and the host wiring. At most one live instance
/// per registry; explicit `init`/`cleanup` lifecycle.
pub struct TransitionOrchestrator {
    config: TransitionConfig,
    host: Arc<dyn HostPage>,
    fetcher: Arc<dyn Fetcher>,
    handle: Handle,
    accessibility: AccessibilityManager,
    metrics: MetricsCollector,
    preload: PreloadManager,
    fallback: FallbackHandler,
    support: SupportProbe,
    initialized: bool,
}

impl TransitionOrchestrator {
    /// Build an orchestrator from an already-validated configuration. The
    /// instance is inert until [`init`](Self::init) runs.
    #[must_use]
    pub fn new(
        config: TransitionConfig,
        host: Arc<dyn HostPage>,
        fetcher: Arc<dyn Fetcher>,
        handle: Handle,
    ) -> Self {
        let capabilities = host.capabilities();
        let accessibility = AccessibilityManager::new(config.accessibility);
        let metrics = MetricsCollector::new(config.enable_performance_metrics);
        let preload = PreloadManager::new(
            config.preload_strategy,
            capabilities,
            Arc::clone(&fetcher),
            handle.clone(),
            config.debug,
        );
        let fallback = FallbackHandler::new(
            config.fallback_delay(),
            config.max_transition_duration(),
        );
        Self {
            support: probe_support(capabilities),
            config,
            host,
            fetcher,
            handle,
            accessibility,
            metrics,
            preload,
            fallback,
            initialized: false,
        }
    }

    /// Probe support, write the duration tokens, and apply reduced motion.
    /// Guarded: a second call logs a warning and changes nothing.
    pub fn init(&mut self) {
        if self.initialized {
            warn!("transition orchestrator already initialized; init() ignored");
            return;
        }
        let span = info_span!("transitions_init");
        let _entered = span.enter();
        self.support = probe_support(self.host.capabilities());
        self.apply_durations();
        self.accessibility
            .apply_reduced_motion(self.host.as_ref(), DURATION_PROPERTIES);
        self.initialized = true;
        info!(
            "transition orchestrator initialized (strategy {:?}, native support {})",
            self.preload.strategy(),
            self.support.view_transition_api && self.support.start_callable
        );
    }

    fn apply_durations(&self) {
        self.apply_durations_for(self.config.durations);
    }

    /// Re-probe the reduced-motion preference; when it lifts, the configured
    /// durations come back (the accessibility module only removes its class).
    fn refresh_reduced_motion(&mut self) {
        let was_active = self.accessibility.status().reduced_motion_active;
        self.accessibility
            .apply_reduced_motion(self.host.as_ref(), DURATION_PROPERTIES);
        if was_active && !self.accessibility.status().reduced_motion_active {
            self.apply_durations();
        }
    }

    fn apply_durations_for(&self, durations: DurationTokens) {
        self.host
            .set_css_property(CSS_PROP_FAST, &format!("{}ms", durations.fast_ms));
        self.host
            .set_css_property(CSS_PROP_NORMAL, &format!("{}ms", durations.normal_ms));
        self.host
            .set_css_property(CSS_PROP_SLOW, &format!("{}ms", durations.slow_ms));
    }

    /// Dispatch one lifecycle phase to all modules.
    pub fn handle_phase(&mut self, phase: TransitionPhase) {
        self.handle_phase_at(phase, Instant::now());
    }

    /// Phase dispatch with an explicit clock.
    pub fn handle_phase_at(&mut self, phase: TransitionPhase, now: Instant) {
        if !self.initialized {
            return;
        }
        self.metrics.on_phase_at(phase, now, None);
        match phase {
            TransitionPhase::BeforePreparation => {
                // The OS preference can flip between navigations; re-probe
                // so the upcoming animation sees the right durations.
                self.refresh_reduced_motion();
                self.fallback.arm_at(now);
            }
            TransitionPhase::AfterPreparation => {}
            TransitionPhase::BeforeSwap => {
                self.accessibility.on_before_swap_at(now, self.host.as_ref());
            }
            TransitionPhase::AfterSwap => {
                self.fallback.disarm();
                self.accessibility.on_after_swap_at(now, self.host.as_ref());
            }
        }
    }

    /// Drive deadline timers; the embedder calls this from its loop.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Timer pass with an explicit clock.
    pub fn tick_at(&mut self, now: Instant) {
        if !self.initialized {
            return;
        }
        self.accessibility.tick_at(now, self.host.as_ref());
        self.fallback.tick_at(now, self.host.as_ref());
    }

    /// Pointer moved over a candidate link (hover strategy trigger).
    pub fn pointer_over(&self, candidate: &LinkCandidate) {
        if self.initialized {
            self.preload
                .on_pointer_over(candidate, &self.host.current_url());
        }
    }

    /// A candidate link entered the viewport (visible strategy trigger).
    pub fn link_visible(&self, candidate: &LinkCandidate) {
        if self.initialized {
            self.preload
                .on_link_visible(candidate, &self.host.current_url());
        }
    }

    /// The navigation layer reports a transition fault; feeds the same
    /// degraded path as the timeout.
    pub fn report_fault(&mut self, fault: &TransitionFault) {
        self.report_fault_at(fault, Instant::now());
    }

    /// Fault report with an explicit clock.
    pub fn report_fault_at(&mut self, fault: &TransitionFault, now: Instant) {
        if self.initialized {
            self.fallback.report_fault_at(fault, now, self.host.as_ref());
        }
    }

    /// Validate a partial config, then selectively re-wire only the modules
    /// the change touches. Nothing is applied if validation fails.
    ///
    /// # Errors
    ///
    /// Returns the aggregate [`ConfigValidationError`] for out-of-range
    /// fields; the live configuration is untouched on failure.
    pub fn update_config(
        &mut self,
        input: &TransitionConfigInput,
    ) -> Result<(), ConfigValidationError> {
        let violations = validate(input);
        if !violations.is_empty() {
            return Err(ConfigValidationError { violations });
        }
        let span = info_span!("transitions_update_config");
        let _entered = span.enter();
        let updated = self.config.overlaid(input);

        if updated.accessibility != self.config.accessibility {
            // Hot-swap in place.
            self.accessibility.update_config(updated.accessibility);
        }
        if updated.preload_strategy != self.config.preload_strategy {
            // Tear down the old trigger wiring, re-create against the new
            // strategy; the host re-registers its listener or observer to
            // match the effective strategy.
            let effective = self
                .preload
                .set_strategy(updated.preload_strategy, self.host.capabilities());
            info!("preload strategy now {effective:?}");
        }
        if updated.durations != self.config.durations
            || updated.accessibility != self.config.accessibility
        {
            self.apply_durations_for(updated.durations);
            self.accessibility
                .apply_reduced_motion(self.host.as_ref(), DURATION_PROPERTIES);
        }
        if updated.fallback_delay_ms != self.config.fallback_delay_ms
            || updated.max_transition_duration_ms != self.config.max_transition_duration_ms
        {
            self.fallback
                .update_timings(updated.fallback_delay(), updated.max_transition_duration());
        }
        if updated.enable_performance_metrics != self.config.enable_performance_metrics {
            self.metrics.set_enabled(updated.enable_performance_metrics);
        }
        self.config = updated;
        Ok(())
    }

    /// Read-only aggregate snapshot across all modules plus support flags.
    #[must_use]
    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            initialized: self.initialized,
            support: self.support,
            config: self.config.clone(),
            accessibility: self.accessibility.status(),
            fallback: self.fallback.status(),
            preload: self.preload.stats(),
            metrics: self.metrics.summary(),
        }
    }

    /// JSON diagnostics document: timestamp, full status, latest sample.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn export_diagnostics(&self) -> Result<String, Error> {
        let document = Diagnostics {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis() as u64)
                .unwrap_or(0),
            status: self.status(),
            latest_sample: self.metrics.latest().cloned(),
        };
        Ok(serde_json::to_string(&document)?)
    }

    /// Clear metrics history and the preload cache without unwiring.
    pub fn reset(&mut self) {
        self.metrics.clear();
        self.preload.clear_cache();
    }

    /// Remove CSS custom properties and all injected state, marking the
    /// instance uninitialized. Safe to call repeatedly and to re-init after.
    pub fn cleanup(&mut self) {
        self.host.remove_css_property(CSS_PROP_FAST);
        self.host.remove_css_property(CSS_PROP_NORMAL);
        self.host.remove_css_property(CSS_PROP_SLOW);
        self.accessibility.cleanup(self.host.as_ref());
        self.fallback.cleanup(self.host.as_ref());
        self.metrics.clear();
        self.initialized = false;
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub const fn config(&self) -> &TransitionConfig {
        &self.config
    }

    /// Preload manager view, mainly for status inspection.
    #[must_use]
    pub const fn preload(&self) -> &PreloadManager {
        &self.preload
    }

    pub(crate) fn host(&self) -> Arc<dyn HostPage> {
        Arc::clone(&self.host)
    }

    pub(crate) fn fetcher(&self) -> Arc<dyn Fetcher> {
        Arc::clone(&self.fetcher)
    }

    pub(crate) fn runtime_handle(&self) -> Handle {
        self.handle.clone()
    }
}

/// The three duration tokens, in tier order.
pub const DURATION_PROPERTIES: &[&str] = &[CSS_PROP_FAST, CSS_PROP_NORMAL, CSS_PROP_SLOW];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessibility::REDUCED_MOTION_CLASS;
    use crate::config::{DurationTokensInput, PreloadStrategy};
    use crate::fetch::HttpFetcher;
    use crate::host::mock::MockHost;
    use core::time::Duration;
    use std::sync::atomic::Ordering;
    use tokio::runtime::Runtime;

    fn orchestrator_with(
        host: Arc<MockHost>,
        runtime: &Runtime,
    ) -> TransitionOrchestrator {
        TransitionOrchestrator::new(
            TransitionConfig::default(),
            host,
            Arc::new(HttpFetcher),
            runtime.handle().clone(),
        )
    }

    #[test]
    fn init_writes_duration_tokens_and_is_idempotent() {
        let runtime = Runtime::new().unwrap();
        let host = Arc::new(MockHost::default());
        let mut orchestrator = orchestrator_with(Arc::clone(&host), &runtime);
        orchestrator.init();
        let first = host.properties.lock().unwrap().clone();
        assert_eq!(first.get(CSS_PROP_FAST), Some(&String::from("150ms")));
        assert_eq!(first.get(CSS_PROP_SLOW), Some(&String::from("600ms")));

        // Second init is a logged no-op; state is identical.
        orchestrator.init();
        assert_eq!(*host.properties.lock().unwrap(), first);
        assert!(orchestrator.is_initialized());
    }

    #[test]
    fn phases_before_init_are_ignored() {
        let runtime = Runtime::new().unwrap();
        let host = Arc::new(MockHost::default());
        let mut orchestrator = orchestrator_with(Arc::clone(&host), &runtime);
        orchestrator.handle_phase(TransitionPhase::BeforePreparation);
        orchestrator.handle_phase(TransitionPhase::AfterSwap);
        assert_eq!(orchestrator.status().metrics.sample_count, 0);
        assert!(host.announcement.lock().unwrap().is_none());
    }

    #[test]
    fn cleanup_removes_tokens_and_allows_reinit() {
        let runtime = Runtime::new().unwrap();
        let host = Arc::new(MockHost::default());
        let mut orchestrator = orchestrator_with(Arc::clone(&host), &runtime);
        orchestrator.init();
        orchestrator.cleanup();
        assert!(host.properties.lock().unwrap().is_empty());
        assert!(!orchestrator.is_initialized());
        orchestrator.cleanup();
        orchestrator.init();
        assert!(orchestrator.is_initialized());
        assert!(!host.properties.lock().unwrap().is_empty());
    }

    #[test]
    fn reduced_motion_preference_is_reprobed_each_transition() {
        let runtime = Runtime::new().unwrap();
        let host = Arc::new(MockHost::default());
        let mut orchestrator = orchestrator_with(Arc::clone(&host), &runtime);
        orchestrator.init();
        assert_eq!(
            host.properties.lock().unwrap().get(CSS_PROP_FAST),
            Some(&String::from("150ms"))
        );

        // The preference flips after init; the next navigation observes it.
        host.reduced_motion.store(true, Ordering::SeqCst);
        orchestrator.handle_phase(TransitionPhase::BeforePreparation);
        assert_eq!(
            host.properties.lock().unwrap().get(CSS_PROP_FAST),
            Some(&String::from("1ms"))
        );
        assert!(host.classes.lock().unwrap().contains(REDUCED_MOTION_CLASS));

        // It lifts again; the configured durations come back.
        host.reduced_motion.store(false, Ordering::SeqCst);
        orchestrator.handle_phase(TransitionPhase::BeforePreparation);
        assert_eq!(
            host.properties.lock().unwrap().get(CSS_PROP_FAST),
            Some(&String::from("150ms"))
        );
        assert!(!host.classes.lock().unwrap().contains(REDUCED_MOTION_CLASS));
    }

    #[test]
    fn update_config_rejects_invalid_input_without_applying() {
        let runtime = Runtime::new().unwrap();
        let host = Arc::new(MockHost::default());
        let mut orchestrator = orchestrator_with(host, &runtime);
        orchestrator.init();
        let before = orchestrator.config().clone();
        let bad = TransitionConfigInput {
            fallback_delay_ms: Some(99_999),
            preload_strategy: Some(PreloadStrategy::None),
            ..TransitionConfigInput::default()
        };
        let error = orchestrator.update_config(&bad).unwrap_err();
        assert_eq!(error.violations[0].code, "INVALID_FALLBACK_DELAY");
        assert_eq!(orchestrator.config(), &before);
    }

    #[test]
    fn changed_durations_are_reapplied_immediately() {
        let runtime = Runtime::new().unwrap();
        let host = Arc::new(MockHost::default());
        let mut orchestrator = orchestrator_with(Arc::clone(&host), &runtime);
        orchestrator.init();
        let input = TransitionConfigInput {
            durations: DurationTokensInput {
                fast_ms: Some(80),
                ..DurationTokensInput::default()
            },
            ..TransitionConfigInput::default()
        };
        orchestrator.update_config(&input).unwrap();
        assert_eq!(
            host.properties.lock().unwrap().get(CSS_PROP_FAST),
            Some(&String::from("80ms"))
        );
    }

    #[test]
    fn diagnostics_export_is_valid_json() {
        let runtime = Runtime::new().unwrap();
        let host = Arc::new(MockHost::default());
        let mut orchestrator = orchestrator_with(host, &runtime);
        orchestrator.init();
        let start = Instant::now();
        orchestrator.handle_phase_at(TransitionPhase::BeforePreparation, start);
        orchestrator.handle_phase_at(
            TransitionPhase::AfterSwap,
            start + Duration::from_millis(120),
        );
        let exported = orchestrator.export_diagnostics().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert!(parsed["timestamp_ms"].as_u64().is_some());
        assert_eq!(parsed["status"]["initialized"], true);
        assert_eq!(parsed["status"]["metrics"]["sample_count"], 1);
        assert_eq!(parsed["latest_sample"]["total_ms"], 120);
    }

    #[test]
    fn reset_clears_metrics_but_keeps_wiring() {
        let runtime = Runtime::new().unwrap();
        let host = Arc::new(MockHost::default());
        let mut orchestrator = orchestrator_with(host, &runtime);
        orchestrator.init();
        let start = Instant::now();
        orchestrator.handle_phase_at(TransitionPhase::BeforePreparation, start);
        orchestrator.handle_phase_at(TransitionPhase::AfterSwap, start);
        assert_eq!(orchestrator.status().metrics.sample_count, 1);
        orchestrator.reset();
        assert_eq!(orchestrator.status().metrics.sample_count, 0);
        assert!(orchestrator.is_initialized());
    }
}
