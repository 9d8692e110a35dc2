//! Explicit instance management for the orchestrator.
//!
//! The registry is an ordinary value owned by the embedding application —
//! there is no process-global slot. It enforces the single-live-instance
//! rule: `init` refuses to replace an existing instance, and
//! `reinit` (cleanup-then-init) is the only path that swaps configuration
//! wholesale.

use crate::config::TransitionConfig;
use crate::fetch::Fetcher;
use crate::host::HostPage;
use crate::orchestrator::TransitionOrchestrator;
use crate::TransitionConfigInput;
use anyhow::{bail, Error};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Holds at most one live [`TransitionOrchestrator`].
#[derive(Default)]
pub struct TransitionRegistry {
    instance: Option<TransitionOrchestrator>,
}

impl TransitionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { instance: None }
    }

    /// Validate, merge, construct, init, and store the instance.
    ///
    /// # Errors
    ///
    /// Fails if an instance is already live (callers must tear down first —
    /// no implicit replacement) or if the configuration is invalid, in which
    /// case nothing is constructed.
    pub fn init(
        &mut self,
        input: &TransitionConfigInput,
        host: Arc<dyn HostPage>,
        fetcher: Arc<dyn Fetcher>,
        handle: Handle,
    ) -> Result<&mut TransitionOrchestrator, Error> {
        if self.instance.is_some() {
            bail!("a transition orchestrator is already live; call teardown() first");
        }
        let config = TransitionConfig::from_input(input)?;
        let mut orchestrator = TransitionOrchestrator::new(config, host, fetcher, handle);
        orchestrator.init();
        Ok(self.instance.insert(orchestrator))
    }

    /// Cleanup-then-init against the live instance's host, fetcher, and
    /// runtime handle: the only safe way to swap configuration globally.
    ///
    /// # Errors
    ///
    /// Fails if no instance is live or if the new configuration is invalid.
    /// On invalid configuration the old instance has already been cleaned
    /// up and removed (fail-closed, matching fresh init semantics).
    pub fn reinit(
        &mut self,
        input: &TransitionConfigInput,
    ) -> Result<&mut TransitionOrchestrator, Error> {
        let Some(mut old) = self.instance.take() else {
            bail!("no transition orchestrator to reinit; call init() first");
        };
        old.cleanup();
        let host = old.host();
        let fetcher = old.fetcher();
        let handle = old.runtime_handle();
        drop(old);
        self.init(input, host, fetcher, handle)
    }

    /// Read-only accessor; `None` if never initialized (or torn down).
    #[must_use]
    pub const fn instance(&self) -> Option<&TransitionOrchestrator> {
        self.instance.as_ref()
    }

    /// Mutable accessor for phase dispatch and ticks.
    pub const fn instance_mut(&mut self) -> Option<&mut TransitionOrchestrator> {
        self.instance.as_mut()
    }

    /// Clean up and drop the live instance. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(mut orchestrator) = self.instance.take() {
            orchestrator.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DurationTokensInput, PreloadStrategy};
    use crate::fetch::HttpFetcher;
    use crate::host::mock::MockHost;
    use crate::orchestrator::CSS_PROP_FAST;
    use tokio::runtime::Runtime;

    fn parts() -> (Arc<MockHost>, Arc<dyn Fetcher>) {
        (Arc::new(MockHost::default()), Arc::new(HttpFetcher))
    }

    #[test]
    fn init_refuses_to_replace_a_live_instance() {
        let runtime = Runtime::new().unwrap();
        let (host, fetcher) = parts();
        let mut registry = TransitionRegistry::new();
        registry
            .init(
                &TransitionConfigInput::default(),
                Arc::clone(&host) as Arc<dyn HostPage>,
                Arc::clone(&fetcher),
                runtime.handle().clone(),
            )
            .unwrap();
        let error = registry
            .init(
                &TransitionConfigInput::default(),
                host as Arc<dyn HostPage>,
                fetcher,
                runtime.handle().clone(),
            )
            .err()
            .unwrap();
        assert!(error.to_string().contains("already live"));
        assert!(registry.instance().is_some());
    }

    #[test]
    fn invalid_config_constructs_nothing() {
        let runtime = Runtime::new().unwrap();
        let (host, fetcher) = parts();
        let mut registry = TransitionRegistry::new();
        let bad = TransitionConfigInput {
            max_transition_duration_ms: Some(7),
            ..TransitionConfigInput::default()
        };
        assert!(registry
            .init(
                &bad,
                host as Arc<dyn HostPage>,
                fetcher,
                runtime.handle().clone()
            )
            .is_err());
        assert!(registry.instance().is_none());
    }

    #[test]
    fn reinit_swaps_configuration_through_cleanup() {
        let runtime = Runtime::new().unwrap();
        let (host, fetcher) = parts();
        let mut registry = TransitionRegistry::new();
        registry
            .init(
                &TransitionConfigInput::default(),
                Arc::clone(&host) as Arc<dyn HostPage>,
                fetcher,
                runtime.handle().clone(),
            )
            .unwrap();
        let updated = registry
            .reinit(&TransitionConfigInput {
                preload_strategy: Some(PreloadStrategy::None),
                durations: DurationTokensInput {
                    fast_ms: Some(90),
                    ..DurationTokensInput::default()
                },
                ..TransitionConfigInput::default()
            })
            .unwrap();
        assert_eq!(updated.config().preload_strategy, PreloadStrategy::None);
        assert_eq!(
            host.properties.lock().unwrap().get(CSS_PROP_FAST),
            Some(&String::from("90ms"))
        );
    }

    #[test]
    fn teardown_is_idempotent_and_clears_the_slot() {
        let runtime = Runtime::new().unwrap();
        let (host, fetcher) = parts();
        let mut registry = TransitionRegistry::new();
        registry
            .init(
                &TransitionConfigInput::default(),
                Arc::clone(&host) as Arc<dyn HostPage>,
                fetcher,
                runtime.handle().clone(),
            )
            .unwrap();
        registry.teardown();
        registry.teardown();
        assert!(registry.instance().is_none());
        assert!(host.properties.lock().unwrap().is_empty());
    }
}
