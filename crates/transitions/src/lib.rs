//! Soft-navigation transition orchestration for multi-page sites.
//!
//! This crate coordinates accessibility behavior, timing instrumentation,
//! link preloading, and failure recovery around a host page's native
//! soft-navigation (DOM swap) lifecycle. All page effects go through the
//! [`host::HostPage`] trait; the embedder's router feeds the four-phase
//! lifecycle in as [`TransitionPhase`] values and drives deadline timers by
//! calling [`orchestrator::TransitionOrchestrator::tick`] from its loop.

pub mod accessibility;
pub mod config;
pub mod fallback;
/// Fetch abstraction for preload GETs (reqwest-backed by default)
pub mod fetch;
pub mod host;
pub mod metrics;
pub mod orchestrator;
pub mod preload;
pub mod registry;

pub use config::{PreloadStrategy, TransitionConfig, TransitionConfigInput};
pub use host::HostPage;
pub use orchestrator::{TransitionOrchestrator, TransitionPhase};
pub use registry::TransitionRegistry;
