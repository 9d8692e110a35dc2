//! Configuration for the transition orchestrator.
//!
//! This module defines the fully-populated [`TransitionConfig`] value object,
//! the caller-facing partial [`TransitionConfigInput`], range validation with
//! per-field violation codes, and the deep merge of user values over
//! defaults. Construction is gated: a config that fails validation can never
//! reach the orchestrator.

use core::fmt;
use core::time::Duration;
use serde::Serialize;
use std::error::Error as StdError;

/// Link preload strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadStrategy {
    /// Prefetch when the pointer moves over a candidate link.
    Hover,
    /// Prefetch when a candidate link scrolls into the viewport.
    Visible,
    /// Preloading disabled.
    None,
}

/// Language for route-change announcements.
///
/// Only German and English are supported; this is a documented limitation of
/// the announcement template map, not something callers can extend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    De,
    En,
}

/// Duration tokens written as CSS custom properties, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DurationTokens {
    pub fast_ms: u64,
    pub normal_ms: u64,
    pub slow_ms: u64,
}

/// Accessibility behavior switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AccessibilityConfig {
    /// Honor the OS-level reduced-motion preference.
    pub respect_reduced_motion: bool,
    /// Announce route changes through an off-screen live region.
    pub announce_route_changes: bool,
    /// Language the announcement templates use.
    pub route_announcement_language: Language,
}

/// Immutable, fully-populated orchestrator configuration.
///
/// Values are guaranteed in range after construction: the only way to build
/// one from caller input is [`TransitionConfig::from_input`], which validates
/// first and fails closed on any violation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionConfig {
    /// Whether the metrics collector records timing samples.
    pub enable_performance_metrics: bool,
    /// Delay before the degraded-mode full-page reload, 0–5000 ms.
    pub fallback_delay_ms: u64,
    /// Time an armed transition may run before degraded mode, 100–3000 ms.
    pub max_transition_duration_ms: u64,
    pub preload_strategy: PreloadStrategy,
    pub durations: DurationTokens,
    /// Emit module-boundary failures at `debug!` instead of `trace!`.
    pub debug: bool,
    pub accessibility: AccessibilityConfig,
}

/// Partial duration overlay.
#[derive(Clone, Copy, Debug, Default)]
pub struct DurationTokensInput {
    pub fast_ms: Option<u64>,
    pub normal_ms: Option<u64>,
    pub slow_ms: Option<u64>,
}

/// Partial accessibility overlay.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessibilityConfigInput {
    pub respect_reduced_motion: Option<bool>,
    pub announce_route_changes: Option<bool>,
    pub route_announcement_language: Option<Language>,
}

/// Caller-supplied partial configuration; unset fields fall back to
/// defaults (on construction) or to the live values (on config update).
#[derive(Clone, Debug, Default)]
pub struct TransitionConfigInput {
    pub enable_performance_metrics: Option<bool>,
    pub fallback_delay_ms: Option<u64>,
    pub max_transition_duration_ms: Option<u64>,
    pub preload_strategy: Option<PreloadStrategy>,
    pub durations: DurationTokensInput,
    pub debug: Option<bool>,
    pub accessibility: AccessibilityConfigInput,
}

/// One validation failure; `code` names the violated field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigViolation {
    pub field: &'static str,
    pub message: String,
    pub code: &'static str,
}

/// Aggregate validation failure enumerating every violation.
///
/// Raised before any part of an invalid configuration is applied.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub violations: Vec<ConfigViolation>,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "invalid transition configuration ({} violation(s))",
            self.violations.len()
        )?;
        for violation in &self.violations {
            write!(formatter, "; {}: {}", violation.code, violation.message)?;
        }
        Ok(())
    }
}

impl StdError for ConfigValidationError {}

/// Documented range for `fallback_delay_ms`.
pub const FALLBACK_DELAY_RANGE: (u64, u64) = (0, 5000);
/// Documented range for `max_transition_duration_ms`.
pub const MAX_TRANSITION_DURATION_RANGE: (u64, u64) = (100, 3000);
/// Documented range for the fast duration tier.
pub const DURATION_FAST_RANGE: (u64, u64) = (50, 500);
/// Documented range for the normal duration tier.
pub const DURATION_NORMAL_RANGE: (u64, u64) = (100, 1000);
/// Documented range for the slow duration tier.
pub const DURATION_SLOW_RANGE: (u64, u64) = (200, 2000);

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            enable_performance_metrics: true,
            fallback_delay_ms: 300,
            max_transition_duration_ms: 1000,
            preload_strategy: PreloadStrategy::Hover,
            durations: DurationTokens {
                fast_ms: 150,
                normal_ms: 300,
                slow_ms: 600,
            },
            debug: false,
            accessibility: AccessibilityConfig {
                respect_reduced_motion: true,
                announce_route_changes: true,
                route_announcement_language: Language::En,
            },
        }
    }
}

fn check_range(
    violations: &mut Vec<ConfigViolation>,
    value: Option<u64>,
    (min, max): (u64, u64),
    field: &'static str,
    code: &'static str,
) {
    if let Some(value) = value
        && !(min..=max).contains(&value)
    {
        violations.push(ConfigViolation {
            field,
            message: format!("{field} must be between {min} and {max}, got {value}"),
            code,
        });
    }
}

/// Validate a partial configuration against the documented numeric ranges.
///
/// Returns one violation per out-of-range field; an empty vector means the
/// input is safe to merge. Enum fields (`preload_strategy`, announcement
/// language) are strongly typed and cannot be out of range.
#[must_use]
pub fn validate(input: &TransitionConfigInput) -> Vec<ConfigViolation> {
    let mut violations = Vec::new();
    check_range(
        &mut violations,
        input.fallback_delay_ms,
        FALLBACK_DELAY_RANGE,
        "fallback_delay_ms",
        "INVALID_FALLBACK_DELAY",
    );
    check_range(
        &mut violations,
        input.max_transition_duration_ms,
        MAX_TRANSITION_DURATION_RANGE,
        "max_transition_duration_ms",
        "INVALID_MAX_TRANSITION_DURATION",
    );
    check_range(
        &mut violations,
        input.durations.fast_ms,
        DURATION_FAST_RANGE,
        "durations.fast_ms",
        "INVALID_DURATION_FAST",
    );
    check_range(
        &mut violations,
        input.durations.normal_ms,
        DURATION_NORMAL_RANGE,
        "durations.normal_ms",
        "INVALID_DURATION_NORMAL",
    );
    check_range(
        &mut violations,
        input.durations.slow_ms,
        DURATION_SLOW_RANGE,
        "durations.slow_ms",
        "INVALID_DURATION_SLOW",
    );
    violations
}

/// Deep-overlay a partial configuration onto defaults, field by field.
#[must_use]
pub fn merge(input: &TransitionConfigInput) -> TransitionConfig {
    TransitionConfig::default().overlaid(input)
}

impl TransitionConfig {
    /// Validate, then merge over defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigValidationError`] enumerating every violation if any
    /// numeric field is out of its documented range. Nothing is applied on
    /// failure.
    pub fn from_input(input: &TransitionConfigInput) -> Result<Self, ConfigValidationError> {
        let violations = validate(input);
        if violations.is_empty() {
            Ok(merge(input))
        } else {
            Err(ConfigValidationError { violations })
        }
    }

    /// Overlay a partial input onto this configuration, including nested
    /// duration and accessibility fields. Unset fields keep their current
    /// values.
    #[must_use]
    pub fn overlaid(&self, input: &TransitionConfigInput) -> Self {
        Self {
            enable_performance_metrics: input
                .enable_performance_metrics
                .unwrap_or(self.enable_performance_metrics),
            fallback_delay_ms: input.fallback_delay_ms.unwrap_or(self.fallback_delay_ms),
            max_transition_duration_ms: input
                .max_transition_duration_ms
                .unwrap_or(self.max_transition_duration_ms),
            preload_strategy: input.preload_strategy.unwrap_or(self.preload_strategy),
            durations: DurationTokens {
                fast_ms: input.durations.fast_ms.unwrap_or(self.durations.fast_ms),
                normal_ms: input
                    .durations
                    .normal_ms
                    .unwrap_or(self.durations.normal_ms),
                slow_ms: input.durations.slow_ms.unwrap_or(self.durations.slow_ms),
            },
            debug: input.debug.unwrap_or(self.debug),
            accessibility: AccessibilityConfig {
                respect_reduced_motion: input
                    .accessibility
                    .respect_reduced_motion
                    .unwrap_or(self.accessibility.respect_reduced_motion),
                announce_route_changes: input
                    .accessibility
                    .announce_route_changes
                    .unwrap_or(self.accessibility.announce_route_changes),
                route_announcement_language: input
                    .accessibility
                    .route_announcement_language
                    .unwrap_or(self.accessibility.route_announcement_language),
            },
        }
    }

    /// Delay before the degraded-mode reload as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    /// Maximum transition duration as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn max_transition_duration(&self) -> Duration {
        Duration::from_millis(self.max_transition_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_range() {
        assert!(validate(&TransitionConfigInput::default()).is_empty());
        let config = TransitionConfig::default();
        assert!(config.fallback_delay_ms <= FALLBACK_DELAY_RANGE.1);
        assert!(config.max_transition_duration_ms >= MAX_TRANSITION_DURATION_RANGE.0);
    }

    #[test]
    fn user_fields_take_precedence_over_defaults() {
        let input = TransitionConfigInput {
            fallback_delay_ms: Some(500),
            preload_strategy: Some(PreloadStrategy::Visible),
            durations: DurationTokensInput {
                fast_ms: Some(100),
                ..DurationTokensInput::default()
            },
            accessibility: AccessibilityConfigInput {
                route_announcement_language: Some(Language::De),
                ..AccessibilityConfigInput::default()
            },
            ..TransitionConfigInput::default()
        };
        let merged = merge(&input);
        assert_eq!(merged.fallback_delay_ms, 500);
        assert_eq!(merged.preload_strategy, PreloadStrategy::Visible);
        assert_eq!(merged.durations.fast_ms, 100);
        // Unset nested fields keep the defaults.
        assert_eq!(
            merged.durations.normal_ms,
            TransitionConfig::default().durations.normal_ms
        );
        assert_eq!(
            merged.accessibility.route_announcement_language,
            Language::De
        );
        assert!(merged.accessibility.respect_reduced_motion);
    }

    #[test]
    fn out_of_range_fallback_delay_is_coded() {
        let input = TransitionConfigInput {
            fallback_delay_ms: Some(99_999),
            ..TransitionConfigInput::default()
        };
        let violations = validate(&input);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, "INVALID_FALLBACK_DELAY");
        assert_eq!(violations[0].field, "fallback_delay_ms");
    }

    #[test]
    fn every_bad_field_is_reported_at_once() {
        let input = TransitionConfigInput {
            fallback_delay_ms: Some(6000),
            max_transition_duration_ms: Some(50),
            durations: DurationTokensInput {
                fast_ms: Some(1),
                normal_ms: Some(5000),
                slow_ms: Some(10),
            },
            ..TransitionConfigInput::default()
        };
        let violations = validate(&input);
        assert_eq!(violations.len(), 5);
        let error = TransitionConfig::from_input(&input).unwrap_err();
        let rendered = error.to_string();
        assert!(rendered.contains("INVALID_MAX_TRANSITION_DURATION"));
        assert!(rendered.contains("INVALID_DURATION_SLOW"));
    }

    #[test]
    fn from_input_is_all_or_nothing() {
        let bad = TransitionConfigInput {
            fallback_delay_ms: Some(100),
            max_transition_duration_ms: Some(1),
            ..TransitionConfigInput::default()
        };
        // The valid fallback_delay_ms must not leak out of a failed build.
        assert!(TransitionConfig::from_input(&bad).is_err());
        let good = TransitionConfigInput {
            fallback_delay_ms: Some(100),
            ..TransitionConfigInput::default()
        };
        let config = TransitionConfig::from_input(&good).unwrap();
        assert_eq!(config.fallback_delay_ms, 100);
    }
}
