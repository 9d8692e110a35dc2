//! Accessibility behavior around soft navigations.
//!
//! Three independently toggleable behaviors: localized route-change
//! announcements through the host's live region, reduced-motion handling,
//! and focus preservation across the DOM swap. Timers (announcement
//! lifetime, focus settle delay) are deadlines compared on `tick_at`,
//! driven by the orchestrator from the host loop.

use crate::config::{AccessibilityConfig, Language};
use crate::host::HostPage;
use log::trace;
use serde::Serialize;
use std::time::{Duration, Instant};

/// How long an injected announcement stays in the live region.
pub const ANNOUNCEMENT_VISIBLE_MS: u64 = 1000;
/// Settle delay before focus restoration runs after a swap.
pub const FOCUS_SETTLE_MS: u64 = 50;
/// State class flagged on the document root while reduced motion is forced.
pub const REDUCED_MOTION_CLASS: &str = "transitions-reduced-motion";

/// Identity of the element to re-focus after a swap; consumed at most once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FocusSnapshot {
    /// Stable element id; the reliable path.
    Id(String),
    /// Tag name plus ordinal position among same-tag elements. Only correct
    /// if document order is unchanged across the swap.
    TagOrdinal { tag: String, index: usize },
}

/// Read-only accessibility state for status snapshots.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct AccessibilityStatus {
    pub announce_route_changes: bool,
    pub respect_reduced_motion: bool,
    pub language: Language,
    pub reduced_motion_active: bool,
}

/// Coordinates announcements, reduced motion, and focus preservation.
pub struct AccessibilityManager {
    config: AccessibilityConfig,
    /// When the current live-region message should be removed.
    announcement_expires: Option<Instant>,
    /// Snapshot waiting for the settle delay, with its due time.
    pending_focus: Option<(FocusSnapshot, Instant)>,
    reduced_motion_active: bool,
}

/// Announcement template map. Two languages only; adding more is a config
/// schema change, not a runtime concern.
fn announcement_for(language: Language, title: &str) -> String {
    match language {
        Language::De => format!("Navigiert zu {title}"),
        Language::En => format!("Navigated to {title}"),
    }
}

const fn language_code(language: Language) -> &'static str {
    match language {
        Language::De => "de",
        Language::En => "en",
    }
}

impl AccessibilityManager {
    #[must_use]
    pub const fn new(config: AccessibilityConfig) -> Self {
        Self {
            config,
            announcement_expires: None,
            pending_focus: None,
            reduced_motion_active: false,
        }
    }

    /// Hot-swap the accessibility configuration in place.
    pub fn update_config(&mut self, config: AccessibilityConfig) {
        self.config = config;
    }

    /// Probe the host's reduced-motion preference and apply it: force all
    /// duration tokens to 1 ms and flag the state class. Restoring the real
    /// durations when the preference lifts is the orchestrator's job.
    pub fn apply_reduced_motion(&mut self, host: &dyn HostPage, duration_properties: &[&str]) {
        let active = self.config.respect_reduced_motion && host.prefers_reduced_motion();
        if active {
            for property in duration_properties {
                host.set_css_property(property, "1ms");
            }
            host.add_class(REDUCED_MOTION_CLASS);
        } else if self.reduced_motion_active {
            host.remove_class(REDUCED_MOTION_CLASS);
        }
        self.reduced_motion_active = active;
    }

    /// Snapshot the active element just before the swap.
    pub fn on_before_swap_at(&mut self, now: Instant, host: &dyn HostPage) {
        let snapshot = host.active_element().map(|element| match element.id {
            Some(id) => FocusSnapshot::Id(id),
            None => FocusSnapshot::TagOrdinal {
                tag: element.tag_name,
                index: element.ordinal_index,
            },
        });
        self.pending_focus =
            snapshot.map(|snap| (snap, now + Duration::from_millis(FOCUS_SETTLE_MS)));
    }

    /// Announce the new page after the swap completed.
    pub fn on_after_swap_at(&mut self, now: Instant, host: &dyn HostPage) {
        if !self.config.announce_route_changes {
            return;
        }
        let language = self.config.route_announcement_language;
        let message = announcement_for(language, &host.page_title());
        host.announce(&message, language_code(language));
        // Fixed lifetime regardless of subsequent transitions.
        self.announcement_expires = Some(now + Duration::from_millis(ANNOUNCEMENT_VISIBLE_MS));
    }

    /// Drive the announcement lifetime and the focus settle delay.
    pub fn tick_at(&mut self, now: Instant, host: &dyn HostPage) {
        if let Some(expires) = self.announcement_expires
            && now >= expires
        {
            host.clear_announcement();
            self.announcement_expires = None;
        }
        let focus_due = matches!(self.pending_focus.as_ref(), Some((_, due)) if now >= *due);
        if focus_due
            && let Some((snapshot, _)) = self.pending_focus.take()
        {
            // Consumed exactly once, resolved or not.
            self.restore_focus(&snapshot, host);
        }
    }

    fn restore_focus(&self, snapshot: &FocusSnapshot, host: &dyn HostPage) {
        let resolved = match snapshot {
            FocusSnapshot::Id(id) => host.focus_by_id(id),
            FocusSnapshot::TagOrdinal { tag, index } => host.focus_by_tag_index(tag, *index),
        };
        if !resolved {
            // No explicit restoration; the host keeps whatever focus it has.
            trace!("focus restoration did not resolve for {snapshot:?}");
        }
    }

    #[must_use]
    pub const fn status(&self) -> AccessibilityStatus {
        AccessibilityStatus {
            announce_route_changes: self.config.announce_route_changes,
            respect_reduced_motion: self.config.respect_reduced_motion,
            language: self.config.route_announcement_language,
            reduced_motion_active: self.reduced_motion_active,
        }
    }

    /// Remove injected state from the host and drop pending work. Idempotent.
    pub fn cleanup(&mut self, host: &dyn HostPage) {
        host.clear_announcement();
        host.remove_class(REDUCED_MOTION_CLASS);
        self.announcement_expires = None;
        self.pending_focus = None;
        self.reduced_motion_active = false;
    }
}
