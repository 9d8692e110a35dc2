//! Abstraction over the hosting page.
//!
//! Every effect the orchestrator has on the page — CSS custom properties,
//! state classes, the live region, focus, the scheduled reload — goes
//! through [`HostPage`]. The embedder implements it once for its rendering
//! surface; tests implement it with a recording mock. Lifecycle events flow
//! the other way: the embedder's router calls into the orchestrator, so no
//! concrete event names leak into this crate.

use core::time::Duration;
use serde::Serialize;
use url::Url;

/// Capability flags reported by the host, probed once at init.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct BrowserCapabilities {
    /// The native soft-navigation transition API object exists.
    pub view_transition_api: bool,
    /// The transition start function is present and callable.
    pub start_callable: bool,
    /// The page styles understand the transition CSS feature.
    pub css_view_transitions: bool,
    /// Viewport intersection observation is available (drives the
    /// `Visible` preload strategy; without it the manager falls back to
    /// `Hover`).
    pub intersection_observer: bool,
}

/// Snapshot of the currently focused element, taken just before a swap.
#[derive(Clone, Debug)]
pub struct ActiveElement {
    /// Stable element id, if the element has one.
    pub id: Option<String>,
    /// Lowercase tag name, the fallback identity.
    pub tag_name: String,
    /// Position among same-tag elements in document order.
    pub ordinal_index: usize,
}

/// A link the host considers a preload candidate.
#[derive(Clone, Debug)]
pub struct LinkCandidate {
    /// The anchor's href as written in the document (may be relative).
    pub href: String,
    /// The author opted this link out of preloading.
    pub opted_out: bool,
}

/// The page surface the orchestrator drives.
///
/// Methods take `&self`; implementations are expected to use interior
/// mutability, since the orchestrator and any recording test double share
/// the host behind an `Arc`. All methods are best-effort: hosts must not
/// panic, and failures stay on the host side (progressive enhancement).
pub trait HostPage {
    /// Write a CSS custom property on the document root.
    fn set_css_property(&self, name: &str, value: &str);
    /// Remove a CSS custom property from the document root.
    fn remove_css_property(&self, name: &str);
    /// Add a state class to the document root.
    fn add_class(&self, class: &str);
    /// Remove a state class from the document root.
    fn remove_class(&self, class: &str);

    /// Title of the page currently displayed.
    fn page_title(&self) -> String;
    /// URL of the page currently displayed.
    fn current_url(&self) -> Url;

    /// Inject (or replace) the off-screen live region with a message.
    /// The region is polite and atomic.
    fn announce(&self, message: &str, lang: &str);
    /// Remove the live region, if present.
    fn clear_announcement(&self);

    /// Describe the currently focused element, if any.
    fn active_element(&self) -> Option<ActiveElement>;
    /// Focus the element with the given id. Returns whether it resolved.
    fn focus_by_id(&self, id: &str) -> bool;
    /// Focus the nth element with the given tag name in document order.
    /// Returns whether it resolved.
    fn focus_by_tag_index(&self, tag: &str, index: usize) -> bool;

    /// Whether the OS-level reduced-motion preference is active.
    fn prefers_reduced_motion(&self) -> bool;

    /// Schedule a full reload of the current URL after `delay`. The reload
    /// supersedes all in-flight work; it is the recovery of last resort.
    fn schedule_reload(&self, delay: Duration);

    /// Report the host's capability flags.
    fn capabilities(&self) -> BrowserCapabilities;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::{ActiveElement, BrowserCapabilities, HostPage};
    use core::time::Duration;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use url::Url;

    /// Recording host double used by the unit tests in this crate.
    pub struct MockHost {
        pub properties: Mutex<BTreeMap<String, String>>,
        pub classes: Mutex<BTreeSet<String>>,
        pub announcement: Mutex<Option<(String, String)>>,
        pub focused: Mutex<Vec<String>>,
        pub scheduled_reload: Mutex<Option<Duration>>,
        pub title: String,
        pub url: Url,
        /// Atomic so tests can flip the preference behind the shared `Arc`.
        pub reduced_motion: AtomicBool,
        pub active: Option<ActiveElement>,
        pub capabilities: BrowserCapabilities,
    }

    impl Default for MockHost {
        fn default() -> Self {
            Self {
                properties: Mutex::new(BTreeMap::new()),
                classes: Mutex::new(BTreeSet::new()),
                announcement: Mutex::new(None),
                focused: Mutex::new(Vec::new()),
                scheduled_reload: Mutex::new(None),
                title: String::from("Example Page"),
                url: Url::parse("https://example.test/start").unwrap(),
                reduced_motion: AtomicBool::new(false),
                active: None,
                capabilities: BrowserCapabilities {
                    view_transition_api: true,
                    start_callable: true,
                    css_view_transitions: true,
                    intersection_observer: true,
                },
            }
        }
    }

    impl HostPage for MockHost {
        fn set_css_property(&self, name: &str, value: &str) {
            self.properties
                .lock()
                .unwrap()
                .insert(name.to_owned(), value.to_owned());
        }

        fn remove_css_property(&self, name: &str) {
            self.properties.lock().unwrap().remove(name);
        }

        fn add_class(&self, class: &str) {
            self.classes.lock().unwrap().insert(class.to_owned());
        }

        fn remove_class(&self, class: &str) {
            self.classes.lock().unwrap().remove(class);
        }

        fn page_title(&self) -> String {
            self.title.clone()
        }

        fn current_url(&self) -> Url {
            self.url.clone()
        }

        fn announce(&self, message: &str, lang: &str) {
            *self.announcement.lock().unwrap() = Some((message.to_owned(), lang.to_owned()));
        }

        fn clear_announcement(&self) {
            *self.announcement.lock().unwrap() = None;
        }

        fn active_element(&self) -> Option<ActiveElement> {
            self.active.clone()
        }

        fn focus_by_id(&self, id: &str) -> bool {
            self.focused.lock().unwrap().push(format!("#{id}"));
            true
        }

        fn focus_by_tag_index(&self, tag: &str, index: usize) -> bool {
            self.focused.lock().unwrap().push(format!("{tag}[{index}]"));
            true
        }

        fn prefers_reduced_motion(&self) -> bool {
            self.reduced_motion.load(Ordering::SeqCst)
        }

        fn schedule_reload(&self, delay: Duration) {
            *self.scheduled_reload.lock().unwrap() = Some(delay);
        }

        fn capabilities(&self) -> BrowserCapabilities {
            self.capabilities
        }
    }
}
