//! Control surface (popup).
//!
//! Edits the settings form, sends apply instructions to the active page and
//! saves the global defaults. Errors never escape: every failure is logged
//! and reported as an outcome the caller can show or ignore.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::ControlConfig;
use crate::error::Error;
use crate::message::{Request, Response};
use crate::settings::SettingsRecord;
use crate::store::{SettingsStore, Store};
use crate::tabs::{TabId, Tabs};

/// Confirmation label shown on the save button after a successful save.
pub const SAVED_LABEL: &str = "Saved!";

/// How long the save confirmation stays visible.
pub const SAVED_LABEL_DURATION: Duration = Duration::from_millis(1500);

/// Delay before the popup closes after a delivered apply.
pub const CLOSE_DELAY: Duration = Duration::from_millis(500);

/// The popup's form state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PopupForm {
    /// The dark mode toggle.
    pub enabled: bool,
    pub settings: SettingsRecord,
}

impl PopupForm {
    pub fn darkness_label(&self) -> String {
        format!("{}%", self.settings.darkness_level)
    }

    pub fn contrast_label(&self) -> String {
        format!("{}%", self.settings.contrast)
    }

    /// Settings as sent and saved, stamped with the current time.
    pub fn to_settings(&self) -> SettingsRecord {
        self.settings.stamped()
    }
}

/// Result of the Apply action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The page's agent acknowledged the instruction.
    Applied(Response),
    /// The page had no agent; one was provisioned and acknowledged the retry.
    AppliedAfterProvision(Response),
    /// Delivery failed, including after provisioning.
    Failed,
    /// There is no page to apply to.
    NoActivePage,
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Applied(_) | ApplyOutcome::AppliedAfterProvision(_)
        )
    }

    /// When the popup should close, if at all.
    pub fn close_after(&self) -> Option<Duration> {
        self.is_applied().then_some(CLOSE_DELAY)
    }
}

/// Result of the Save action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved {
        label: &'static str,
        duration: Duration,
    },
    Failed,
}

/// The popup, wired to storage and to the open pages.
pub struct ControlSurface<S, T> {
    store: SettingsStore<S>,
    tabs: T,
    config: ControlConfig,
}

impl<S: Store, T: Tabs> ControlSurface<S, T> {
    pub fn new(store: SettingsStore<S>, tabs: T, config: ControlConfig) -> Self {
        Self {
            store,
            tabs,
            config,
        }
    }

    pub fn tabs(&self) -> &T {
        &self.tabs
    }

    pub fn store(&self) -> &SettingsStore<S> {
        &self.store
    }

    /// Populate the form from the stored globals.
    ///
    /// Fields never saved keep their defaults. A storage failure is logged
    /// and yields the default form.
    pub fn open(&self) -> PopupForm {
        let mut form = PopupForm::default();

        let snapshot = match self.store.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Error loading settings: {}", e);
                return form;
            }
        };

        if let Some(settings) = snapshot.settings {
            form.settings = settings;
        }
        if let Some(enabled) = snapshot.enabled {
            form.enabled = enabled;
        }
        debug!(
            "Popup opened: enabled={}, theme={}",
            form.enabled, form.settings.theme_style
        );
        form
    }

    /// Send the form to the active page.
    ///
    /// When the page has no agent, one is provisioned and the instruction is
    /// sent again, exactly once.
    pub fn apply(&self, form: &PopupForm) -> ApplyOutcome {
        let request = Request::ApplyDarkMode {
            enabled: form.enabled,
            settings: Some(form.to_settings()),
        };

        let tab = match self.tabs.active_tab() {
            Ok(tab) => tab,
            Err(e) => {
                warn!("Error getting active tab: {}", e);
                return ApplyOutcome::NoActivePage;
            }
        };

        match self.tabs.send(tab, request.clone()) {
            Ok(response) => {
                info!("Dark mode applied to tab {}: {:?}", tab, response);
                ApplyOutcome::Applied(response)
            }
            Err(Error::NoReceiver(_)) if self.config.provision_on_missing_agent => {
                warn!("No agent in tab {}, provisioning one", tab);
                self.provision_and_retry(tab, request)
            }
            Err(e) => {
                error!("Error applying dark mode: {}", e);
                ApplyOutcome::Failed
            }
        }
    }

    fn provision_and_retry(&self, tab: TabId, request: Request) -> ApplyOutcome {
        let retried = self
            .tabs
            .provision(tab)
            .and_then(|()| self.tabs.send(tab, request));

        match retried {
            Ok(response) => {
                info!("Dark mode applied to tab {} after provisioning", tab);
                ApplyOutcome::AppliedAfterProvision(response)
            }
            Err(e) => {
                error!("Failed to provision agent for tab {}: {}", tab, e);
                ApplyOutcome::Failed
            }
        }
    }

    /// Save the form as the global settings and toggle.
    ///
    /// Independent of Apply: an unchecked toggle still saves the settings.
    pub fn save(&self, form: &PopupForm) -> SaveOutcome {
        match self.store.save_globals(&form.to_settings(), form.enabled) {
            Ok(()) => {
                info!("Settings saved");
                SaveOutcome::Saved {
                    label: SAVED_LABEL,
                    duration: SAVED_LABEL_DURATION,
                }
            }
            Err(e) => {
                error!("Error saving settings: {}", e);
                SaveOutcome::Failed
            }
        }
    }
}
