//! Per-page agent.
//!
//! One `PageAgent` lives for the lifetime of a page. It owns the page's
//! in-memory dark mode state and is the only thing that mutates the
//! document's injected style element.
//!
//! ## States
//!
//! - `Inactive`: no injected style element.
//! - `Active`: exactly one style element with id [`STYLE_ELEMENT_ID`].
//!
//! Apply instructions always remove the old element before injecting a new
//! one, so repeated applies never stack elements.
//!
//! ## Failures
//!
//! Storage failures are logged and never reach the caller: the popup always
//! gets an acknowledgement. A failed load or save leaves the current state as
//! it was. An apply that needs the stored settings and cannot read them has
//! already removed the old style, and leaves the page `Inactive`.

use tracing::{debug, error, info};

use crate::document::{Document, STYLE_ELEMENT_ID};
use crate::message::{Request, Response};
use crate::settings::{PageId, PageState, SettingsRecord};
use crate::store::{SettingsStore, Store};
use crate::stylesheet;

/// Whether the page currently carries the injected style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Inactive,
    Active,
}

/// Result of [`PageAgent::on_load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The document cannot be mutated yet; call again once it is ready.
    Deferred,
    /// Load already ran for this agent.
    AlreadyLoaded,
    /// Re-applied from this page's stored state.
    RestoredPage,
    /// Applied because the global toggle is on.
    AppliedGlobal,
    /// Nothing to apply.
    Inactive,
    /// Storage could not be read; state left unchanged.
    Failed,
}

/// Dark mode agent for a single page.
pub struct PageAgent<D, S> {
    document: D,
    store: SettingsStore<S>,
    page_id: PageId,
    enabled: bool,
    settings: Option<SettingsRecord>,
    loaded: bool,
}

impl<D: Document, S: Store> PageAgent<D, S> {
    pub fn new(document: D, store: SettingsStore<S>) -> Self {
        let page_id = PageId::from(document.location());
        Self {
            document,
            store,
            page_id,
            enabled: false,
            settings: None,
            loaded: false,
        }
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    /// In-memory enabled flag (last instruction or restored state).
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn settings(&self) -> Option<&SettingsRecord> {
        self.settings.as_ref()
    }

    pub fn state(&self) -> AgentState {
        if self.document.count_elements(STYLE_ELEMENT_ID) > 0 {
            AgentState::Active
        } else {
            AgentState::Inactive
        }
    }

    /// Dispatch a popup request.
    pub fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::ApplyDarkMode { enabled, settings } => self.apply(enabled, settings),
            Request::GetState => self.query(),
        }
    }

    /// Apply or remove dark mode, then persist this page's state.
    ///
    /// When enabling without settings, the stored global settings are used.
    /// The old style element is removed first, so if those cannot be read
    /// the page ends up without dark mode and without settings.
    pub fn apply(&mut self, enabled: bool, settings: Option<SettingsRecord>) -> Response {
        debug!(
            "Apply instruction for {}: enabled={}, settings={}",
            self.page_id,
            enabled,
            if settings.is_some() { "given" } else { "absent" }
        );

        self.enabled = enabled;
        self.deactivate();

        self.settings = if enabled {
            settings.or_else(|| self.load_global_settings())
        } else {
            settings
        };

        if enabled {
            if let Some(settings) = self.settings.clone() {
                self.activate(&settings);
            }
        }

        self.persist();

        Response::Applied {
            success: true,
            enabled: self.enabled,
        }
    }

    /// Current in-memory state. Does not read storage.
    pub fn query(&self) -> Response {
        Response::State {
            enabled: self.enabled,
            settings: self.settings.clone(),
        }
    }

    /// Restore dark mode on page load.
    ///
    /// A stored enabled state for this page wins (with its own settings
    /// snapshot, falling back to the global settings); otherwise the global
    /// toggle decides. Runs once per agent; calls before the document is
    /// ready are deferred and do not count.
    pub fn on_load(&mut self) -> LoadOutcome {
        if self.loaded {
            debug!("Load already ran for {}", self.page_id);
            return LoadOutcome::AlreadyLoaded;
        }
        if !self.document.is_ready() {
            debug!("Document for {} not ready, deferring load", self.page_id);
            return LoadOutcome::Deferred;
        }
        self.loaded = true;

        let snapshot = match self.store.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Error initializing dark mode for {}: {}", self.page_id, e);
                return LoadOutcome::Failed;
            }
        };

        if let Some(page) = snapshot.page_state(&self.page_id).filter(|page| page.enabled) {
            let settings = page
                .settings
                .or_else(|| snapshot.settings.clone())
                .unwrap_or_default();
            self.enabled = true;
            self.settings = Some(settings.clone());
            self.activate(&settings);
            info!("Restored dark mode for {}", self.page_id);
            LoadOutcome::RestoredPage
        } else if snapshot.enabled == Some(true) {
            let settings = snapshot.settings_or_default();
            self.enabled = true;
            self.settings = Some(settings.clone());
            self.activate(&settings);
            info!("Applied global dark mode to {}", self.page_id);
            LoadOutcome::AppliedGlobal
        } else {
            debug!("Dark mode not enabled for {}", self.page_id);
            LoadOutcome::Inactive
        }
    }

    fn activate(&mut self, settings: &SettingsRecord) {
        self.deactivate();
        let css = stylesheet::generate(settings);
        self.document.append_style_to_head(STYLE_ELEMENT_ID, &css);
        debug!("Injected style element into {}", self.page_id);
    }

    fn deactivate(&mut self) {
        if self.document.remove_element(STYLE_ELEMENT_ID) {
            debug!("Removed style element from {}", self.page_id);
        }
    }

    fn load_global_settings(&self) -> Option<SettingsRecord> {
        match self.store.global_settings() {
            Ok(settings) => Some(settings),
            Err(e) => {
                error!("Error loading settings: {}", e);
                None
            }
        }
    }

    fn persist(&self) {
        let state = PageState {
            enabled: self.enabled,
            settings: self.settings.clone(),
            url: self.document.location().href().to_string(),
        };

        if let Err(e) = self.store.put_page_state(&self.page_id, &state) {
            error!("Error saving page state for {}: {}", self.page_id, e);
        }
    }
}
