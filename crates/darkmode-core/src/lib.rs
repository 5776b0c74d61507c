//! darkmode-core - dark mode for web pages.
//!
//! Three cooperating parts share one key-value store:
//!
//! - [`stylesheet`]: turns a [`SettingsRecord`] into a dark stylesheet.
//! - [`agent`]: one [`PageAgent`] per page, injecting and removing the
//!   stylesheet and remembering the page's state.
//! - [`control`]: the popup, editing settings and sending apply instructions.
//!
//! [`tabs`] carries instructions from the popup to page agents.

pub mod agent;
pub mod config;
pub mod control;
pub mod document;
pub mod error;
pub mod logging;
pub mod message;
pub mod settings;
pub mod store;
pub mod stylesheet;
pub mod tabs;

pub use agent::{AgentState, LoadOutcome, PageAgent};
pub use config::{Config, ConfigLoadResult};
pub use control::{ApplyOutcome, ControlSurface, PopupForm, SaveOutcome};
pub use document::{Document, HtmlDocument, Location, STYLE_ELEMENT_ID};
pub use error::{Error, Result};
pub use message::{Request, Response};
pub use settings::{PageId, PageState, SettingsRecord, ThemeStyle};
pub use store::{JsonFileStore, MemoryStore, SettingsStore, Store};
pub use stylesheet::{DarkStylesheet, generate};
pub use tabs::{LocalTabs, TabId, Tabs};
