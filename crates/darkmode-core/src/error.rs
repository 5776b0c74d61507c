//! Error types for darkmode-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::tabs::TabId;

/// Errors produced by configuration loading, storage and page delivery.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration:\n  {}", .0.join("\n  "))]
    ConfigValidation(Vec<String>),

    /// The storage backend failed to read or write.
    #[error("storage error: {0}")]
    Store(String),

    /// No page agent is attached to the tab (content script not loaded).
    #[error("could not establish connection to tab {0}: receiving end does not exist")]
    NoReceiver(TabId),

    #[error("no active tab")]
    NoActivePage,

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
