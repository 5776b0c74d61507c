//! Messages exchanged between the popup and a page agent.
//!
//! Wire shapes:
//!
//! - `{"action": "applyDarkMode", "enabled": bool, "settings": {...}}`
//!   answered by `{"success": bool, "enabled": bool}`
//! - `{"action": "getState"}` answered by `{"enabled": bool, "settings": {...} | null}`

use serde::{Deserialize, Serialize};

use crate::settings::SettingsRecord;

/// Request sent to a page agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Apply (or remove) dark mode on the page.
    ApplyDarkMode {
        #[serde(default)]
        enabled: bool,
        /// Settings to apply; the agent loads the stored global settings when absent.
        #[serde(default)]
        settings: Option<SettingsRecord>,
    },
    /// Report the agent's in-memory state without touching storage.
    GetState,
}

/// Page agent reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Applied {
        success: bool,
        enabled: bool,
    },
    State {
        enabled: bool,
        settings: Option<SettingsRecord>,
    },
}

impl Response {
    /// The enabled flag carried by either reply.
    pub fn enabled(&self) -> bool {
        match self {
            Response::Applied { enabled, .. } | Response::State { enabled, .. } => *enabled,
        }
    }
}
