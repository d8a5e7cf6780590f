//! Thin command surface for UI collaborators.
//!
//! Each command is a single request/response pair against the storage
//! collaborator, dispatched through one exhaustive match so a new request
//! kind cannot be silently left unhandled.

use serde::{Deserialize, Serialize};

use crate::store::{self, KeyValueStore, Result};
use crate::unit::ContentKind;

/// Requests from the UI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum CommandRequest {
    /// Flips a kind's filter on or off.
    ToggleFilter {
        /// Which filter to flip.
        kind: ContentKind,
    },
    /// Sets a kind's strictness percentage (clamped to 100).
    SetStrictness {
        /// Which filter to adjust.
        kind: ContentKind,
        /// New strictness in [0, 100].
        strictness: u8,
    },
    /// Reads the session replacement counter.
    GetReplacementCount,
    /// Resets the session replacement counter.
    ResetReplacementCount,
}

/// Responses to [`CommandRequest`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum CommandResponse {
    /// The filter's new state after a toggle.
    FilterToggled {
        /// Which filter was flipped.
        kind: ContentKind,
        /// Whether it is now enabled.
        is_enabled: bool,
    },
    /// The persisted strictness after an update.
    StrictnessSet {
        /// Which filter was adjusted.
        kind: ContentKind,
        /// The value written.
        strictness: u8,
    },
    /// Current replacement counter.
    ReplacementCount {
        /// Total replacements this session.
        count: u64,
    },
    /// Counter reset acknowledged.
    ReplacementCountReset,
}

/// Dispatches one command against the store.
pub fn dispatch(store: &dyn KeyValueStore, request: CommandRequest) -> Result<CommandResponse> {
    match request {
        CommandRequest::ToggleFilter { kind } => {
            let mut config = store::load_filter_config(store)?;
            let toggle = config.toggle_mut(kind);
            toggle.is_enabled = !toggle.is_enabled;
            let is_enabled = toggle.is_enabled;
            store::save_filter_config(store, &config)?;
            Ok(CommandResponse::FilterToggled { kind, is_enabled })
        }
        CommandRequest::SetStrictness { kind, strictness } => {
            let strictness = strictness.min(100);
            let mut config = store::load_filter_config(store)?;
            config.toggle_mut(kind).strictness = strictness;
            store::save_filter_config(store, &config)?;
            Ok(CommandResponse::StrictnessSet { kind, strictness })
        }
        CommandRequest::GetReplacementCount => Ok(CommandResponse::ReplacementCount {
            count: store::replacement_count(store)?,
        }),
        CommandRequest::ResetReplacementCount => {
            store::reset_replacements(store)?;
            Ok(CommandResponse::ReplacementCountReset)
        }
    }
}
