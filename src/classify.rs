//! # Output classification for managed processes.
//!
//! Child servers never report their health through a structured channel; the
//! only signal is their standard output. This module holds the fixed-string
//! contract with those programs as a lookup table:
//!
//! ```text
//! ProcessKind ──► &[Marker] ──► first marker whose needle is in the line
//!                                  (and whose `from` state matches)
//!                                        │
//!                                        ▼
//!                           Classification::Transition(to)
//! ```
//!
//! Lines containing [`ERROR_TAG`] are classified before any marker lookup and
//! never trigger a transition on their own; the supervisor decides what an
//! error line does to the state.
//!
//! ## Contract
//! | Kind  | Substring                       | Required state | Result    |
//! |-------|---------------------------------|----------------|-----------|
//! | any   | `[Error]`                       | any            | error     |
//! | Zone  | `Entering sleep mode`           | any            | Sleeping  |
//! | Zone  | `Zone booted successfully`      | Sleeping       | Running   |
//! | World | `Starting EQ Network server on` | any            | Running   |
//! | Relay | `Connected to World`            | any            | Running   |

use std::path::Path;

use crate::state::AppState;

/// Tag that marks a classified error line.
pub const ERROR_TAG: &str = "[Error]";

/// Category of managed process; selects the marker table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    /// Stateless zone worker (many interchangeable instances).
    Zone,
    /// World coordinator.
    World,
    /// Chat/mail relay.
    Relay,
    /// Any other configured executable.
    Extra,
}

impl ProcessKind {
    /// Derives the kind from an executable path by its file stem.
    ///
    /// `zone` anywhere in the stem wins; `world` and `ucs` must match exactly.
    pub fn detect(program: &Path) -> Self {
        let stem = program
            .file_stem()
            .map(|s| s.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if stem.contains("zone") {
            ProcessKind::Zone
        } else if stem == "world" {
            ProcessKind::World
        } else if stem == "ucs" {
            ProcessKind::Relay
        } else {
            ProcessKind::Extra
        }
    }

    /// Marker table for this kind.
    pub fn markers(&self) -> &'static [Marker] {
        match self {
            ProcessKind::Zone => ZONE_MARKERS,
            ProcessKind::World => WORLD_MARKERS,
            ProcessKind::Relay => RELAY_MARKERS,
            ProcessKind::Extra => &[],
        }
    }

    /// Short lowercase label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::Zone => "zone",
            ProcessKind::World => "world",
            ProcessKind::Relay => "relay",
            ProcessKind::Extra => "extra",
        }
    }
}

/// One readiness/liveness rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    /// Literal substring searched in the line.
    pub needle: &'static str,
    /// State the process must currently be in (`None` = any state).
    pub from: Option<AppState>,
    /// State to move to when the rule matches.
    pub to: AppState,
}

const ZONE_MARKERS: &[Marker] = &[
    Marker {
        needle: "Entering sleep mode",
        from: None,
        to: AppState::Sleeping,
    },
    Marker {
        needle: "Zone booted successfully",
        from: Some(AppState::Sleeping),
        to: AppState::Running,
    },
];

const WORLD_MARKERS: &[Marker] = &[Marker {
    needle: "Starting EQ Network server on",
    from: None,
    to: AppState::Running,
}];

const RELAY_MARKERS: &[Marker] = &[Marker {
    needle: "Connected to World",
    from: None,
    to: AppState::Running,
}];

/// Result of classifying one output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Line carries the error tag.
    Error,
    /// Line matched a marker for the current state.
    Transition {
        /// Matched needle (for logging).
        needle: &'static str,
        /// Target state.
        to: AppState,
    },
    /// Nothing recognised.
    Plain,
}

/// Classifies `line` for a process of `kind` currently in `state`.
pub fn classify(kind: ProcessKind, state: AppState, line: &str) -> Classification {
    if line.contains(ERROR_TAG) {
        return Classification::Error;
    }

    kind.markers()
        .iter()
        .find(|m| m.from.is_none_or(|from| from == state) && line.contains(m.needle))
        .map_or(Classification::Plain, |m| Classification::Transition {
            needle: m.needle,
            to: m.to,
        })
}
