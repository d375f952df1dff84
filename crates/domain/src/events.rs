//! Sheet events
//!
//! Coarse-grained events representing state changes on the character sheet.
//! Widgets announce changes through these; the event bus, derived-rule
//! engine, and persistence coordinator all consume them without holding
//! references to each other.

use serde::{Deserialize, Serialize};

use crate::track::TrackKind;

/// A state change announced on the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetEvent {
    /// A dot rating changed value.
    RatingChanged {
        field: String,
        old: u8,
        new: u8,
    },
    /// A track box changed state.
    TrackChanged {
        kind: TrackKind,
        old_current: u8,
        new_current: u8,
    },
    /// A track's capacity changed (derived recompute or load).
    TrackResized {
        kind: TrackKind,
        old_max: u8,
        new_max: u8,
    },
    /// A scalar field (name, clan, concept, ...) changed.
    ScalarChanged {
        field: String,
    },
    /// The sheet lock was toggled.
    LockChanged {
        locked: bool,
    },
    /// A collaborator-owned section (disciplines, merits, ...) changed.
    CollaboratorChanged {
        section: String,
    },
    /// A full snapshot was applied (character load or import).
    SheetLoaded,
}

impl SheetEvent {
    /// Bus topic this event is emitted under.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RatingChanged { .. } => "rating_changed",
            Self::TrackChanged { .. } => "track_changed",
            Self::TrackResized { .. } => "track_resized",
            Self::ScalarChanged { .. } => "scalar_changed",
            Self::LockChanged { .. } => "lock_changed",
            Self::CollaboratorChanged { .. } => "collaborator_changed",
            Self::SheetLoaded => "sheet_loaded",
        }
    }

    /// The interaction topics that mark the sheet dirty for persistence.
    /// `track_resized` is excluded: resizes only happen downstream of a
    /// rating change that is already in this set.
    pub fn interaction_types() -> &'static [&'static str] {
        &[
            "rating_changed",
            "track_changed",
            "scalar_changed",
            "lock_changed",
            "collaborator_changed",
        ]
    }
}
