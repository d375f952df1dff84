//! CharacterSheet aggregate
//!
//! Owns the live widget state for one character: named dot ratings, the
//! three tracks, scalar fields, and the sheet lock. Mutations go through
//! click-level operations that enforce the lock predicate and return
//! `SheetEvent`s for the bus; fields are private and valid by construction.
//!
//! Widgets are built from a snapshot fragment when a character loads and the
//! whole aggregate is discarded on character switch.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::DomainError;
use crate::events::SheetEvent;
use crate::ids::CharacterId;
use crate::rating::DotRating;
use crate::track::{DamageTrack, HumanityTrack, TrackKind};

/// The nine core attributes every sheet starts with.
const CORE_ATTRIBUTES: [&str; 9] = [
    "strength",
    "dexterity",
    "stamina",
    "charisma",
    "manipulation",
    "composure",
    "intelligence",
    "wits",
    "resolve",
];

/// Live state of one character sheet. Snapshots, not this struct, are the
/// serialization boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterSheet {
    id: CharacterId,
    locked: bool,
    /// Fields that stay editable while the sheet is locked. Damage tracks
    /// and hunger are play-mode state, not biography, so they default in.
    unlockable: BTreeSet<String>,
    scalars: BTreeMap<String, String>,
    ratings: BTreeMap<String, DotRating>,
    health: DamageTrack,
    willpower: DamageTrack,
    humanity: HumanityTrack,
}

impl CharacterSheet {
    /// A fresh sheet: core attributes at one dot, hunger at one, tracks at
    /// their derived capacities, humanity at seven.
    pub fn new(id: CharacterId) -> Self {
        let mut ratings = BTreeMap::new();
        for attribute in CORE_ATTRIBUTES {
            ratings.insert(attribute.to_string(), default_rating());
        }
        ratings.insert("hunger".to_string(), default_rating());

        let unlockable: BTreeSet<String> = ["hunger", "health", "willpower", "humanity"]
            .into_iter()
            .map(String::from)
            .collect();

        Self {
            id,
            locked: false,
            unlockable,
            scalars: BTreeMap::new(),
            ratings,
            // Stamina 1 + 3, Resolve 1 + Composure 1.
            health: DamageTrack::new(TrackKind::Health, 4)
                .unwrap_or_else(|_| unreachable!("health is a damage kind")),
            willpower: DamageTrack::new(TrackKind::Willpower, 2)
                .unwrap_or_else(|_| unreachable!("willpower is a damage kind")),
            humanity: HumanityTrack::from_counts(10, 7, 0)
                .unwrap_or_else(|_| unreachable!("7 + 0 fits a 10-box track")),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> CharacterId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.scalars.get("name").map(String::as_str).unwrap_or("")
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn rating(&self, field: &str) -> Option<&DotRating> {
        self.ratings.get(field)
    }

    pub fn rating_value(&self, field: &str) -> Option<u8> {
        self.ratings.get(field).map(DotRating::value)
    }

    pub fn scalar(&self, field: &str) -> Option<&str> {
        self.scalars.get(field).map(String::as_str)
    }

    pub fn health(&self) -> &DamageTrack {
        &self.health
    }

    pub fn willpower(&self) -> &DamageTrack {
        &self.willpower
    }

    pub fn humanity(&self) -> &HumanityTrack {
        &self.humanity
    }

    pub fn ratings(&self) -> impl Iterator<Item = (&String, &DotRating)> {
        self.ratings.iter()
    }

    pub fn scalars(&self) -> impl Iterator<Item = (&String, &String)> {
        self.scalars.iter()
    }

    /// Pure lock predicate, evaluated before any mutation is accepted.
    pub fn can_edit(&self, field: &str) -> bool {
        !self.locked || self.unlockable.contains(field)
    }

    // =========================================================================
    // Click operations
    // =========================================================================

    /// Click dot `index` of the named rating.
    pub fn click_rating(&mut self, field: &str, index: u8) -> Result<SheetEvent, DomainError> {
        if !self.can_edit(field) {
            return Err(DomainError::locked(field));
        }
        let rating = self
            .ratings
            .get_mut(field)
            .ok_or_else(|| DomainError::unknown_field(field))?;
        let change = rating.click(index)?;
        Ok(SheetEvent::RatingChanged {
            field: field.to_string(),
            old: change.old,
            new: change.new,
        })
    }

    /// Click box `position` of the given track.
    pub fn click_track(&mut self, kind: TrackKind, position: u8) -> Result<SheetEvent, DomainError> {
        if !self.can_edit(kind.field_name()) {
            return Err(DomainError::locked(kind.field_name()));
        }
        let change = match kind {
            TrackKind::Health => self.health.click(position)?,
            TrackKind::Willpower => self.willpower.click(position)?,
            TrackKind::Humanity => self.humanity.click(position)?,
        };
        Ok(SheetEvent::TrackChanged {
            kind,
            old_current: change.old_current,
            new_current: change.new_current,
        })
    }

    // =========================================================================
    // Non-click mutations
    // =========================================================================

    /// Resize a damage track (derived recompute path). Humanity has a fixed
    /// capacity and no binding, so it cannot be resized.
    pub fn resize_track(&mut self, kind: TrackKind, new_max: u8) -> Result<SheetEvent, DomainError> {
        let track = match kind {
            TrackKind::Health => &mut self.health,
            TrackKind::Willpower => &mut self.willpower,
            TrackKind::Humanity => {
                return Err(DomainError::constraint("humanity capacity is fixed"))
            }
        };
        let outcome = track.resize(new_max);
        Ok(SheetEvent::TrackResized {
            kind,
            old_max: outcome.old_max,
            new_max: outcome.new_max,
        })
    }

    pub fn set_scalar(
        &mut self,
        field: &str,
        value: impl Into<String>,
    ) -> Result<SheetEvent, DomainError> {
        if !self.can_edit(field) {
            return Err(DomainError::locked(field));
        }
        self.scalars.insert(field.to_string(), value.into());
        Ok(SheetEvent::ScalarChanged {
            field: field.to_string(),
        })
    }

    /// Set a rating's value directly (snapshot load). Creates the rating as
    /// a five-dot trait when the sheet does not have it yet (e.g. a skill or
    /// loresheet level absent from the defaults).
    pub fn set_rating_value(&mut self, field: &str, value: u8) -> Result<(), DomainError> {
        match self.ratings.get_mut(field) {
            Some(rating) => {
                rating.set_value(value)?;
            }
            None => {
                self.ratings.insert(field.to_string(), DotRating::five_dot(value)?);
            }
        }
        Ok(())
    }

    /// Replace a track wholesale (snapshot load).
    pub fn set_damage_track(&mut self, track: DamageTrack) -> Result<(), DomainError> {
        match track.kind() {
            TrackKind::Health => self.health = track,
            TrackKind::Willpower => self.willpower = track,
            TrackKind::Humanity => {
                return Err(DomainError::constraint("humanity is not a damage track"))
            }
        }
        Ok(())
    }

    pub fn set_humanity_track(&mut self, track: HumanityTrack) {
        self.humanity = track;
    }

    pub fn set_locked(&mut self, locked: bool) -> SheetEvent {
        self.locked = locked;
        SheetEvent::LockChanged { locked }
    }

    /// Add one corruption stain (the dedicated control, not a box click).
    pub fn add_stain(&mut self) -> SheetEvent {
        let change = self.humanity.add_stain();
        SheetEvent::TrackChanged {
            kind: TrackKind::Humanity,
            old_current: change.old_current,
            new_current: change.new_current,
        }
    }
}

fn default_rating() -> DotRating {
    DotRating::five_dot(1).unwrap_or_else(|_| unreachable!("1 is a valid five-dot value"))
}
