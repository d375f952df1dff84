//! Track state machines - Health, Willpower, and Humanity.
//!
//! A track is a fixed-length sequence of boxes representing a depletable or
//! accumulating resource. Damage tracks (Health, Willpower) carry two
//! severities of harm per box; the Humanity track runs two independent
//! counters (score and stain) toward each other inside one box array.
//!
//! # Invariants
//!
//! - `len(boxes) == max` always
//! - DamageTrack: `superficial + aggravated <= max`,
//!   `current = max - superficial - aggravated`
//! - HumanityTrack: `score + stain <= max`, `current = score`
//!
//! `current` is recomputed from box state after every mutation, never cached.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Which track a change happened on. Carried on events and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Health,
    Willpower,
    Humanity,
}

impl TrackKind {
    /// Snapshot field name for this track.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Willpower => "willpower",
            Self::Humanity => "humanity",
        }
    }
}

/// One box on a damage track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageBox {
    #[default]
    Empty,
    Superficial,
    Aggravated,
}

impl DamageBox {
    /// Click cycle: Empty -> Superficial -> Aggravated -> Empty.
    fn cycled(self) -> Self {
        match self {
            Self::Empty => Self::Superficial,
            Self::Superficial => Self::Aggravated,
            Self::Aggravated => Self::Empty,
        }
    }
}

/// One box on the humanity track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanityBox {
    #[default]
    Empty,
    Filled,
    Stained,
}

/// Outcome of a single-box mutation, reported as `track_changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackChange {
    pub kind: TrackKind,
    pub old_current: u8,
    pub new_current: u8,
}

/// Outcome of a capacity change, reported as `track_resized`.
///
/// Shrinking drops boxes from the tail; damage markers on dropped boxes are
/// discarded and counted here so callers can log the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackResize {
    pub kind: TrackKind,
    pub old_max: u8,
    pub new_max: u8,
    pub discarded_superficial: u8,
    pub discarded_aggravated: u8,
}

// =============================================================================
// Damage tracks (Health, Willpower)
// =============================================================================

/// Health or Willpower: an ordered row of boxes, each independently cycling
/// Empty -> Superficial -> Aggravated -> Empty on click.
///
/// Boxes are conceptually laid out `[Aggravated]* [Superficial]* [Empty]*`,
/// but any position can be clicked, so the array stores arbitrary
/// arrangements; only the counts matter for `current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageTrack {
    kind: TrackKind,
    boxes: Vec<DamageBox>,
}

impl DamageTrack {
    /// Create an undamaged track. `kind` must be Health or Willpower.
    pub fn new(kind: TrackKind, max: u8) -> Result<Self, DomainError> {
        if kind == TrackKind::Humanity {
            return Err(DomainError::constraint(
                "humanity is not a damage track",
            ));
        }
        Ok(Self {
            kind,
            boxes: vec![DamageBox::Empty; max as usize],
        })
    }

    /// Rebuild a track from damage counts (snapshot load path).
    ///
    /// Boxes are laid out canonically: aggravated first, then superficial,
    /// then empty.
    pub fn from_counts(
        kind: TrackKind,
        max: u8,
        superficial: u8,
        aggravated: u8,
    ) -> Result<Self, DomainError> {
        let mut track = Self::new(kind, max)?;
        if superficial as usize + aggravated as usize > max as usize {
            return Err(DomainError::validation(format!(
                "{}: {superficial} superficial + {aggravated} aggravated exceeds max {max}",
                kind.field_name()
            )));
        }
        for i in 0..aggravated as usize {
            track.boxes[i] = DamageBox::Aggravated;
        }
        for i in aggravated as usize..(aggravated + superficial) as usize {
            track.boxes[i] = DamageBox::Superficial;
        }
        Ok(track)
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn max(&self) -> u8 {
        self.boxes.len() as u8
    }

    pub fn boxes(&self) -> &[DamageBox] {
        &self.boxes
    }

    pub fn superficial(&self) -> u8 {
        self.count(DamageBox::Superficial)
    }

    pub fn aggravated(&self) -> u8 {
        self.count(DamageBox::Aggravated)
    }

    /// Undamaged capacity: `max - superficial - aggravated`.
    pub fn current(&self) -> u8 {
        self.max() - self.superficial() - self.aggravated()
    }

    fn count(&self, state: DamageBox) -> u8 {
        self.boxes.iter().filter(|b| **b == state).count() as u8
    }

    /// Cycle the state of the box at `position`, independent of neighbors.
    pub fn click(&mut self, position: u8) -> Result<TrackChange, DomainError> {
        let idx = position as usize;
        if idx >= self.boxes.len() {
            return Err(DomainError::out_of_bounds(idx, self.boxes.len()));
        }
        let old_current = self.current();
        self.boxes[idx] = self.boxes[idx].cycled();
        Ok(TrackChange {
            kind: self.kind,
            old_current,
            new_current: self.current(),
        })
    }

    /// Change capacity. Growth appends empty boxes at the tail; shrinking
    /// drops boxes from the tail, discarding any damage they carried.
    pub fn resize(&mut self, new_max: u8) -> TrackResize {
        let old_max = self.max();
        let mut discarded_superficial = 0;
        let mut discarded_aggravated = 0;
        if new_max < old_max {
            for dropped in self.boxes.drain(new_max as usize..) {
                match dropped {
                    DamageBox::Superficial => discarded_superficial += 1,
                    DamageBox::Aggravated => discarded_aggravated += 1,
                    DamageBox::Empty => {}
                }
            }
        } else {
            self.boxes.resize(new_max as usize, DamageBox::Empty);
        }
        TrackResize {
            kind: self.kind,
            old_max,
            new_max,
            discarded_superficial,
            discarded_aggravated,
        }
    }
}

// =============================================================================
// Humanity track
// =============================================================================

/// Humanity: score (`Filled`) grows left-to-right, stain (`Stained`) grows
/// right-to-left, and the two may never overlap.
///
/// The box array is always canonical - the leftmost `score` boxes are filled
/// and the rightmost `stain` boxes are stained - so the track stores the two
/// counters and renders boxes on demand.
///
/// Click dispatch, symmetric in the two counters:
/// 1. a click inside the filled score region uses dot-rating fill/toggle
///    semantics on score;
/// 2. a click on the first box past the score grows score by one - if that
///    box was stained, fill takes precedence and stain drops by exactly one;
/// 3. a click on a deeper stained box applies mirrored fill-to-position on
///    the stain counter (indexed from the right);
/// 4. a click on an empty box beyond both regions is a score
///    fill-to-position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanityTrack {
    max: u8,
    score: u8,
    stain: u8,
}

impl HumanityTrack {
    /// Create a track with the given score and no stains.
    pub fn new(max: u8, score: u8) -> Result<Self, DomainError> {
        Self::from_counts(max, score, 0)
    }

    /// Rebuild from counters (snapshot load path). Strict: overlap is a
    /// validation error here, unlike the clamping interactive paths.
    pub fn from_counts(max: u8, score: u8, stain: u8) -> Result<Self, DomainError> {
        if score as usize + stain as usize > max as usize {
            return Err(DomainError::validation(format!(
                "humanity: score {score} + stain {stain} exceeds max {max}"
            )));
        }
        Ok(Self { max, score, stain })
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn stain(&self) -> u8 {
        self.stain
    }

    /// `current` is the humanity score.
    pub fn current(&self) -> u8 {
        self.score
    }

    /// Render the canonical box array (`len == max`).
    pub fn boxes(&self) -> Vec<HumanityBox> {
        let mut boxes = vec![HumanityBox::Empty; self.max as usize];
        for b in boxes.iter_mut().take(self.score as usize) {
            *b = HumanityBox::Filled;
        }
        for b in boxes.iter_mut().skip((self.max - self.stain) as usize) {
            *b = HumanityBox::Stained;
        }
        boxes
    }

    /// Handle a click at `position`. See the type-level policy.
    pub fn click(&mut self, position: u8) -> Result<TrackChange, DomainError> {
        if position >= self.max {
            return Err(DomainError::out_of_bounds(
                position as usize,
                self.max as usize,
            ));
        }
        let old_current = self.score;
        let from_right = self.max - 1 - position;

        if position < self.score {
            // Inside the filled region: dot-rating toggle on score.
            self.score = if position + 1 == self.score {
                position
            } else {
                position + 1
            };
        } else if position == self.score {
            // First box past the score always grows score by one; a stain
            // occupying it gives way (fill takes precedence).
            self.score += 1;
            if self.score + self.stain > self.max {
                self.stain -= 1;
            }
        } else if from_right < self.stain {
            // Deeper stained box: mirrored fill-to-position on stain.
            self.stain = if from_right + 1 == self.stain {
                from_right
            } else {
                from_right + 1
            };
        } else {
            // Empty box beyond both regions: fill score to position. The box
            // is left of the stain region, so no overlap is possible.
            self.score = position + 1;
        }
        Ok(TrackChange {
            kind: TrackKind::Humanity,
            old_current,
            new_current: self.score,
        })
    }

    /// Set the stain count directly (corruption control, collaborator load).
    /// Clamped so `score + stain <= max`.
    pub fn set_stains(&mut self, stains: u8) -> TrackChange {
        let old_current = self.score;
        self.stain = stains.min(self.max - self.score);
        TrackChange {
            kind: TrackKind::Humanity,
            old_current,
            new_current: self.score,
        }
    }

    /// Add one stain, stealing from the score when the track is saturated -
    /// the inverse precedence of a fill: corruption arriving on a full track
    /// erodes humanity rather than being dropped.
    pub fn add_stain(&mut self) -> TrackChange {
        let old_current = self.score;
        if self.stain < self.max {
            self.stain += 1;
            if self.score + self.stain > self.max {
                self.score -= 1;
            }
        }
        TrackChange {
            kind: TrackKind::Humanity,
            old_current,
            new_current: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Damage tracks
    // -------------------------------------------------------------------------

    #[test]
    fn test_damage_click_cycles_single_box() {
        let mut track = DamageTrack::new(TrackKind::Health, 5).unwrap();
        track.click(2).unwrap();
        assert_eq!(track.boxes()[2], DamageBox::Superficial);
        track.click(2).unwrap();
        assert_eq!(track.boxes()[2], DamageBox::Aggravated);
        track.click(2).unwrap();
        assert_eq!(track.boxes()[2], DamageBox::Empty);
        // Neighbors untouched throughout.
        assert_eq!(track.superficial() + track.aggravated(), 0);
    }

    #[test]
    fn test_damage_current_recomputed() {
        let mut track = DamageTrack::new(TrackKind::Willpower, 4).unwrap();
        assert_eq!(track.current(), 4);
        track.click(0).unwrap();
        track.click(1).unwrap();
        track.click(1).unwrap();
        assert_eq!(track.superficial(), 1);
        assert_eq!(track.aggravated(), 1);
        assert_eq!(track.current(), 2);
    }

    #[test]
    fn test_damage_invariant_under_click_and_resize_sequences() {
        let mut track = DamageTrack::new(TrackKind::Health, 5).unwrap();
        // A fixed pseudo-random walk over clicks and resizes.
        let clicks = [0u8, 3, 3, 1, 4, 2, 2, 2, 0, 1, 3, 4, 4, 0];
        let sizes = [7u8, 4, 6, 3, 5];
        for (i, &pos) in clicks.iter().enumerate() {
            if pos < track.max() {
                track.click(pos).unwrap();
            }
            if i % 3 == 0 {
                track.resize(sizes[i % sizes.len()]);
            }
            assert!(track.superficial() + track.aggravated() <= track.max());
            assert_eq!(
                track.current(),
                track.max() - track.superficial() - track.aggravated()
            );
            assert_eq!(track.boxes().len(), track.max() as usize);
        }
    }

    #[test]
    fn test_damage_resize_grow_appends_empty() {
        let mut track = DamageTrack::from_counts(TrackKind::Health, 5, 2, 1).unwrap();
        let outcome = track.resize(7);
        assert_eq!(outcome.old_max, 5);
        assert_eq!(outcome.new_max, 7);
        assert_eq!(track.max(), 7);
        // Existing markers preserved on the original five boxes.
        assert_eq!(track.superficial(), 2);
        assert_eq!(track.aggravated(), 1);
        assert_eq!(track.boxes()[5], DamageBox::Empty);
        assert_eq!(track.boxes()[6], DamageBox::Empty);
    }

    #[test]
    fn test_damage_resize_shrink_discards_tail_damage() {
        // Canonical layout: [Agg, Sup, Sup, Empty, Empty]; shrink to 2 drops
        // one superficial marker.
        let mut track = DamageTrack::from_counts(TrackKind::Health, 5, 2, 1).unwrap();
        let outcome = track.resize(2);
        assert_eq!(outcome.discarded_superficial, 1);
        assert_eq!(outcome.discarded_aggravated, 0);
        assert_eq!(track.max(), 2);
        assert_eq!(track.aggravated(), 1);
        assert_eq!(track.superficial(), 1);
    }

    #[test]
    fn test_damage_from_counts_rejects_overflow() {
        let err = DamageTrack::from_counts(TrackKind::Health, 5, 4, 2).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn test_humanity_is_not_a_damage_track() {
        assert!(DamageTrack::new(TrackKind::Humanity, 10).is_err());
    }

    // -------------------------------------------------------------------------
    // Humanity track
    // -------------------------------------------------------------------------

    #[test]
    fn test_humanity_score_fill_to_position() {
        let mut track = HumanityTrack::new(10, 7).unwrap();
        track.click(4).unwrap();
        assert_eq!(track.score(), 5);
        track.click(8).unwrap();
        assert_eq!(track.score(), 9);
    }

    #[test]
    fn test_humanity_score_toggle_down() {
        let mut track = HumanityTrack::new(10, 7).unwrap();
        track.click(6).unwrap();
        assert_eq!(track.score(), 6);
        track.click(6).unwrap();
        assert_eq!(track.score(), 7);
    }

    #[test]
    fn test_humanity_score_fill_never_touches_stains() {
        let mut track = HumanityTrack::from_counts(10, 7, 2).unwrap();
        track.click(3).unwrap();
        assert_eq!(track.score(), 4);
        assert_eq!(track.stain(), 2);
    }

    #[test]
    fn test_humanity_stain_toggle_from_right() {
        let mut track = HumanityTrack::from_counts(10, 3, 3).unwrap();
        // Boxes 7..10 stained. Clicking position 8 (from_right 1, not the
        // innermost) reduces the stain boundary to 2.
        track.click(8).unwrap();
        assert_eq!(track.stain(), 2);
        // Clicking the now-innermost stained box (position 8, from_right 1)
        // toggles it off.
        track.click(8).unwrap();
        assert_eq!(track.stain(), 1);
        assert_eq!(track.score(), 3);
    }

    #[test]
    fn test_humanity_fill_takes_precedence_at_saturation() {
        // score + stain == max: the box after the score is stained; filling
        // it steals exactly one stain instead of rejecting the click.
        let mut track = HumanityTrack::from_counts(10, 4, 6).unwrap();
        track.click(4).unwrap();
        assert_eq!(track.score(), 5);
        assert_eq!(track.stain(), 5);
        assert_eq!(track.score() + track.stain(), 10);
    }

    #[test]
    fn test_humanity_stains_removable_when_saturated() {
        let mut track = HumanityTrack::from_counts(10, 4, 6).unwrap();
        // A deeper stained box still toggles the stain counter.
        track.click(7).unwrap();
        assert_eq!(track.stain(), 3);
        assert_eq!(track.score(), 4);
    }

    #[test]
    fn test_humanity_invariants_under_click_sequences() {
        let mut track = HumanityTrack::from_counts(10, 5, 3).unwrap();
        let clicks = [9u8, 0, 4, 7, 7, 2, 9, 5, 8, 1, 6, 3, 9, 0, 5];
        for &pos in &clicks {
            track.click(pos).unwrap();
            assert!(track.score() + track.stain() <= track.max());
            assert_eq!(track.current(), track.score());
            assert_eq!(track.boxes().len(), track.max() as usize);
        }
    }

    #[test]
    fn test_humanity_boxes_render_canonically() {
        let track = HumanityTrack::from_counts(10, 3, 2).unwrap();
        let boxes = track.boxes();
        assert_eq!(&boxes[..3], &[HumanityBox::Filled; 3]);
        assert_eq!(&boxes[3..8], &[HumanityBox::Empty; 5]);
        assert_eq!(&boxes[8..], &[HumanityBox::Stained; 2]);
    }

    #[test]
    fn test_humanity_set_stains_clamps() {
        let mut track = HumanityTrack::new(10, 7).unwrap();
        track.set_stains(5);
        assert_eq!(track.stain(), 3);
        assert_eq!(track.score(), 7);
    }

    #[test]
    fn test_humanity_add_stain_erodes_score_when_full() {
        let mut track = HumanityTrack::from_counts(10, 7, 3).unwrap();
        track.add_stain();
        assert_eq!(track.stain(), 4);
        assert_eq!(track.score(), 6);
    }

    #[test]
    fn test_humanity_from_counts_rejects_overlap() {
        assert!(HumanityTrack::from_counts(10, 8, 3).is_err());
    }
}
