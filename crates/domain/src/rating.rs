//! DotRating value object - a bounded integer trait rendered as filled dots.
//!
//! Attributes, skills, and loresheet levels are all dot ratings: `max` dots,
//! of which exactly `value` are filled. Clicking a dot either fills up to that
//! position or, when the clicked dot is the last filled one, un-fills it.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A bounded integer widget with click-to-set semantics.
///
/// # Invariants
///
/// - `min <= value <= max`
/// - the number of filled indicators always equals `value`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotRating {
    value: u8,
    min: u8,
    max: u8,
}

/// Outcome of a rating mutation, reported to subscribers as `rating_changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingChange {
    pub old: u8,
    pub new: u8,
}

impl RatingChange {
    /// True when the click left the value untouched (e.g. clamped at `min`).
    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }
}

impl DotRating {
    /// Create a rating with the given bounds, starting at `value`.
    pub fn new(min: u8, max: u8, value: u8) -> Result<Self, DomainError> {
        if min > max {
            return Err(DomainError::validation(format!(
                "rating min {min} exceeds max {max}"
            )));
        }
        if value < min || value > max {
            return Err(DomainError::validation(format!(
                "rating value {value} outside bounds {min}..={max}"
            )));
        }
        Ok(Self { value, min, max })
    }

    /// Conventional five-dot trait starting at the given value.
    pub fn five_dot(value: u8) -> Result<Self, DomainError> {
        Self::new(0, 5, value)
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    /// Handle a click on dot `index` (zero-based, left to right).
    ///
    /// Clicking the last filled dot un-fills it; clicking any other dot fills
    /// up to (or reduces down to) that position. The decrement clamps at
    /// `min`, reported as a no-op change rather than an error.
    pub fn click(&mut self, index: u8) -> Result<RatingChange, DomainError> {
        if index >= self.max {
            return Err(DomainError::out_of_bounds(
                index as usize,
                self.max as usize,
            ));
        }
        let old = self.value;
        let new = if index + 1 == self.value {
            index.max(self.min)
        } else {
            (index + 1).max(self.min)
        };
        self.value = new;
        Ok(RatingChange { old, new })
    }

    /// Set the value directly (snapshot load path). Out-of-bounds values are
    /// a validation error, not a clamp - imports are all-or-nothing.
    pub fn set_value(&mut self, value: u8) -> Result<RatingChange, DomainError> {
        if value < self.min || value > self.max {
            return Err(DomainError::validation(format!(
                "rating value {value} outside bounds {}..={}",
                self.min, self.max
            )));
        }
        let old = self.value;
        self.value = value;
        Ok(RatingChange { old, new: value })
    }
}
