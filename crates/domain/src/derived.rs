//! Derived bindings - declared formulas keeping track capacities consistent
//! with attribute values.
//!
//! A binding is one-way: rating changes flow into a track resize, and a
//! resize never feeds back into another binding, which statically rules out
//! recompute cycles.

use serde::{Deserialize, Serialize};

use crate::track::TrackKind;

/// How a target capacity is computed from its source ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    /// Sum of all source values.
    Sum,
    /// Sum of all source values plus a constant.
    SumPlus(i32),
}

impl Formula {
    /// Evaluate against the source values, clamped into u8 capacity range.
    pub fn apply(&self, sources: &[u8]) -> u8 {
        let sum: i32 = sources.iter().map(|v| *v as i32).sum();
        let result = match self {
            Self::Sum => sum,
            Self::SumPlus(constant) => sum + constant,
        };
        result.clamp(0, u8::MAX as i32) as u8
    }
}

/// A declared dependency from source ratings to a track's capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedBinding {
    /// Rating field names this binding reads.
    pub sources: Vec<String>,
    /// The track whose capacity is recomputed.
    pub target: TrackKind,
    pub formula: Formula,
}

impl DerivedBinding {
    pub fn new(sources: Vec<String>, target: TrackKind, formula: Formula) -> Self {
        Self {
            sources,
            target,
            formula,
        }
    }

    /// True when a change to `rating` requires recomputing this binding.
    pub fn depends_on(&self, rating: &str) -> bool {
        self.sources.iter().any(|s| s == rating)
    }

    /// The standard bindings: Health tracks Stamina, Willpower tracks
    /// Resolve + Composure.
    pub fn standard() -> Vec<Self> {
        vec![
            Self::new(
                vec!["stamina".to_string()],
                TrackKind::Health,
                Formula::SumPlus(3),
            ),
            Self::new(
                vec!["resolve".to_string(), "composure".to_string()],
                TrackKind::Willpower,
                Formula::Sum,
            ),
        ]
    }
}
