//! Snapshot wire types
//!
//! A snapshot is the complete serializable representation of a sheet: a flat
//! map of lowercase-underscore field names to values. The value shape
//! disambiguates handling on load - numbers are ratings, strings are
//! scalars, `{max, current, ...}` objects are tracks, and anything else is
//! an opaque blob owned by an external trait collaborator.
//!
//! Dedicated serde structs decouple the save format from live widget state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::track::{DamageTrack, HumanityTrack, TrackKind};

/// Serialized form of a track.
///
/// For the humanity track `superficial` carries the stain count and
/// `aggravated` is absent; `current` is the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub max: u8,
    pub current: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superficial: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggravated: Option<u8>,
    #[serde(rename = "type")]
    pub kind: TrackKind,
}

impl From<&DamageTrack> for TrackSnapshot {
    fn from(track: &DamageTrack) -> Self {
        Self {
            max: track.max(),
            current: track.current(),
            superficial: Some(track.superficial()),
            aggravated: Some(track.aggravated()),
            kind: track.kind(),
        }
    }
}

impl From<&HumanityTrack> for TrackSnapshot {
    fn from(track: &HumanityTrack) -> Self {
        Self {
            max: track.max(),
            current: track.current(),
            superficial: Some(track.stain()),
            aggravated: None,
            kind: TrackKind::Humanity,
        }
    }
}

impl TrackSnapshot {
    /// Rebuild a damage track from this snapshot.
    pub fn to_damage_track(&self) -> Result<DamageTrack, DomainError> {
        DamageTrack::from_counts(
            self.kind,
            self.max,
            self.superficial.unwrap_or(0),
            self.aggravated.unwrap_or(0),
        )
    }

    /// Rebuild the humanity track from this snapshot.
    pub fn to_humanity_track(&self) -> Result<HumanityTrack, DomainError> {
        if self.kind != TrackKind::Humanity {
            return Err(DomainError::validation(format!(
                "expected humanity track, found {}",
                self.kind.field_name()
            )));
        }
        HumanityTrack::from_counts(self.max, self.current, self.superficial.unwrap_or(0))
    }
}

/// One field value. Order matters for untagged deserialization: the strict
/// track shape is tried before the blob catch-all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Rating(u8),
    Scalar(String),
    Track(TrackSnapshot),
    Blob(serde_json::Value),
}

/// The complete serializable state of a character sheet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(flatten)]
    fields: BTreeMap<String, FieldValue>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn insert_scalar(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), FieldValue::Scalar(value.into()));
    }

    pub fn insert_rating(&mut self, field: impl Into<String>, value: u8) {
        self.fields.insert(field.into(), FieldValue::Rating(value));
    }

    pub fn insert_track(&mut self, field: impl Into<String>, track: TrackSnapshot) {
        self.fields.insert(field.into(), FieldValue::Track(track));
    }

    pub fn insert_blob(&mut self, field: impl Into<String>, blob: serde_json::Value) {
        self.fields.insert(field.into(), FieldValue::Blob(blob));
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn scalar(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(FieldValue::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    pub fn rating(&self, field: &str) -> Option<u8> {
        match self.fields.get(field) {
            Some(FieldValue::Rating(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn track(&self, field: &str) -> Option<&TrackSnapshot> {
        match self.fields.get(field) {
            Some(FieldValue::Track(t)) => Some(t),
            _ => None,
        }
    }

    pub fn blob(&self, field: &str) -> Option<&serde_json::Value> {
        match self.fields.get(field) {
            Some(FieldValue::Blob(b)) => Some(b),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

/// Export filename: the character name sanitized to `[a-z0-9_-]`, plus
/// `.json`. Whitespace becomes underscores; anything else unrepresentable is
/// dropped. An empty result falls back to `character`.
pub fn export_filename(character_name: &str) -> String {
    let mut stem: String = character_name
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '_' | '-' => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    if stem.is_empty() {
        stem = "character".to_string();
    }
    format!("{stem}.json")
}
