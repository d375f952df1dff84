//! SheetBldr Domain - trait widgets, track state machines, and snapshot types.
//!
//! Pure state: every mutation here is a synchronous function over plain data,
//! so the click semantics and invariants are unit-testable without an event
//! loop or a rendering layer. The engine crate wires these widgets to the
//! event bus and the persistence pipeline.

pub mod derived;
pub mod error;
pub mod events;
pub mod ids;
pub mod rating;
pub mod sheet;
pub mod snapshot;
pub mod track;

pub use derived::{DerivedBinding, Formula};
pub use error::DomainError;
pub use events::SheetEvent;
pub use ids::{CharacterId, ComponentId};
pub use rating::{DotRating, RatingChange};
pub use sheet::CharacterSheet;
pub use snapshot::{export_filename, FieldValue, Snapshot, TrackSnapshot};
pub use track::{
    DamageBox, DamageTrack, HumanityBox, HumanityTrack, TrackChange, TrackKind, TrackResize,
};
