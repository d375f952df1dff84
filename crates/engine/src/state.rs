//! Shared handle to the live sheet.
//!
//! All widget mutation is synchronous inside one event-handler invocation,
//! so a plain `RwLock` is enough; the guards are never held across an await.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sheetbldr_domain::CharacterSheet;

/// The live sheet, shared between the context, rule engine, and codec.
pub type SharedSheet = Arc<RwLock<CharacterSheet>>;

pub fn shared(sheet: CharacterSheet) -> SharedSheet {
    Arc::new(RwLock::new(sheet))
}

// Poison recovery: a panic mid-click must not brick the whole sheet.
pub(crate) fn read(sheet: &SharedSheet) -> RwLockReadGuard<'_, CharacterSheet> {
    sheet.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write(sheet: &SharedSheet) -> RwLockWriteGuard<'_, CharacterSheet> {
    sheet.write().unwrap_or_else(PoisonError::into_inner)
}
