//! Snapshot codec - the bridge between live widget state and snapshots.
//!
//! `gather` re-reads the live sheet at call time (saves always capture the
//! latest state, never a stale copy) plus every registered collaborator's
//! export. `load` is all-or-nothing for primitive state: the entire snapshot
//! is validated into a candidate sheet before anything is committed, so a
//! malformed import leaves no partial mutation behind.
//!
//! Scalar fields backed by reference data (asynchronously hydrated
//! dropdowns) are retried a bounded number of times with a fixed delay and
//! then silently skipped - an eventually-consistent load is not an error.

use std::sync::Arc;
use std::time::Duration;

use sheetbldr_domain::{CharacterId, FieldValue, Snapshot, TrackKind};

use crate::collaborators::CollaboratorRegistry;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::state::{self, SharedSheet};
use crate::store::OptionCatalog;

pub struct SnapshotCodec {
    sheet: SharedSheet,
    registry: Arc<CollaboratorRegistry>,
    catalog: Arc<dyn OptionCatalog>,
    hydration_attempts: u32,
    hydration_delay: Duration,
}

impl SnapshotCodec {
    pub fn new(
        sheet: SharedSheet,
        registry: Arc<CollaboratorRegistry>,
        catalog: Arc<dyn OptionCatalog>,
        config: &EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            sheet,
            registry,
            catalog,
            hydration_attempts: config.hydration_attempts,
            hydration_delay: config.hydration_delay(),
        })
    }

    /// The character the live sheet currently belongs to.
    pub fn character_id(&self) -> CharacterId {
        state::read(&self.sheet).id()
    }

    /// Assemble a snapshot from live state, at this moment.
    pub fn gather(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        {
            let sheet = state::read(&self.sheet);
            for (field, value) in sheet.scalars() {
                snapshot.insert_scalar(field.clone(), value.clone());
            }
            snapshot.insert_scalar("locked", if sheet.locked() { "true" } else { "false" });
            for (field, rating) in sheet.ratings() {
                snapshot.insert_rating(field.clone(), rating.value());
            }
            snapshot.insert_track("health", sheet.health().into());
            snapshot.insert_track("willpower", sheet.willpower().into());
            snapshot.insert_track("humanity", sheet.humanity().into());
        }
        for section in self.registry.sections() {
            if let Some(collaborator) = self.registry.get(&section) {
                let blob = collaborator.export();
                if !blob.is_null() {
                    snapshot.insert_blob(section, blob);
                }
            }
        }
        snapshot
    }

    /// Apply a snapshot to the live sheet.
    ///
    /// Primitive fields (scalars, ratings, tracks) are validated into a
    /// candidate sheet first and committed in one swap. Collaborator blobs
    /// are applied afterwards, isolated per section.
    pub async fn load(&self, snapshot: &Snapshot) -> Result<(), EngineError> {
        let mut candidate = state::read(&self.sheet).clone();
        // The lock is sheet *state*; it must not veto the load that restores
        // it. Unlock the candidate, apply, then restore the imported flag
        // (or the pre-load flag when the snapshot does not carry one).
        let mut wants_locked = candidate.locked();
        candidate.set_locked(false);

        let mut deferred: Vec<(&str, &str)> = Vec::new();
        let mut blobs: Vec<(&str, &serde_json::Value)> = Vec::new();

        for (field, value) in snapshot.iter() {
            match value {
                FieldValue::Track(track) => {
                    if track.kind.field_name() != field {
                        return Err(EngineError::validation(format!(
                            "track field {field} carries type {}",
                            track.kind.field_name()
                        )));
                    }
                    match track.kind {
                        TrackKind::Health | TrackKind::Willpower => {
                            candidate.set_damage_track(track.to_damage_track()?)?;
                        }
                        TrackKind::Humanity => {
                            candidate.set_humanity_track(track.to_humanity_track()?);
                        }
                    }
                }
                FieldValue::Rating(v) => {
                    candidate.set_rating_value(field, *v)?;
                }
                FieldValue::Scalar(s) if field == "locked" => {
                    wants_locked = match s.as_str() {
                        "true" => true,
                        "false" => false,
                        other => {
                            return Err(EngineError::validation(format!(
                                "locked must be true or false, found {other}"
                            )))
                        }
                    };
                }
                FieldValue::Scalar(s) => {
                    if self.catalog.is_reference_field(field) {
                        deferred.push((field.as_str(), s.as_str()));
                    } else {
                        candidate.set_scalar(field, s.clone())?;
                    }
                }
                FieldValue::Blob(blob) => blobs.push((field.as_str(), blob)),
            }
        }

        // Reference-backed scalars wait for their dropdown option to exist.
        // A field that never hydrates keeps its default; the rest of the
        // load proceeds unaffected.
        for (field, value) in deferred {
            if self.await_option(field, value).await {
                candidate.set_scalar(field, value)?;
            } else {
                tracing::debug!(field, value, "hydration timed out, field skipped");
            }
        }

        candidate.set_locked(wants_locked);

        // Commit point: primitive state lands in one swap.
        *state::write(&self.sheet) = candidate;

        // Collaborator sections are opaque; a bad blob is that section's
        // problem, not the import's.
        for (section, blob) in blobs {
            match self.registry.get(section) {
                Some(collaborator) => {
                    if let Err(err) = collaborator.load(blob) {
                        tracing::warn!(section, error = %err, "collaborator rejected section");
                    }
                }
                None => tracing::warn!(section, "no collaborator registered, section skipped"),
            }
        }
        Ok(())
    }

    async fn await_option(&self, field: &str, value: &str) -> bool {
        for attempt in 0..self.hydration_attempts {
            if self.catalog.has_option(field, value).await {
                return true;
            }
            if attempt + 1 < self.hydration_attempts {
                tokio::time::sleep(self.hydration_delay).await;
            }
        }
        false
    }
}
