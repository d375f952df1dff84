//! Persistence coordinator - debounced, race-safe saves.
//!
//! Interaction signals (re)arm a single quiescence timer; only a timer that
//! fires uninterrupted runs a save. At most one save is ever in flight: a
//! timer firing during an in-flight save marks a rerun that executes
//! immediately after the in-flight one resolves. Saves gather live state at
//! the moment they run, so intermediate missed triggers are harmless.
//!
//! Saves are tagged with the character they started for; a save resolving
//! after a character switch is discarded. Failures are logged, never thrown
//! into the interaction path, and leave the dirty flag set so the next
//! signal retries.
//!
//! The two concerns are kept separate: a canceling scheduler (one
//! outstanding deadline, replaced on each signal) composed with an
//! in-flight guard, rather than both interleaved in one timer callback.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use sheetbldr_domain::{CharacterId, SheetEvent};

use crate::bus::{EventBus, ListenerId, SubscribeOptions};
use crate::codec::SnapshotCodec;
use crate::error::StoreError;
use crate::store::CharacterStore;

/// Runs after every state-settling listener on interaction topics.
pub const PERSIST_PRIORITY: i32 = -100;

enum Command {
    /// An interaction signal: (re)arm the quiescence timer.
    Dirty,
    /// The active character changed; cancel pending work for the old one.
    SetActive(CharacterId),
    /// Save now (if anything is dirty) and ack once storage is quiet.
    Flush(oneshot::Sender<()>),
    /// A spawned save resolved.
    SaveFinished {
        character: CharacterId,
        outcome: SaveOutcome,
    },
    Shutdown,
}

enum SaveOutcome {
    Saved,
    /// The live sheet no longer belonged to the tagged character when the
    /// save ran; nothing was written.
    SkippedStaleSheet,
    Failed(StoreError),
}

pub struct PersistenceCoordinator {
    tx: mpsc::UnboundedSender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceCoordinator {
    /// Start the coordinator's background worker.
    pub fn spawn(
        store: Arc<dyn CharacterStore>,
        codec: Arc<SnapshotCodec>,
        debounce: Duration,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            rx,
            tx: tx.clone(),
            store,
            active: codec.character_id(),
            codec,
            debounce,
            dirty: false,
            deadline: None,
            in_flight: false,
            pending_rerun: false,
            flush_acks: Vec::new(),
        };
        let handle = tokio::spawn(worker.run());
        Arc::new(Self {
            tx,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Subscribe `mark_dirty` to every interaction topic on the bus.
    pub fn attach(self: &Arc<Self>, bus: &Arc<EventBus>) -> Vec<ListenerId> {
        SheetEvent::interaction_types()
            .iter()
            .map(|topic| {
                let coordinator = Arc::clone(self);
                bus.on(
                    topic,
                    SubscribeOptions {
                        priority: PERSIST_PRIORITY,
                        component: None,
                    },
                    Arc::new(move |_| {
                        coordinator.mark_dirty();
                        Ok(())
                    }),
                )
            })
            .collect()
    }

    /// Signal that sheet state changed. Cheap and synchronous; callable
    /// from inside bus dispatch.
    pub fn mark_dirty(&self) {
        let _ = self.tx.send(Command::Dirty);
    }

    /// Cancel pending work for the previous character and start tracking
    /// `id`. Any in-flight save keeps its old tag and will be discarded.
    pub fn set_active_character(&self, id: CharacterId) {
        let _ = self.tx.send(Command::SetActive(id));
    }

    /// Persist immediately (when dirty) and wait for storage to go quiet.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Flush, then stop the worker.
    pub async fn shutdown(&self) {
        self.flush().await;
        let _ = self.tx.send(Command::Shutdown);
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

struct Worker {
    rx: mpsc::UnboundedReceiver<Command>,
    tx: mpsc::UnboundedSender<Command>,
    store: Arc<dyn CharacterStore>,
    codec: Arc<SnapshotCodec>,
    debounce: Duration,
    active: CharacterId,
    dirty: bool,
    deadline: Option<Instant>,
    in_flight: bool,
    pending_rerun: bool,
    flush_acks: Vec<oneshot::Sender<()>>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let command = match self.deadline {
                Some(deadline) => {
                    tokio::select! {
                        command = self.rx.recv() => match command {
                            Some(command) => Some(command),
                            None => break,
                        },
                        _ = tokio::time::sleep_until(deadline) => None,
                    }
                }
                None => match self.rx.recv().await {
                    Some(command) => Some(command),
                    None => break,
                },
            };

            match command {
                None => self.on_timer_fired(),
                Some(Command::Dirty) => {
                    self.dirty = true;
                    self.deadline = Some(Instant::now() + self.debounce);
                }
                Some(Command::SetActive(id)) => {
                    self.active = id;
                    self.deadline = None;
                    self.dirty = false;
                    self.pending_rerun = false;
                }
                Some(Command::Flush(ack)) => self.on_flush(ack),
                Some(Command::SaveFinished { character, outcome }) => {
                    self.on_save_finished(character, outcome);
                }
                Some(Command::Shutdown) => break,
            }
        }
    }

    fn on_timer_fired(&mut self) {
        self.deadline = None;
        if self.in_flight {
            // Never two writes concurrently: the new request runs right
            // after the in-flight one resolves.
            self.pending_rerun = true;
            self.dirty = false;
        } else {
            self.start_save();
        }
    }

    fn on_flush(&mut self, ack: oneshot::Sender<()>) {
        if self.in_flight {
            if self.dirty || self.deadline.is_some() {
                self.pending_rerun = true;
                self.dirty = false;
                self.deadline = None;
            }
            self.flush_acks.push(ack);
        } else if self.dirty || self.deadline.is_some() {
            self.deadline = None;
            self.start_save();
            self.flush_acks.push(ack);
        } else {
            let _ = ack.send(());
        }
    }

    fn on_save_finished(&mut self, character: CharacterId, outcome: SaveOutcome) {
        self.in_flight = false;
        if character != self.active {
            // A character switch happened while the save was in flight; its
            // result no longer concerns the live sheet.
            tracing::info!(%character, "discarding save result for inactive character");
        } else {
            match outcome {
                SaveOutcome::Saved => {
                    tracing::debug!(%character, "sheet persisted");
                }
                SaveOutcome::SkippedStaleSheet => {
                    tracing::info!(%character, "save skipped, sheet was replaced before gather");
                }
                SaveOutcome::Failed(err) => {
                    // Swallowed here on purpose: the next interaction
                    // signal retries.
                    tracing::warn!(%character, error = %err, "save failed, sheet stays dirty");
                    self.dirty = true;
                }
            }
        }

        if self.pending_rerun {
            self.pending_rerun = false;
            self.start_save();
        } else {
            for ack in self.flush_acks.drain(..) {
                let _ = ack.send(());
            }
        }
    }

    fn start_save(&mut self) {
        self.dirty = false;
        self.in_flight = true;
        let character = self.active;
        let store = Arc::clone(&self.store);
        let codec = Arc::clone(&self.codec);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // Gather at fire time, never at schedule time. If the live
            // sheet was already swapped for another character, abandon the
            // save instead of writing the new character's data under the
            // old character's key.
            let outcome = if codec.character_id() != character {
                SaveOutcome::SkippedStaleSheet
            } else {
                let snapshot = codec.gather();
                match store.save(character, &snapshot).await {
                    Ok(()) => SaveOutcome::Saved,
                    Err(err) => SaveOutcome::Failed(err),
                }
            };
            let _ = tx.send(Command::SaveFinished { character, outcome });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::standard_registry;
    use crate::config::EngineConfig;
    use crate::state::{self, SharedSheet};
    use crate::store::{MemoryStore, StaticOptionCatalog};
    use sheetbldr_domain::CharacterSheet;

    const DEBOUNCE: Duration = Duration::from_millis(500);

    fn rig(store: Arc<MemoryStore>) -> (Arc<PersistenceCoordinator>, SharedSheet, CharacterId) {
        let id = CharacterId::new();
        let sheet = state::shared(CharacterSheet::new(id));
        let codec = SnapshotCodec::new(
            sheet.clone(),
            standard_registry(),
            Arc::new(StaticOptionCatalog::new()),
            &EngineConfig::default(),
        );
        let coordinator = PersistenceCoordinator::spawn(store, codec, DEBOUNCE);
        (coordinator, sheet, id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_signals_one_debounce_window_one_save() {
        let store = Arc::new(MemoryStore::new());
        let (coordinator, sheet, id) = rig(store.clone());

        for _ in 0..5 {
            coordinator.mark_dirty();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        // State keeps changing until just before the timer fires; the saved
        // snapshot must reflect fire-time state, not first-signal state.
        state::write(&sheet).set_scalar("name", "Lucien").unwrap();
        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(store.save_count(), 1);
        let saved = store.snapshot_for(id).await.unwrap();
        assert_eq!(saved.scalar("name"), Some("Lucien"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_signal_rearms_the_timer() {
        let store = Arc::new(MemoryStore::new());
        let (coordinator, _sheet, _id) = rig(store.clone());

        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.save_count(), 0);
        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(400)).await;
        // 800ms after the first signal, but only 400ms of quiescence.
        assert_eq!(store.save_count(), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_during_in_flight_save_reruns_after() {
        // Saves take a full second; the second debounce window elapses while
        // the first save is still writing.
        let store = Arc::new(MemoryStore::with_latency(Duration::from_millis(1000)));
        let (coordinator, _sheet, _id) = rig(store.clone());

        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(550)).await; // save 1 in flight
        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(600)).await; // timer fired mid-flight
        assert_eq!(store.save_count(), 0, "no concurrent second write");
        tokio::time::sleep(Duration::from_millis(400)).await; // save 1 resolves
        assert_eq!(store.save_count(), 1);
        tokio::time::sleep(Duration::from_millis(1100)).await; // rerun resolves
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_save_for_switched_character_is_discarded() {
        let store = Arc::new(MemoryStore::with_latency(Duration::from_millis(1000)));
        let (coordinator, sheet, a) = rig(store.clone());
        state::write(&sheet).set_scalar("name", "Aline").unwrap();

        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(550)).await; // save for A gathers, then blocks in I/O

        // Switch to character B while A's save is in flight.
        let b = CharacterId::new();
        let mut b_sheet = CharacterSheet::new(b);
        b_sheet.set_scalar("name", "Bertrand").unwrap();
        *state::write(&sheet) = b_sheet;
        coordinator.set_active_character(b);

        tokio::time::sleep(Duration::from_millis(1100)).await; // A's save resolves

        // A's snapshot landed under A's key; B has no record and B's live
        // state is untouched.
        let saved_a = store.snapshot_for(a).await.unwrap();
        assert_eq!(saved_a.scalar("name"), Some("Aline"));
        assert!(store.snapshot_for(b).await.is_none());
        assert_eq!(state::read(&sheet).scalar("name"), Some("Bertrand"));
        assert_eq!(store.save_count(), 1, "switch canceled nothing extra");
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_cancels_pending_debounce() {
        let store = Arc::new(MemoryStore::new());
        let (coordinator, sheet, _a) = rig(store.clone());

        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let b = CharacterId::new();
        *state::write(&sheet) = CharacterSheet::new(b);
        coordinator.set_active_character(b);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(store.save_count(), 0, "old character's timer never fired");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sheet_swapped_before_gather_is_not_saved_under_old_key() {
        let store = Arc::new(MemoryStore::new());
        let (coordinator, sheet, a) = rig(store.clone());

        // The sheet is replaced while a save for A is already scheduled:
        // the save must notice at gather time that the live sheet belongs
        // to someone else and abandon the write, not persist B's data under
        // A's key.
        let b = CharacterId::new();
        *state::write(&sheet) = CharacterSheet::new(b);
        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(store.save_count(), 0);
        assert!(store.snapshot_for(a).await.is_none());
        assert!(store.snapshot_for(b).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_retries_on_next_signal() {
        let store = Arc::new(MemoryStore::new());
        let (coordinator, _sheet, id) = rig(store.clone());

        store.set_fail_saves(true).await;
        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(store.save_count(), 1);
        assert!(store.snapshot_for(id).await.is_none());

        store.set_fail_saves(false).await;
        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(store.save_count(), 2);
        assert!(store.snapshot_for(id).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_saves_immediately_and_waits() {
        let store = Arc::new(MemoryStore::new());
        let (coordinator, _sheet, id) = rig(store.clone());

        coordinator.mark_dirty();
        coordinator.flush().await;
        assert_eq!(store.save_count(), 1);
        assert!(store.snapshot_for(id).await.is_some());

        // Nothing dirty: flush is a no-op ack.
        coordinator.flush().await;
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_port_sees_exactly_one_keyed_save() {
        use crate::store::ports::MockCharacterStore;

        let id = CharacterId::new();
        let sheet = state::shared(CharacterSheet::new(id));
        let codec = SnapshotCodec::new(
            sheet,
            standard_registry(),
            Arc::new(StaticOptionCatalog::new()),
            &EngineConfig::default(),
        );

        let mut store = MockCharacterStore::new();
        store
            .expect_save()
            .withf(move |saved_id, _| *saved_id == id)
            .times(1)
            .returning(|_, _| Ok(()));
        let coordinator = PersistenceCoordinator::spawn(Arc::new(store), codec, DEBOUNCE);

        coordinator.mark_dirty();
        coordinator.mark_dirty();
        tokio::time::sleep(Duration::from_millis(600)).await;
        coordinator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_and_stops() {
        let store = Arc::new(MemoryStore::new());
        let (coordinator, _sheet, id) = rig(store.clone());

        coordinator.mark_dirty();
        coordinator.shutdown().await;
        assert_eq!(store.save_count(), 1);
        assert!(store.snapshot_for(id).await.is_some());
    }
}
