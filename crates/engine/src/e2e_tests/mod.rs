//! End-to-end scenario tests across the whole pipeline: interaction ->
//! widget mutation -> bus -> derived recompute -> debounced save -> storage,
//! and back in through the load path.

use std::sync::Arc;
use std::time::Duration;

use sheetbldr_domain::{CharacterId, TrackKind};

use crate::config::EngineConfig;
use crate::context::SheetContext;
use crate::error::EngineError;
use crate::export::parse_import;
use crate::state;
use crate::store::{MemoryStore, SqliteStore, StaticOptionCatalog};

/// Route engine logs through the test harness; `RUST_LOG=sheetbldr_engine=debug`
/// makes the save lifecycle visible when a scenario goes sideways.
fn init_diagnostics() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn memory_context(store: Arc<MemoryStore>) -> SheetContext {
    SheetContext::new(
        EngineConfig::default(),
        store,
        Arc::new(StaticOptionCatalog::new()),
    )
    .await
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_interactions_debounce_into_one_save_with_final_state() {
    init_diagnostics();
    let store = Arc::new(MemoryStore::new());
    let context = memory_context(store.clone()).await;
    let id = state::read(context.sheet()).id();

    // A burst of edits inside one quiescence window.
    context.click_rating("stamina", 3).unwrap(); // stamina 4, health 7
    context.click_track(TrackKind::Health, 0).unwrap();
    context.click_track(TrackKind::Health, 0).unwrap(); // box 0 aggravated
    context.set_scalar("name", "Lucien").unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;

    assert_eq!(store.save_count(), 1, "one save for the whole burst");
    let saved = store.snapshot_for(id).await.unwrap();
    assert_eq!(saved.scalar("name"), Some("Lucien"));
    let health = saved.track("health").unwrap();
    assert_eq!(health.max, 7);
    assert_eq!(health.aggravated, Some(1));
    assert_eq!(health.current, 6);
}

#[tokio::test]
async fn test_import_file_roundtrip_through_export() {
    let context = memory_context(Arc::new(MemoryStore::new())).await;
    context.set_scalar("name", "Lucien de Moreau").unwrap();
    context.click_rating("resolve", 2).unwrap(); // willpower 3 + composure 1 = 4
    context.add_stain();

    let exporter = context.exporter();
    let file = exporter.export_to_json().unwrap();
    assert_eq!(exporter.filename(), "lucien_de_moreau.json");
    let before = context.gather_character_data();

    // Import into a fresh context.
    let fresh = memory_context(Arc::new(MemoryStore::new())).await;
    let snapshot = parse_import(&file).unwrap();
    fresh.load_character_data(&snapshot).await.unwrap();
    assert_eq!(fresh.gather_character_data(), before);
}

#[tokio::test]
async fn test_malformed_import_leaves_sheet_untouched() {
    let context = memory_context(Arc::new(MemoryStore::new())).await;
    context.set_scalar("name", "Lucien").unwrap();

    let snapshot = parse_import(
        r#"{"name":"Broken","willpower":{"max":3,"current":0,"superficial":2,"aggravated":2,"type":"willpower"}}"#,
    )
    .unwrap();
    let err = context.load_character_data(&snapshot).await.unwrap_err();
    assert!(matches!(err, EngineError::Domain(_)));

    let live = context.gather_character_data();
    assert_eq!(live.scalar("name"), Some("Lucien"));
    assert_eq!(live.track("willpower").unwrap().superficial, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_character_switch_mid_save_keeps_records_separate() {
    init_diagnostics();
    let store = Arc::new(MemoryStore::with_latency(Duration::from_millis(800)));
    let context = memory_context(store.clone()).await;
    let a = state::read(context.sheet()).id();
    context.set_scalar("name", "Aline").unwrap();

    // Let A's save fire and block in I/O.
    tokio::time::sleep(Duration::from_millis(550)).await;

    let b = CharacterId::new();
    context.switch_character(b, None).await.unwrap();
    context.set_scalar("name", "Bertrand").unwrap();

    // A's save resolves mid-window and is discarded; B's own debounce then
    // saves under B's key.
    tokio::time::sleep(Duration::from_millis(2000)).await;

    let saved_a = store.snapshot_for(a).await.unwrap();
    assert_eq!(saved_a.scalar("name"), Some("Aline"));
    let saved_b = store.snapshot_for(b).await.unwrap();
    assert_eq!(saved_b.scalar("name"), Some("Bertrand"));
    let (current, _) = store.load_current().await.unwrap().unwrap();
    assert_eq!(current, b, "active pointer follows the switch, not the late save");
}

#[tokio::test]
async fn test_sqlite_end_to_end_restart_restores_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("sheets.db").display());

    let id;
    {
        let store = Arc::new(SqliteStore::connect(&url).await.unwrap());
        let context = SheetContext::new(
            EngineConfig::default(),
            store,
            Arc::new(StaticOptionCatalog::new()),
        )
        .await
        .unwrap();
        id = state::read(context.sheet()).id();
        context.set_scalar("name", "Lucien").unwrap();
        context.click_rating("stamina", 1).unwrap(); // health 5
        context.click_track(TrackKind::Health, 2).unwrap();
        context
            .registry()
            .get("disciplines")
            .unwrap()
            .load(&serde_json::json!({"celerity": 2}))
            .unwrap();
        context.shutdown().await;
    }

    // "Restart": a brand new context over the same database.
    let store = Arc::new(SqliteStore::connect(&url).await.unwrap());
    let context = SheetContext::new(
        EngineConfig::default(),
        store,
        Arc::new(StaticOptionCatalog::new()),
    )
    .await
    .unwrap();

    assert_eq!(state::read(context.sheet()).id(), id);
    let snapshot = context.gather_character_data();
    assert_eq!(snapshot.scalar("name"), Some("Lucien"));
    assert_eq!(snapshot.track("health").unwrap().max, 5);
    assert_eq!(snapshot.track("health").unwrap().superficial, Some(1));
    assert_eq!(
        snapshot.blob("disciplines"),
        Some(&serde_json::json!({"celerity": 2}))
    );
}

#[tokio::test(start_paused = true)]
async fn test_collaborator_change_marks_sheet_dirty() {
    let store = Arc::new(MemoryStore::new());
    let context = memory_context(store.clone()).await;
    let id = state::read(context.sheet()).id();

    context
        .registry()
        .get("experience")
        .unwrap()
        .load(&serde_json::json!({"total": 35, "spent": 12}))
        .unwrap();
    // The owning panel announces its change on the bus.
    context.bus().emit(
        "collaborator_changed",
        sheetbldr_domain::SheetEvent::CollaboratorChanged {
            section: "experience".to_string(),
        },
        crate::bus::EmitOptions::default(),
    );

    tokio::time::sleep(Duration::from_millis(700)).await;
    let saved = store.snapshot_for(id).await.unwrap();
    assert_eq!(saved.blob("experience"), Some(&serde_json::json!({"total": 35, "spent": 12})));
}
