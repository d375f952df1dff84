//! JSON export/import for character sheets.
//!
//! Exports a complete sheet snapshot that can be re-imported later or moved
//! between installations.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use sheetbldr_domain::{export_filename, Snapshot};

use crate::codec::SnapshotCodec;
use crate::error::EngineError;

/// Complete export envelope: metadata plus the sheet snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetExport {
    pub metadata: ExportMetadata,
    pub character: Snapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub version: String,
    pub exported_at: String,
    pub engine_version: String,
}

/// JSON exporter for the live sheet.
pub struct JsonExporter {
    codec: Arc<SnapshotCodec>,
}

impl JsonExporter {
    pub fn new(codec: Arc<SnapshotCodec>) -> Self {
        Self { codec }
    }

    /// Export the live sheet as it is right now.
    pub fn export(&self) -> SheetExport {
        SheetExport {
            metadata: ExportMetadata {
                version: "1.0".to_string(),
                exported_at: chrono::Utc::now().to_rfc3339(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            character: self.codec.gather(),
        }
    }

    /// Export to pretty-printed JSON.
    pub fn export_to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    /// Export to minified JSON.
    pub fn export_to_json_compressed(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.export())?)
    }

    /// Download filename: the character name sanitized to `[a-z0-9_-]`,
    /// plus `.json`.
    pub fn filename(&self) -> String {
        let snapshot = self.codec.gather();
        export_filename(snapshot.scalar("name").unwrap_or_default())
    }
}

/// Parse an import file: either a full export envelope or a bare snapshot.
/// Malformed files abort with a validation error before anything is applied.
pub fn parse_import(json: &str) -> Result<Snapshot, EngineError> {
    if let Ok(envelope) = serde_json::from_str::<SheetExport>(json) {
        return Ok(envelope.character);
    }
    serde_json::from_str::<Snapshot>(json)
        .map_err(|e| EngineError::validation(format!("malformed import file: {e}")))
}
