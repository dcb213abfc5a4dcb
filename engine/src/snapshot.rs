//! Export documents for moving a collection in and out of the engine.
//!
//! An export is a self-describing JSON document. Importing it reproduces an
//! equivalent collection; documents from a newer format are rejected rather
//! than half-read.

use crate::{error::Result, Collection, CollectionStats, Error, Timestamp};
use serde::{Deserialize, Serialize};

/// Version of the export format for future compatibility.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// A point-in-time export of the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionExport {
    /// Export format version
    pub format_version: u32,
    /// When the export was taken (milliseconds since epoch)
    pub exported_at: Timestamp,
    /// The exported cards
    pub collection: Collection,
}

impl CollectionExport {
    /// Create an export of `collection`.
    pub fn new(collection: Collection, exported_at: Timestamp) -> Self {
        Self {
            format_version: EXPORT_FORMAT_VERSION,
            exported_at,
            collection,
        }
    }

    /// Aggregates of the exported cards.
    pub fn stats(&self) -> CollectionStats {
        self.collection.stats()
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let export: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if export.format_version > EXPORT_FORMAT_VERSION {
            return Err(Error::UnsupportedFormat {
                found: export.format_version,
                supported: EXPORT_FORMAT_VERSION,
            });
        }

        Ok(export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Collection {
        let mut collection = Collection::new();
        collection.add("card-1", 2, false);
        collection.add("card-1", 1, true);
        collection.add("card-2", 4, true);
        collection
    }

    #[test]
    fn export_import_reproduces_collection() {
        let export = CollectionExport::new(sample(), 1_706_745_600_000);
        let json = export.to_json().unwrap();
        let imported = CollectionExport::from_json(&json).unwrap();

        assert_eq!(imported.collection, sample());
        assert_eq!(imported.exported_at, 1_706_745_600_000);
        assert_eq!(imported.format_version, EXPORT_FORMAT_VERSION);
    }

    #[test]
    fn pretty_json_is_readable() {
        let export = CollectionExport::new(sample(), 1);
        let json = export.to_json_pretty().unwrap();
        assert!(json.contains('\n'));
        assert!(json.contains("\"formatVersion\": 1"));
        assert_eq!(CollectionExport::from_json(&json).unwrap(), export);
    }

    #[test]
    fn reject_future_format() {
        let json = r#"{"formatVersion":99,"exportedAt":0,"collection":{}}"#;
        assert_eq!(
            CollectionExport::from_json(json),
            Err(Error::UnsupportedFormat {
                found: 99,
                supported: EXPORT_FORMAT_VERSION
            })
        );
    }

    #[test]
    fn reject_garbage() {
        assert!(matches!(
            CollectionExport::from_json("{\"collection\": 3}"),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn stats_of_export() {
        let export = CollectionExport::new(sample(), 0);
        assert_eq!(export.stats().total_cards, 7);
    }
}
