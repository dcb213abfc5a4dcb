//! File-backed storage: one file per key under a directory.
//!
//! Writes go to a temporary file first and are renamed into place, so a
//! crash never leaves a half-written value behind. Change events only reach
//! handles cloned from the same [`FileStorage`] in this process.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{KeyValueStore, StorageEvent, EVENT_CAPACITY};
use crate::error::StorageError;

const FILE_EXTENSION: &str = "json";

/// Directory of JSON files, one per key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    events: broadcast::Sender<StorageEvent>,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self { dir, events })
    }

    /// The directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_key(key), FILE_EXTENSION))
    }
}

/// Map a key to a portable file name. Bytes outside `[A-Za-z0-9._-]` are
/// written as `~xx` hex escapes so distinct keys never collide.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("~{:02x}", byte)),
        }
    }
    out
}

#[async_trait]
impl KeyValueStore for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", encode_key(key), uuid::Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&tmp, value.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tokio::fs::rename(&tmp, &path).await?;

        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            new_value: Some(value),
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                let _ = self.events.send(StorageEvent {
                    key: key.to_string(),
                    new_value: None,
                });
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
