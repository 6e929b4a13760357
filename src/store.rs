//! Durable store for samples that could not be delivered.
//!
//! The store is a single flat JSON file. Writes go to a sibling temporary
//! path and are renamed into place, so the file always parses as a complete
//! document no matter when the process dies.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sample::{Batch, Sample};

/// Schema version written into the buffer file.
const STORE_VERSION: u32 = 1;

/// Errors from buffer file operations.
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem operation failed
    Io {
        op: &'static str,
        source: std::io::Error,
    },

    /// Pending samples could not be serialized
    Serialize(serde_json::Error),
}

impl StoreError {
    fn io(op: &'static str, source: std::io::Error) -> Self {
        StoreError::Io { op, source }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io { op, source } => write!(f, "Buffer file {} failed: {}", op, source),
            StoreError::Serialize(e) => {
                write!(f, "Failed to serialize pending samples: {}", e)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Serialize(e) => Some(e),
        }
    }
}

/// On-disk form of the buffer file.
#[derive(Debug, Serialize, Deserialize)]
struct StoredBuffer {
    version: u32,
    samples: Vec<Sample>,
}

/// The current envelope, or the bare array written by older builds.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    Envelope(StoredBuffer),
    Bare(Vec<Sample>),
}

impl StoredDocument {
    fn into_batch(self) -> Batch {
        match self {
            StoredDocument::Envelope(doc) => {
                if doc.version != STORE_VERSION {
                    warn!(
                        version = doc.version,
                        "buffer file written by a different version; loading anyway"
                    );
                }
                Batch::new(doc.samples)
            }
            StoredDocument::Bare(samples) => Batch::new(samples),
        }
    }
}

/// Durable store bound to one buffer file path.
///
/// The file exists exactly while there are undelivered samples: `save`
/// creates or overwrites it, `clear` removes it, and an absent file is the
/// normal caught-up state. The delivery engine is the only writer.
pub struct BufferStore {
    path: PathBuf,
}

impl BufferStore {
    /// Create a store for the given buffer file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the persisted batch.
    ///
    /// An absent file yields an empty batch. An unreadable or unparsable
    /// file is logged and also yields an empty batch; corruption costs at
    /// most the contents of that one file.
    pub fn load(&self) -> Batch {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no buffer file; nothing pending");
                return Batch::default();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read buffer file; treating as empty"
                );
                return Batch::default();
            }
        };

        match serde_json::from_str::<StoredDocument>(&raw) {
            Ok(doc) => {
                let batch = doc.into_batch();
                debug!(samples = batch.len(), "recovered pending samples");
                batch
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "buffer file is corrupt; treating as empty"
                );
                Batch::default()
            }
        }
    }

    /// Persist a batch, replacing any previous contents.
    ///
    /// The document is written to a temporary sibling and renamed into
    /// place, so readers never observe a partial file.
    pub fn save(&self, batch: &Batch) -> Result<(), StoreError> {
        let doc = StoredBuffer {
            version: STORE_VERSION,
            samples: batch.samples().to_vec(),
        };
        let json = serde_json::to_string(&doc).map_err(StoreError::Serialize)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::io("write", e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io("rename", e))?;

        debug!(
            samples = batch.len(),
            path = %self.path.display(),
            "persisted pending samples"
        );
        Ok(())
    }

    /// Remove the buffer file. Removing an absent file is success.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "cleared buffer file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("remove", e)),
        }
    }
}
