//! Mapping File Loader
//!
//! Reads the line-delimited mapping file into an immutable, position-indexed
//! record list. Bad lines are counted and logged, never fatal.

use super::types::{DocumentRecord, MalformedRecord};
use crate::error::LoadError;

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// In-memory metadata, indexed by vector-id.
#[derive(Debug)]
pub struct MetadataStore {
    records: Vec<DocumentRecord>,
    skipped: usize,
    path: PathBuf,
}

impl MetadataStore {
    /// Loads the mapping file at `path`.
    ///
    /// Fails only when the file itself cannot be opened or read; individual
    /// malformed lines are skipped and reported through [`skipped`](Self::skipped).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
        let store = Self::from_reader(file, path)?;

        tracing::info!(
            "[mapping] loaded={} skipped={} path={}",
            store.len(),
            store.skipped,
            path.display()
        );
        Ok(store)
    }

    /// Parses mapping lines from any reader. `source` is only used for diagnostics.
    pub fn from_reader<R: Read>(reader: R, source: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let path = source.into();
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (line_no, chunk) in BufReader::new(reader).split(b'\n').enumerate() {
            let bytes = chunk.map_err(|e| LoadError::io(&path, e))?;

            match parse_raw_line(&bytes) {
                None => continue,
                Some(Ok(record)) => records.push(record),
                Some(Err(err)) => {
                    skipped += 1;
                    tracing::warn!("[mapping] line {} invalid: {}", line_no + 1, err);
                }
            }
        }

        Ok(Self {
            records,
            skipped,
            path,
        })
    }

    /// Record for `id`, or `None` when the id is negative or past the end.
    pub fn get(&self, id: i64) -> Option<&DocumentRecord> {
        usize::try_from(id).ok().and_then(|i| self.records.get(i))
    }

    /// Number of records loaded successfully.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of non-blank lines that failed to parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `None` for blank lines, otherwise the parse outcome.
fn parse_raw_line(bytes: &[u8]) -> Option<Result<DocumentRecord, MalformedRecord>> {
    let line = match std::str::from_utf8(bytes) {
        Ok(line) => line.trim(),
        Err(_) => return Some(Err(MalformedRecord::InvalidUtf8)),
    };

    if line.is_empty() {
        return None;
    }

    Some(DocumentRecord::parse_line(line))
}
