//! Index Artifact Format
//!
//! ```text
//! [ ArtifactHeader ][ IndexArtifact ]
//!   bincode           bincode
//! ```
//!
//! The header carries a magic tag and a format version so that a wrong or
//! truncated file is reported as corrupt instead of being misread. After the
//! body is decoded every buffer length and list id is checked against the
//! declared dimension before the index is handed out.

use super::VectorIndex;
use super::flat::FlatIndex;
use super::ivf::IvfFlatIndex;
use crate::error::LoadError;

use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

pub const MAGIC: [u8; 8] = *b"TSVIDX\0\0";
pub const FORMAT_VERSION: u16 = 1;

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactHeader {
    magic: [u8; 8],
    version: u16,
}

/// Serialized body of an index file.
#[derive(Debug, Serialize, Deserialize)]
pub enum IndexArtifact {
    Flat(FlatIndex),
    IvfFlat(IvfFlatIndex),
}

impl IndexArtifact {
    fn kind(&self) -> &'static str {
        match self {
            Self::Flat(_) => "flat",
            Self::IvfFlat(_) => "ivf-flat",
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Flat(index) => {
                let dim = index.dimension();
                if dim == 0 {
                    return Err("dimension is zero".into());
                }
                if index.vectors().len() % dim != 0 {
                    return Err(format!(
                        "vector buffer of {} floats is not a multiple of dimension {}",
                        index.vectors().len(),
                        dim
                    ));
                }
            }
            Self::IvfFlat(index) => {
                let dim = index.dimension();
                if dim == 0 {
                    return Err("dimension is zero".into());
                }
                if index.nlist() == 0 {
                    return Err("index has no inverted lists".into());
                }
                if index.centroids().len() != index.nlist() * dim {
                    return Err(format!(
                        "expected {} centroid floats, found {}",
                        index.nlist() * dim,
                        index.centroids().len()
                    ));
                }
                if index.default_nprobe() == 0 {
                    return Err("stored nprobe is zero".into());
                }

                // Ids across all lists must be exactly `0..total`, each once.
                let total = index.len() as i64;
                let mut seen = vec![false; index.len()];
                for (n, list) in index.lists().iter().enumerate() {
                    if list.vectors.len() != list.ids.len() * dim {
                        return Err(format!(
                            "list {} holds {} ids but {} floats",
                            n,
                            list.ids.len(),
                            list.vectors.len()
                        ));
                    }
                    for &id in &list.ids {
                        if id < 0 || id >= total {
                            return Err(format!("list {} contains out-of-range id {}", n, id));
                        }
                        let slot = &mut seen[id as usize];
                        if *slot {
                            return Err(format!("list {} repeats id {}", n, id));
                        }
                        *slot = true;
                    }
                }
            }
        }
        Ok(())
    }

    fn into_index(self) -> Arc<dyn VectorIndex> {
        match self {
            Self::Flat(index) => Arc::new(index),
            Self::IvfFlat(index) => Arc::new(index),
        }
    }
}

/// Reads and validates the index artifact at `path`.
pub fn load_index(path: impl AsRef<Path>) -> Result<Arc<dyn VectorIndex>, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    // Length prefixes may not claim more bytes than the file holds.
    let limit = file.metadata().map_err(|e| LoadError::io(path, e))?.len();
    let mut reader = BufReader::new(file);

    let header: ArtifactHeader = codec()
        .with_limit(limit)
        .deserialize_from(&mut reader)
        .map_err(|e| LoadError::corrupt(path, format!("unreadable header: {}", e)))?;
    if header.magic != MAGIC {
        return Err(LoadError::corrupt(path, "not a vector index file (bad magic)"));
    }
    if header.version != FORMAT_VERSION {
        return Err(LoadError::corrupt(
            path,
            format!("unsupported format version {}", header.version),
        ));
    }

    let artifact: IndexArtifact = codec()
        .with_limit(limit)
        .deserialize_from(&mut reader)
        .map_err(|e| LoadError::corrupt(path, format!("unreadable body: {}", e)))?;
    artifact
        .validate()
        .map_err(|reason| LoadError::corrupt(path, reason))?;

    let kind = artifact.kind();
    let index = artifact.into_index();
    tracing::info!(
        "[index] loaded {} index: {} vectors, dim={}, path={}",
        kind,
        index.len(),
        index.dimension(),
        path.display()
    );
    Ok(index)
}

/// Writes `artifact` to `path` in the format read by [`load_index`].
pub fn save_index(path: impl AsRef<Path>, artifact: &IndexArtifact) -> Result<(), LoadError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| LoadError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    let header = ArtifactHeader {
        magic: MAGIC,
        version: FORMAT_VERSION,
    };
    codec()
        .serialize_into(&mut writer, &header)
        .and_then(|_| codec().serialize_into(&mut writer, artifact))
        .map_err(|e| LoadError::corrupt(path, format!("failed to encode index: {}", e)))?;
    writer.flush().map_err(|e| LoadError::io(path, e))?;

    Ok(())
}
