//! Chunk archive output: encode, optionally persist, optionally verify.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_voxel::{Chunk, ChunkCodecError, ChunkPos};

/// Errors raised while writing or verifying archives.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive for chunk {pos:?} failed to decode: {source}")]
    Decode {
        pos: ChunkPos,
        #[source]
        source: ChunkCodecError,
    },

    #[error("archive for chunk {0:?} decoded to different contents")]
    Mismatch(ChunkPos),
}

/// Totals from one [`archive_chunks`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub chunks: usize,
    /// In-memory palette storage before encoding.
    pub raw_bytes: usize,
    /// Sum of encoded archive sizes.
    pub compressed_bytes: usize,
    pub written: usize,
    pub verified: usize,
    pub elapsed: Duration,
}

/// `chunk_<x>_<y>_<z>.bin`
pub fn archive_file_name(pos: ChunkPos) -> String {
    format!("chunk_{}_{}_{}.bin", pos.x, pos.y, pos.z)
}

/// Encodes every chunk. Writes each archive into `save_dir` when given and
/// decodes it back for comparison when `verify` is set.
pub fn archive_chunks(
    chunks: &[Arc<Chunk>],
    save_dir: Option<&Path>,
    verify: bool,
) -> Result<ArchiveStats, ArchiveError> {
    let start = Instant::now();
    if let Some(dir) = save_dir {
        std::fs::create_dir_all(dir).map_err(|source| ArchiveError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let mut stats = ArchiveStats::default();
    for chunk in chunks {
        let pos = chunk.position();
        let encoded = chunk.encode();
        stats.chunks += 1;
        stats.raw_bytes += chunk.read().storage_bytes();
        stats.compressed_bytes += encoded.len();

        if let Some(dir) = save_dir {
            let path = dir.join(archive_file_name(pos));
            std::fs::write(&path, &encoded)
                .map_err(|source| ArchiveError::Write { path, source })?;
            stats.written += 1;
        }

        if verify {
            let decoded =
                Chunk::decode(&encoded).map_err(|source| ArchiveError::Decode { pos, source })?;
            if decoded != **chunk {
                return Err(ArchiveError::Mismatch(pos));
            }
            stats.verified += 1;
        }
        tracing::debug!(x = pos.x, y = pos.y, z = pos.z, bytes = encoded.len(), "chunk archived");
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_voxel::{BlockType, Light, LocalPos};

    fn sample_chunks() -> Vec<Arc<Chunk>> {
        let a = Chunk::new(ChunkPos::new(0, 0, 0));
        a.set_block_type_at(LocalPos::new(1, 2, 3), BlockType::Stone);
        a.set_light_at(LocalPos::new(1, 3, 3), Light::new(0, 0, 0, 15));
        let b = Chunk::new(ChunkPos::new(-1, 2, 4));
        vec![Arc::new(a), Arc::new(b)]
    }

    #[test]
    fn test_file_name_includes_negative_coords() {
        assert_eq!(archive_file_name(ChunkPos::new(-1, 2, 4)), "chunk_-1_2_4.bin");
    }

    #[test]
    fn test_encode_only() {
        let stats = archive_chunks(&sample_chunks(), None, false).unwrap();
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.written, 0);
        assert_eq!(stats.verified, 0);
        assert!(stats.compressed_bytes > 0);
    }

    #[test]
    fn test_write_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("archives");
        let chunks = sample_chunks();

        let stats = archive_chunks(&chunks, Some(&out), true).unwrap();
        assert_eq!(stats.written, 2);
        assert_eq!(stats.verified, 2);

        let bytes = std::fs::read(out.join("chunk_0_0_0.bin")).unwrap();
        let decoded = Chunk::decode(&bytes).unwrap();
        assert_eq!(decoded, *chunks[0]);
        assert_eq!(
            decoded.block_type_at(LocalPos::new(1, 2, 3)),
            BlockType::Stone
        );
        assert!(out.join("chunk_-1_2_4.bin").exists());
    }

    #[test]
    fn test_unwritable_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = archive_chunks(&sample_chunks(), Some(&blocker), false).unwrap_err();
        assert!(matches!(err, ArchiveError::Write { .. }));
    }
}
