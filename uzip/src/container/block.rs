use std::sync::atomic::{AtomicU64, Ordering};

use log::{trace, warn};

use super::codec::Codec;
use super::index::BlockBounds;
use super::storage::ReadAt;
use crate::error::{ContainerError, Result};

/// Running totals of the work done by reads on one container
#[derive(Debug, Default)]
pub struct ReadStats {
    blocks_decompressed: AtomicU64,
    sparse_blocks: AtomicU64,
    bytes_read: AtomicU64,
}

impl ReadStats {
    /// Number of times a codec was invoked
    pub fn blocks_decompressed(&self) -> u64 {
        self.blocks_decompressed.load(Ordering::Relaxed)
    }

    /// Number of sparse blocks served without touching storage
    pub fn sparse_blocks(&self) -> u64 {
        self.sparse_blocks.load(Ordering::Relaxed)
    }

    /// Compressed bytes fetched from storage
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub(crate) fn record_sparse(&self) {
        self.sparse_blocks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Fetch and decompress a single block.
///
/// `bounds` must come from the container's index for `block`. The returned
/// buffer is always exactly `block_size` bytes long.
pub(crate) fn load_block<S>(
    storage: &S,
    codec: Codec,
    block: u32,
    bounds: BlockBounds,
    block_size: u32,
    stats: &ReadStats,
) -> Result<Vec<u8>>
where S: ReadAt + ?Sized
{
    let block_size = block_size as usize;
    if bounds.is_sparse() {
        stats.record_sparse();
        return Ok(vec![0; block_size]);
    }

    let storage_err = |source| ContainerError::StorageReadError {
        block,
        offset: bounds.start,
        len: bounds.len,
        source,
    };
    let len = usize::try_from(bounds.len).map_err(|_| {
        storage_err(std::io::Error::new(std::io::ErrorKind::InvalidData, "block too large"))
    })?;
    let mut compressed = vec![0; len];
    storage.read_exact_at(&mut compressed, bounds.start).map_err(storage_err)?;
    stats.bytes_read.fetch_add(bounds.len, Ordering::Relaxed);

    trace!("block {block}: {} compressed bytes at {:#x}", bounds.len, bounds.start);
    stats.blocks_decompressed.fetch_add(1, Ordering::Relaxed);
    codec.decompress(block, &compressed, block_size).map_err(|e| {
        warn!("{e}");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// A storage that fails every read, to prove sparse blocks never touch it
    struct Unreadable;

    impl ReadAt for Unreadable {
        fn read_at(&self, _buf: &mut [u8], _offset: u64) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "storage must not be read"))
        }

        fn size(&self) -> io::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_sparse_block() -> Result<()> {
        let stats = ReadStats::default();
        let bounds = BlockBounds { start: 500, len: 0 };
        let data = load_block(&Unreadable, Codec::Deflate, 0, bounds, 16, &stats)?;
        assert_eq!(data, vec![0; 16]);
        assert_eq!(stats.sparse_blocks(), 1);
        assert_eq!(stats.blocks_decompressed(), 0);
        Ok(())
    }

    #[test]
    fn test_short_storage() {
        let stats = ReadStats::default();
        let storage = vec![0u8; 100];
        let bounds = BlockBounds { start: 90, len: 20 };
        let err = load_block(&storage, Codec::Deflate, 7, bounds, 16, &stats).unwrap_err();
        assert!(matches!(err, ContainerError::StorageReadError { block: 7, offset: 90, .. }));
        assert_eq!(stats.blocks_decompressed(), 0);
    }

    #[test]
    fn test_storage_failure() {
        let stats = ReadStats::default();
        let bounds = BlockBounds { start: 0, len: 4 };
        let err = load_block(&Unreadable, Codec::Deflate, 1, bounds, 16, &stats).unwrap_err();
        assert!(matches!(err, ContainerError::StorageReadError { block: 1, .. }));
    }
}
