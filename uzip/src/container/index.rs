use std::cmp;
use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{ContainerError, Result};

/// Location of one compressed block within the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockBounds {
    pub start: u64,
    pub len: u64,
}

impl BlockBounds {
    /// Sparse blocks have no payload and decompress to all zeroes
    pub fn is_sparse(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// The table of `block_count + 1` offsets delimiting each compressed block.
/// Entry `i` is the start of block `i`; the final entry is the end of the last
/// block's payload, not the start of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIndex {
    offsets: Vec<u64>,
}

impl BlockIndex {
    /// Read `block_count + 1` big-endian offsets from the current position
    pub fn read<R>(r: &mut R, block_count: u32) -> Result<BlockIndex>
    where R: Read
    {
        let entries = u64::from(block_count) + 1;
        // The count comes from an untrusted header, so let a short file fail
        // the read instead of reserving the whole table up front.
        let mut offsets = Vec::with_capacity(cmp::min(entries, 1 << 16) as usize);
        for _ in 0..entries {
            let off = r.read_u64::<BigEndian>()
                .map_err(|e| ContainerError::from_header_io(e, "offset table"))?;
            offsets.push(off);
        }
        Ok(BlockIndex { offsets })
    }

    /// Build an index from already-decoded offsets. The table must hold at
    /// least the trailing end offset.
    pub fn from_offsets(offsets: Vec<u64>) -> Result<BlockIndex> {
        if offsets.is_empty() || offsets.len() - 1 > u32::MAX as usize {
            return Err(ContainerError::MalformedHeader(format!(
                "offset table with {} entries", offsets.len()
            )));
        }
        Ok(BlockIndex { offsets })
    }

    /// Check that the offsets never decrease and that the last block ends
    /// within a container of `storage_len` bytes.
    pub fn validate(&self, storage_len: u64) -> Result<()> {
        if let Some(i) = self.offsets.windows(2).position(|w| w[1] < w[0]) {
            return Err(ContainerError::MalformedHeader(format!(
                "offset table decreases at block {} ({:#x} -> {:#x})",
                i, self.offsets[i], self.offsets[i + 1]
            )));
        }
        let end = self.data_end();
        if end > storage_len {
            return Err(ContainerError::MalformedHeader(format!(
                "block data ends at {end:#x}, past the end of the container ({storage_len:#x})"
            )));
        }
        Ok(())
    }

    pub fn block_count(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn bounds_of(&self, index: u64) -> Result<BlockBounds> {
        if index >= u64::from(self.block_count()) {
            return Err(ContainerError::BlockIndexOutOfRange { index, count: self.block_count() });
        }
        let i = index as usize;
        let (start, end) = (self.offsets[i], self.offsets[i + 1]);
        let len = end.checked_sub(start).ok_or_else(|| {
            ContainerError::MalformedHeader(format!("block {i} ends before it starts"))
        })?;
        Ok(BlockBounds { start, len })
    }

    pub fn compressed_len(&self, index: u64) -> Result<u64> {
        Ok(self.bounds_of(index)?.len)
    }

    pub fn is_sparse(&self, index: u64) -> Result<bool> {
        Ok(self.bounds_of(index)?.is_sparse())
    }

    pub fn sparse_count(&self) -> usize {
        self.offsets.windows(2).filter(|w| w[0] == w[1]).count()
    }

    pub fn data_start(&self) -> u64 {
        self.offsets[0]
    }

    /// End of the final block's compressed payload
    pub fn data_end(&self) -> u64 {
        self.offsets[self.offsets.len() - 1]
    }

    /// Total size of all compressed payloads
    pub fn compressed_size(&self) -> u64 {
        self.data_end().saturating_sub(self.data_start())
    }
}
