//! See `mkuzip(8)` and `geom_uzip(4)` for the origin of the container format

use std::cmp;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use super::block::{load_block, ReadStats};
use super::header::Header;
use super::index::BlockIndex;
use super::reader::ContainerReader;
use super::storage::{ReadAt, ReadAtCursor};
use crate::error::{ContainerError, Result};

/// An open uzip container. The header and offset table are parsed once when
/// the container is created and never change afterwards, so a `Container`
/// can serve reads from many threads at once as long as its storage can.
#[derive(Debug)]
pub struct Container<S> {
    header: Header,
    index: BlockIndex,
    storage: S,
    stats: ReadStats,
}

impl Container<File> {
    /// Open the container stored in a file
    pub fn open<P>(path: P) -> Result<Self>
    where P: AsRef<Path>
    {
        let file = File::open(path.as_ref()).map_err(ContainerError::Io)?;
        Self::new(file)
    }
}

impl<S: ReadAt> Container<S> {
    /// Parse the header and offset table from `storage`.
    pub fn new(storage: S) -> Result<Self> {
        let storage_len = storage.size().map_err(ContainerError::Io)?;
        let (header, index) = {
            let mut r = BufReader::new(ReadAtCursor::new(&storage));
            let header = Header::read(&mut r)?;
            let index = BlockIndex::read(&mut r, header.block_count)?;
            (header, index)
        };
        index.validate(storage_len)?;

        debug!(
            "opened {} v{} container: {} blocks of {} bytes, {} sparse, {} compressed bytes",
            header.codec,
            header.version,
            header.block_count,
            header.block_size,
            index.sparse_count(),
            index.compressed_size()
        );
        Ok(Container { header, index, storage, stats: ReadStats::default() })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn index(&self) -> &BlockIndex {
        &self.index
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    pub fn block_size(&self) -> u32 {
        self.header.block_size
    }

    pub fn block_count(&self) -> u32 {
        self.header.block_count
    }

    /// Size of the decompressed image
    pub fn logical_size(&self) -> u64 {
        self.header.logical_size()
    }

    /// Decompress one whole block. Sparse blocks come back as zeroes without
    /// any storage access.
    pub fn decompress_block(&self, index: u64) -> Result<Vec<u8>> {
        let bounds = self.index.bounds_of(index)?;
        load_block(
            &self.storage,
            self.header.codec,
            index as u32,
            bounds,
            self.header.block_size,
            &self.stats,
        )
    }

    /// Fill `buf` with decompressed data starting at `offset`.
    ///
    /// Returns the number of bytes produced, which is less than `buf.len()`
    /// only when the end of the image is reached. If a block fails to
    /// decompress the whole call fails, and any part of `buf` may already have
    /// been written.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let block_size = u64::from(self.header.block_size);
        let end = self.logical_size();
        let mut pos = offset;
        let mut done = 0;

        while done < buf.len() && pos < end {
            let block = pos / block_size;
            let in_block = (pos % block_size) as usize;
            let chunk = cmp::min(buf.len() - done, block_size as usize - in_block);
            let out = &mut buf[done..done + chunk];

            if self.index.is_sparse(block)? {
                self.stats.record_sparse();
                out.fill(0);
            } else {
                let data = self.decompress_block(block)?;
                out.copy_from_slice(&data[in_block..in_block + chunk]);
            }

            done += chunk;
            pos += chunk as u64;
        }
        Ok(done)
    }

    /// Read up to `len` bytes starting at `offset` into a new buffer
    pub fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let avail = self.logical_size().saturating_sub(offset);
        let mut buf = vec![0; cmp::min(len as u64, avail) as usize];
        let n = self.read_at(&mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// A `Read + Seek` stream over the decompressed image
    pub fn reader(&self) -> ContainerReader<'_, S> {
        ContainerReader::new(self)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}
