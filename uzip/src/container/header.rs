use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use super::codec::Codec;
use crate::error::{ContainerError, Result};

/// Every container starts as a shell script so it can carry a self-extracting stub
pub const MAGIC_PREFIX: &[u8; MAGIC_LEN] = b"#!/bin/sh\n#";
const MAGIC_LEN: usize = 11;

/// The earliest containers always carried this exact 12-byte magic, followed by `'2'`
pub const LEGACY_MAGIC: &[u8; 12] = b"#!/bin/sh\n#V";

/// The block geometry record sits after the script region
pub const HEADER_OFFSET: u64 = 128;

/// Offset of the first entry in the block offset table
pub const OFFSET_TABLE_START: u64 = HEADER_OFFSET + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub codec: Codec,
    /// Format version as a number, decoded from its ASCII digit
    pub version: u8,
    pub block_size: u32,
    pub block_count: u32,
}

impl Header {
    /// Parse the magic, codec tag, version digit and block geometry. On
    /// success the reader is left positioned at the start of the offset table.
    pub fn read<R>(r: &mut R) -> Result<Header>
    where R: Read + Seek
    {
        let mut magic = [0u8; MAGIC_LEN + 2];
        r.seek(SeekFrom::Start(0))
            .and_then(|_| r.read_exact(&mut magic))
            .map_err(|e| ContainerError::from_header_io(e, "magic"))?;

        if &magic[..MAGIC_LEN] != MAGIC_PREFIX {
            return Err(ContainerError::MalformedHeader("bad magic, not a uzip container".into()));
        }

        let codec = Codec::from_tag(magic[MAGIC_LEN])?;
        let version = magic[MAGIC_LEN + 1];
        if !(b'0' + codec.min_version()..=b'9').contains(&version) {
            return Err(ContainerError::UnsupportedVersion { codec: codec.name(), version });
        }
        if !codec.is_available() {
            return Err(ContainerError::UnsupportedCodec(codec.tag()));
        }

        r.seek(SeekFrom::Start(HEADER_OFFSET))
            .map_err(|e| ContainerError::from_header_io(e, "header"))?;
        let block_size = r.read_u32::<BigEndian>()
            .map_err(|e| ContainerError::from_header_io(e, "header"))?;
        let block_count = r.read_u32::<BigEndian>()
            .map_err(|e| ContainerError::from_header_io(e, "header"))?;

        if block_size == 0 {
            return Err(ContainerError::MalformedHeader("block size is zero".into()));
        }

        Ok(Header {
            codec,
            version: version - b'0',
            block_size,
            block_count,
        })
    }

    pub fn from_bytes(b: &[u8]) -> Result<Header> {
        Header::read(&mut io::Cursor::new(b))
    }

    /// Size of the decompressed image
    pub fn logical_size(&self) -> u64 {
        u64::from(self.block_count) * u64::from(self.block_size)
    }

    /// True when the header is byte-for-byte the oldest layout
    pub fn is_legacy(&self) -> bool {
        self.codec == Codec::Deflate && self.version == 2
    }
}
