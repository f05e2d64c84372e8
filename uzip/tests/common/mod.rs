//! Builds small containers in memory the way `mkuzip` lays them out
#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

pub const HEADER_OFFSET: usize = 128;

pub enum Block {
    /// Compressed with the container's codec
    Data(Vec<u8>),
    /// Zero-length entry in the offset table
    Sparse,
    /// Stored verbatim as the payload
    Raw(Vec<u8>),
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn xz(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    lzma_rs::xz_compress(&mut &data[..], &mut out).unwrap();
    out
}

pub struct Builder {
    tag: u8,
    version: u8,
    block_size: u32,
    blocks: Vec<Block>,
}

impl Builder {
    pub fn deflate(block_size: u32) -> Self {
        Self { tag: b'V', version: b'2', block_size, blocks: Vec::new() }
    }

    pub fn lzma(block_size: u32) -> Self {
        Self { tag: b'L', version: b'3', block_size, blocks: Vec::new() }
    }

    pub fn tag(mut self, tag: u8, version: u8) -> Self {
        self.tag = tag;
        self.version = version;
        self
    }

    pub fn block(mut self, b: Block) -> Self {
        self.blocks.push(b);
        self
    }

    pub fn data(self, data: &[u8]) -> Self {
        self.block(Block::Data(data.to_vec()))
    }

    pub fn sparse(self) -> Self {
        self.block(Block::Sparse)
    }

    fn compress(&self, data: &[u8]) -> Vec<u8> {
        match self.tag {
            b'L' => xz(data),
            _ => zlib(data),
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"#!/bin/sh\n#");
        out.push(self.tag);
        out.push(self.version);
        out.extend_from_slice(b".0\nexit 0\n");
        out.resize(HEADER_OFFSET, 0);
        out.extend_from_slice(&self.block_size.to_be_bytes());
        out.extend_from_slice(&(self.blocks.len() as u32).to_be_bytes());

        let payloads: Vec<Vec<u8>> = self.blocks.iter()
            .map(|b| match b {
                Block::Data(d) => self.compress(d),
                Block::Sparse => Vec::new(),
                Block::Raw(r) => r.clone(),
            })
            .collect();

        let mut offset = (out.len() + 8 * (payloads.len() + 1)) as u64;
        for p in &payloads {
            out.extend_from_slice(&offset.to_be_bytes());
            offset += p.len() as u64;
        }
        out.extend_from_slice(&offset.to_be_bytes());
        for p in &payloads {
            out.extend_from_slice(p);
        }
        out
    }
}

/// Deterministic, mildly compressible block content
pub fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i / 7) as u8).collect()
}
