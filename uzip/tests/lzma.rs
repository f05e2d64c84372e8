//! Reads against synthetic xz containers
#![cfg(feature = "lzma")]

mod common;

use anyhow;
use common::{pattern, xz, Block, Builder};
use uzip::container::{Codec, Container};
use uzip::ContainerError;

#[test]
fn test_lzma_container() -> anyhow::Result<()> {
    let b0 = pattern(11, 1024);
    let b2 = pattern(12, 1024);
    let c = Container::new(Builder::lzma(1024).data(&b0).sparse().data(&b2).build())?;
    assert_eq!(c.header().codec, Codec::Lzma);
    assert_eq!(c.header().version, 3);
    assert!(!c.header().is_legacy());

    let all = c.read_range(0, 3072)?;
    assert_eq!(&all[..1024], &b0[..]);
    assert!(all[1024..2048].iter().all(|&b| b == 0));
    assert_eq!(&all[2048..], &b2[..]);
    assert_eq!(c.stats().blocks_decompressed(), 2);

    let span = c.read_range(1000, 100)?;
    assert_eq!(&span[..24], &b0[1000..]);
    assert!(span[24..].iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn test_lzma_wrong_length() -> anyhow::Result<()> {
    let good = pattern(5, 256);
    let image = Builder::lzma(256)
        .block(Block::Raw(xz(&good[..200])))
        .data(&good)
        .build();
    let c = Container::new(image)?;
    assert!(matches!(c.read_range(0, 10), Err(ContainerError::DecompressionError { block: 0, .. })));
    assert_eq!(c.read_range(256, 256)?, good);
    Ok(())
}

#[test]
fn test_lzma_garbage_payload() -> anyhow::Result<()> {
    let image = Builder::lzma(64).block(Block::Raw(vec![0xa5; 40])).build();
    let c = Container::new(image)?;
    assert!(matches!(c.decompress_block(0), Err(ContainerError::DecompressionError { .. })));
    Ok(())
}
