use std::fmt;
use std::io::{self, Write};

#[cfg(feature = "flate2")]
use std::io::Read;

#[cfg(feature = "flate2")]
use flate2::bufread::ZlibDecoder;

#[cfg(feature = "lzma-rs")]
use lzma_rs::xz_decompress;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{ContainerError, Result};

/// Compression algorithm used for every block of a container, selected by the
/// tag byte that follows the magic prefix.
#[derive(Debug, IntoPrimitive, TryFromPrimitive, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Codec {
    /// zlib-wrapped DEFLATE, tag `'V'`
    Deflate = 0x56,
    /// XZ container around LZMA2, tag `'L'`
    Lzma = 0x4c,
}

impl Codec {
    pub fn from_tag(tag: u8) -> Result<Codec> {
        Codec::try_from(tag).map_err(|e| ContainerError::UnsupportedCodec(e.number))
    }

    pub fn tag(self) -> u8 {
        self.into()
    }

    /// Lowest format version digit a container using this codec may carry
    pub fn min_version(self) -> u8 {
        match self {
            Codec::Deflate => 2,
            Codec::Lzma => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Deflate => "deflate",
            Codec::Lzma => "lzma",
        }
    }

    /// Whether the decoder for this codec was compiled in
    pub fn is_available(self) -> bool {
        match self {
            Codec::Deflate => cfg!(feature = "flate2"),
            Codec::Lzma => cfg!(feature = "lzma-rs"),
        }
    }

    /// Decompress one block payload.
    ///
    /// The payload must decode to exactly `expected_len` bytes, and anything
    /// left over after the end of the compressed stream must be zero padding.
    /// The decoder never produces more than `expected_len + 1` bytes, so a
    /// corrupt payload cannot balloon the output buffer.
    pub fn decompress(self, block: u32, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let fail = |reason: String| ContainerError::DecompressionError { block, reason };

        let (out, rest): (Vec<u8>, &[u8]) = match self {
            #[cfg(feature = "flate2")]
            Codec::Deflate => inflate(compressed, expected_len).map_err(|e| fail(e.to_string()))?,
            #[cfg(feature = "lzma-rs")]
            Codec::Lzma => unxz(compressed, expected_len).map_err(fail)?,
            #[allow(unreachable_patterns)]
            _ => return Err(ContainerError::UnsupportedCodec(self.tag())),
        };

        if out.len() != expected_len {
            return Err(fail(format!(
                "decompressed to {}{} bytes, expected {}",
                if out.len() > expected_len { "more than " } else { "" },
                out.len().min(expected_len),
                expected_len
            )));
        }
        if rest.iter().any(|&b| b != 0) {
            return Err(fail(format!("{} unconsumed bytes after end of stream", rest.len())));
        }
        Ok(out)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inflate a zlib stream, returning the output and the unread tail of the input
#[cfg(feature = "flate2")]
fn inflate(compressed: &[u8], expected_len: usize) -> io::Result<(Vec<u8>, &[u8])> {
    let mut out = Vec::with_capacity(expected_len);
    let mut dec = ZlibDecoder::new(compressed);
    // read_to_end only returns once the decoder has seen the end of the stream
    // or the limit was hit, so a clean return with the limit not reached means
    // the whole stream was decoded.
    dec.by_ref().take(expected_len as u64 + 1).read_to_end(&mut out)?;
    Ok((out, dec.into_inner()))
}

#[cfg(feature = "lzma-rs")]
fn unxz(compressed: &[u8], expected_len: usize) -> std::result::Result<(Vec<u8>, &[u8]), String> {
    let mut input = compressed;
    let mut out = BoundedWriter::new(expected_len);
    xz_decompress(&mut input, &mut out).map_err(|e| {
        if out.overflowed {
            format!("decompressed to more than {expected_len} bytes")
        } else {
            e.to_string()
        }
    })?;
    Ok((out.buf, input))
}

/// A Vec writer that refuses to grow past a fixed limit
#[allow(dead_code)]
struct BoundedWriter {
    buf: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

#[allow(dead_code)]
impl BoundedWriter {
    fn new(limit: usize) -> Self {
        Self { buf: Vec::with_capacity(limit), limit, overflowed: false }
    }
}

impl Write for BoundedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.limit {
            self.overflowed = true;
            return Err(io::Error::new(io::ErrorKind::WriteZero, "block output limit exceeded"));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(Codec::from_tag(b'V').unwrap(), Codec::Deflate);
        assert_eq!(Codec::from_tag(b'L').unwrap(), Codec::Lzma);
        assert_eq!(Codec::Lzma.tag(), b'L');
        assert!(matches!(Codec::from_tag(b'Z'), Err(ContainerError::UnsupportedCodec(b'Z'))));
        assert_eq!(Codec::Deflate.min_version(), 2);
        assert_eq!(Codec::Lzma.min_version(), 3);
    }

    #[test]
    fn test_bounded_writer() {
        let mut w = BoundedWriter::new(4);
        assert_eq!(w.write(b"ab").unwrap(), 2);
        assert!(w.write(b"cde").is_err());
        assert!(w.overflowed);
        assert_eq!(w.buf, b"ab");
    }

    #[cfg(feature = "flate2")]
    mod deflate {
        use super::*;
        use flate2::write::ZlibEncoder;
        use flate2::Compression;

        fn zlib(data: &[u8]) -> Vec<u8> {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data).unwrap();
            enc.finish().unwrap()
        }

        #[test]
        fn test_inflate_exact() -> Result<()> {
            let data: Vec<u8> = (0..64).collect();
            let out = Codec::Deflate.decompress(0, &zlib(&data), 64)?;
            assert_eq!(out, data);
            Ok(())
        }

        #[test]
        fn test_inflate_zero_padding_allowed() -> Result<()> {
            let data = [7u8; 32];
            let mut payload = zlib(&data);
            payload.resize(payload.len() + 13, 0);
            assert_eq!(Codec::Deflate.decompress(0, &payload, 32)?, data);
            Ok(())
        }

        #[test]
        fn test_inflate_trailing_garbage() {
            let mut payload = zlib(&[1u8; 16]);
            payload.extend_from_slice(b"junk");
            let err = Codec::Deflate.decompress(4, &payload, 16).unwrap_err();
            assert!(matches!(err, ContainerError::DecompressionError { block: 4, .. }));
        }

        #[test]
        fn test_inflate_length_mismatch() {
            let short = zlib(&[1u8; 15]);
            assert!(Codec::Deflate.decompress(0, &short, 16).is_err());
            let long = zlib(&[1u8; 17]);
            assert!(Codec::Deflate.decompress(0, &long, 16).is_err());
        }

        #[test]
        fn test_inflate_truncated() {
            let payload = zlib(&(0..200u8).collect::<Vec<_>>());
            let cut = &payload[..payload.len() / 2];
            assert!(Codec::Deflate.decompress(0, cut, 200).is_err());
        }
    }

    #[cfg(feature = "lzma-rs")]
    mod lzma {
        use super::*;

        fn xz(data: &[u8]) -> Vec<u8> {
            let mut out = Vec::new();
            lzma_rs::xz_compress(&mut &data[..], &mut out).unwrap();
            out
        }

        #[test]
        fn test_unxz_exact() -> Result<()> {
            let data: Vec<u8> = (0..100).map(|i| (i * 3) as u8).collect();
            assert_eq!(Codec::Lzma.decompress(1, &xz(&data), 100)?, data);
            Ok(())
        }

        #[test]
        fn test_unxz_overflow() {
            let data = [9u8; 64];
            let err = Codec::Lzma.decompress(2, &xz(&data), 32).unwrap_err();
            assert!(matches!(err, ContainerError::DecompressionError { block: 2, .. }));
        }
    }
}
