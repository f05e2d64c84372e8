use std::io;

use thiserror::Error;

/// Failures raised while opening or reading a uzip container.
///
/// The first five variants can only occur while the header and offset table
/// are being parsed. The rest are scoped to a single read request and leave the
/// container usable.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container I/O: {0}")]
    Io(#[source] io::Error),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unsupported codec tag {0:#04x}")]
    UnsupportedCodec(u8),

    #[error("unsupported {codec} format version {version:#04x}")]
    UnsupportedVersion { codec: &'static str, version: u8 },

    #[error("container truncated while reading {0}")]
    TruncatedContainer(&'static str),

    #[error("block {index} out of range (container has {count} blocks)")]
    BlockIndexOutOfRange { index: u64, count: u32 },

    #[error("reading block {block} ({len} bytes at offset {offset}): {source}")]
    StorageReadError {
        block: u32,
        offset: u64,
        len: u64,
        #[source]
        source: io::Error,
    },

    #[error("decompressing block {block}: {reason}")]
    DecompressionError { block: u32, reason: String },
}

impl ContainerError {
    /// True for errors that prevent a container from being opened at all.
    pub fn is_mount_time(&self) -> bool {
        matches!(
            self,
            ContainerError::Io(_)
                | ContainerError::MalformedHeader(_)
                | ContainerError::UnsupportedCodec(_)
                | ContainerError::UnsupportedVersion { .. }
                | ContainerError::TruncatedContainer(_)
        )
    }

    /// POSIX error number reported to filesystem callers
    pub fn errno(&self) -> i32 {
        match self {
            ContainerError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            e if e.is_mount_time() => libc::EINVAL,
            _ => libc::EIO,
        }
    }

    /// Classify an I/O error hit while parsing the header region.
    pub(crate) fn from_header_io(e: io::Error, what: &'static str) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => ContainerError::TruncatedContainer(what),
            _ => ContainerError::Io(e),
        }
    }
}

impl From<ContainerError> for io::Error {
    fn from(e: ContainerError) -> Self {
        let kind = match &e {
            ContainerError::TruncatedContainer(_) => io::ErrorKind::UnexpectedEof,
            ContainerError::UnsupportedCodec(_) | ContainerError::UnsupportedVersion { .. } => {
                io::ErrorKind::Unsupported
            }
            ContainerError::BlockIndexOutOfRange { .. } => io::ErrorKind::InvalidInput,
            ContainerError::Io(source) | ContainerError::StorageReadError { source, .. } => {
                source.kind()
            }
            ContainerError::MalformedHeader(_) | ContainerError::DecompressionError { .. } => {
                io::ErrorKind::InvalidData
            }
        };
        io::Error::new(kind, e)
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
