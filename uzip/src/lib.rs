//! uzip reads the compressed block images produced by FreeBSD's `mkuzip(8)`.
//! The image is split into fixed-size blocks which are compressed one by one,
//! so any byte range can be read by decompressing only the blocks it covers.
//!
//! ## Feature Flags
//! - `deflate` (default): zlib-compressed containers, codec tag `V`
//! - `lzma` (default): xz-compressed containers, codec tag `L`
//!
//! ## Usage Example
//! ```no_run
//! use std::io;
//! use uzip::container::Container;
//! fn print_image_prefix() -> uzip::Result<()> {
//!     // Parse the header and offset table
//!     let image = Container::open("disk.img.uzip")?;
//!     println!("{} bytes in {} blocks", image.logical_size(), image.block_count());
//!
//!     // Decompress just the first sector
//!     let sector = image.read_range(0, 512)?;
//!     assert_eq!(sector.len(), 512);
//!
//!     // Or stream the whole image
//!     let mut stdout = io::stdout().lock();
//!     io::copy(&mut image.reader(), &mut stdout).map_err(uzip::ContainerError::Io)?;
//!     Ok(())
//! }
//! ```

pub mod container;
pub mod error;

pub use error::{ContainerError, Result};
