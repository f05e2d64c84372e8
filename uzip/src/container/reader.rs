use std::io::{self, Read, Seek, SeekFrom};

use super::container::Container;
use super::storage::ReadAt;

/// Reader for the decompressed image as one contiguous stream.
///
/// Each `read` decompresses only the blocks it touches, so a large buffer (or
/// `io::copy`'s default one) spanning several blocks is served in one call.
#[derive(Debug)]
pub struct ContainerReader<'a, S> {
    container: &'a Container<S>,
    pos: u64,
}

impl<'a, S: ReadAt> ContainerReader<'a, S> {
    pub fn new(container: &'a Container<S>) -> Self {
        Self { container, pos: 0 }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl<'a, S: ReadAt> Read for ContainerReader<'a, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.container.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<'a, S: ReadAt> Seek for ContainerReader<'a, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(p) => self.container.logical_size().checked_add_signed(p),
            SeekFrom::Current(p) => self.pos.checked_add_signed(p),
        };
        self.pos = new_pos.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "invalid seek to a negative or overflowing position")
        })?;
        Ok(self.pos)
    }
}
