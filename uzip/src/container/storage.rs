use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

/// Positional read access to the bytes of a container.
///
/// Implementations must not depend on a cursor shared between calls, so that
/// concurrent reads of different blocks cannot interfere with each other.
pub trait ReadAt {
    /// Read up to `buf.len()` bytes starting at `offset`. Returns 0 at end of data.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Total length of the underlying data
    fn size(&self) -> io::Result<u64>;

    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, offset) {
                Ok(0) => break,
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        if buf.is_empty() {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short read from container"))
        }
    }
}

#[cfg(unix)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

#[cfg(windows)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = match usize::try_from(offset) {
            Ok(s) if s < self.len() => s,
            _ => return Ok(0),
        };
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Arc<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }
}

/// Positional access over a handle that only offers seek-then-read. Every
/// access holds the lock across both the seek and the read.
#[derive(Debug)]
pub struct SharedReader<R> {
    inner: Mutex<R>,
}

impl<R> SharedReader<R>
where R: Read + Seek
{
    pub fn new(reader: R) -> Self {
        Self { inner: Mutex::new(reader) }
    }

    pub fn into_inner(self) -> io::Result<R> {
        self.inner.into_inner().map_err(|_| poisoned())
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "container reader lock poisoned")
}

impl<R> ReadAt for SharedReader<R>
where R: Read + Seek
{
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut r = self.inner.lock().map_err(|_| poisoned())?;
        r.seek(SeekFrom::Start(offset))?;
        r.read(buf)
    }

    // Fill the buffer under a single lock so another reader cannot move the
    // cursor between partial reads.
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let mut r = self.inner.lock().map_err(|_| poisoned())?;
        r.seek(SeekFrom::Start(offset))?;
        r.read_exact(buf)
    }

    fn size(&self) -> io::Result<u64> {
        let mut r = self.inner.lock().map_err(|_| poisoned())?;
        r.seek(SeekFrom::End(0))
    }
}

/// A `Read + Seek` view over a `ReadAt` source, with its own position
#[derive(Debug)]
pub struct ReadAtCursor<'a, S: ?Sized> {
    inner: &'a S,
    pos: u64,
}

impl<'a, S: ReadAt + ?Sized> ReadAtCursor<'a, S> {
    pub fn new(inner: &'a S) -> Self {
        Self { inner, pos: 0 }
    }
}

impl<'a, S: ReadAt + ?Sized> Read for ReadAtCursor<'a, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<'a, S: ReadAt + ?Sized> Seek for ReadAtCursor<'a, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(p) => self.inner.size()?.checked_add_signed(p),
            SeekFrom::Current(p) => self.pos.checked_add_signed(p),
        };
        self.pos = new_pos.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative or overflowing position")
        })?;
        Ok(self.pos)
    }
}
