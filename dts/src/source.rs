//! Byte sources feeding the frame reader.
//!
//! The reader never opens or closes files itself. It only needs sequential
//! reads, absolute seeks and position queries, described by [`ByteSource`].

use std::io::{self, Read, Seek, SeekFrom};

/// Reference point of a position query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePosition {
    /// Offset where the stream data begins.
    Start,
    /// Current read position.
    Current,
    /// Total length; the offset one past the last byte.
    End,
}

/// Sequential, seekable byte supplier.
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes. A short count means the source is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Moves the read position to an absolute offset.
    fn seek(&mut self, offset: u64) -> io::Result<()>;

    fn position(&mut self, origin: FilePosition) -> io::Result<u64>;

    /// Reads exactly `buf.len()` bytes, `Ok(false)` on exhaustion.
    fn read_required(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        Ok(self.read(buf)? == buf.len())
    }

    /// Reads one byte, `Ok(None)` on exhaustion.
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}

/// [`ByteSource`] over any `Read + Seek` value.
///
/// The stream start is the inner position at construction time and the
/// length is measured once, so the inner reader should not be resized while
/// wrapped.
#[derive(Debug)]
pub struct IoSource<R: Read + Seek> {
    inner: R,
    start: u64,
    end: u64,
}

impl<R: Read + Seek> IoSource<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let start = inner.stream_position()?;
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(start))?;

        Ok(Self { inner, start, end })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> ByteSource for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        if offset > self.end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {offset} beyond end of source ({})", self.end),
            ));
        }
        self.inner.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    fn position(&mut self, origin: FilePosition) -> io::Result<u64> {
        match origin {
            FilePosition::Start => Ok(self.start),
            FilePosition::Current => self.inner.stream_position(),
            FilePosition::End => Ok(self.end),
        }
    }
}

#[test]
fn io_source_reads_and_seeks() -> anyhow::Result<()> {
    let mut source = IoSource::new(io::Cursor::new((0u8..10).collect::<Vec<_>>()))?;
    assert_eq!(source.position(FilePosition::End)?, 10);

    let mut buf = [0u8; 4];
    assert!(source.read_required(&mut buf)?);
    assert_eq!(buf, [0, 1, 2, 3]);
    assert_eq!(source.position(FilePosition::Current)?, 4);

    source.seek(8)?;
    assert_eq!(source.read_byte()?, Some(8));
    assert!(!source.read_required(&mut buf)?);
    assert_eq!(source.read_byte()?, None);

    assert!(source.seek(11).is_err());
    Ok(())
}
