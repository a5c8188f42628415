//! Bit-level reading and writing over byte slices.
//!
//! Thin wrappers around `bitstream-io` that add bounds-aware error messages
//! for header parsing and a growable writer for repacking 14-bit words.

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter, UnsignedInteger};

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_n({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        if n as u64 > self.available()? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "skip_n: out of bounds bits",
            ));
        }
        self.bs.skip(n)
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|pos| self.len - pos)
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl Default for BsIoSliceReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

/// Big-endian bit writer collecting into a `Vec<u8>`.
pub struct BsIoVecWriter {
    bs: BitWriter<Vec<u8>, BigEndian>,
}

impl BsIoVecWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bs: BitWriter::new(Vec::with_capacity(capacity)),
        }
    }

    #[inline(always)]
    pub fn put(&mut self, bit: bool) -> io::Result<()> {
        self.bs.write_bit(bit)
    }

    #[inline(always)]
    pub fn put_n<I: UnsignedInteger>(&mut self, n: u32, value: I) -> io::Result<()> {
        self.bs.write_unsigned_var(n, value)
    }

    /// Pads the final partial byte with zero bits and returns the bytes.
    pub fn finish(mut self) -> io::Result<Vec<u8>> {
        self.bs.byte_align()?;
        Ok(self.bs.into_writer())
    }
}

impl Default for BsIoVecWriter {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

#[test]
fn write_then_read_fields() -> anyhow::Result<()> {
    let mut writer = BsIoVecWriter::default();
    writer.put_n(32, 0x7FFE_8001u32)?;
    writer.put(true)?;
    writer.put_n(14, 0x1234u16)?;
    let bytes = writer.finish()?;
    assert_eq!(bytes.len(), 6);

    let mut reader = BsIoSliceReader::from_slice(&bytes);
    assert_eq!(reader.get_n::<u32>(32)?, 0x7FFE_8001);
    assert!(reader.get()?);
    assert_eq!(reader.get_n::<u16>(14)?, 0x1234);
    assert_eq!(reader.available()?, 1);
    assert!(reader.skip_n(2).is_err());
    Ok(())
}
