//! Reassembly buffer for one unit (core frame plus optional extension frame).

use std::ops::Range;

use crate::structs::header::FRAME_HEADER_SIZE;
use crate::utils::errors::ReadError;

/// Granularity of the reusable frame buffer.
pub const BUFFER_ALIGN: usize = 4096;

/// Alignment applied to each frame before the next one is appended.
pub const FRAME_ALIGN: usize = 4;

/// Rounds `value` up to a multiple of `align` (a power of two).
#[inline(always)]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Working state of the frame being assembled.
///
/// The byte buffer is kept across units and only ever grows, in steps of
/// [`BUFFER_ALIGN`], so steady-state reads do not allocate.
#[derive(Debug)]
pub struct Frame {
    /// Rolling 32-bit window used while scanning for a sync word.
    pub sync_word: u32,
    /// Marker consumed by an extension attempt that opens the next unit.
    pub pending: Option<u32>,
    pub header: [u8; FRAME_HEADER_SIZE],
    buffer: Vec<u8>,
    size: usize,
    core: Option<Range<usize>>,
    extension: Option<Range<usize>>,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            sync_word: 0,
            pending: None,
            header: [0; FRAME_HEADER_SIZE],
            buffer: vec![0; BUFFER_ALIGN * 2],
            size: 0,
            core: None,
            extension: None,
        }
    }
}

impl Frame {
    /// Starts a new unit; the buffer itself is retained.
    pub fn reset(&mut self) {
        self.size = 0;
        self.core = None;
        self.extension = None;
    }

    /// Returns a writable region of `len` bytes right after the occupied part,
    /// growing the buffer when needed.
    pub fn reserve(&mut self, len: usize) -> Result<&mut [u8], ReadError> {
        let required = align_up(self.size + len, BUFFER_ALIGN);

        if self.buffer.len() < required {
            let additional = required - self.buffer.len();
            self.buffer
                .try_reserve_exact(additional)
                .map_err(|_| ReadError::Allocation(required))?;
            self.buffer.resize(required, 0);
        }

        Ok(&mut self.buffer[self.size..self.size + len])
    }

    /// Commits a frame of `len` normalized bytes written through [`Frame::reserve`].
    ///
    /// The occupied size advances by `len` rounded up to [`FRAME_ALIGN`]; the
    /// padding bytes are zeroed.
    pub fn commit(&mut self, len: usize, extension: bool) {
        let start = self.size;
        let end = start + align_up(len, FRAME_ALIGN);
        self.buffer[start + len..end].fill(0);

        if extension {
            self.extension = Some(start..start + len);
        } else {
            self.core = Some(start..start + len);
        }
        self.size = end;
    }

    /// Occupied bytes: aligned core frame followed by the aligned extension.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.size]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn core(&self) -> Option<&[u8]> {
        self.core.clone().map(|range| &self.buffer[range])
    }

    pub fn extension(&self) -> Option<&[u8]> {
        self.extension.clone().map(|range| &self.buffer[range])
    }

    /// Copies the current sync word into the first four header bytes.
    pub fn load_sync_word(&mut self) {
        self.header[..4].copy_from_slice(&self.sync_word.to_be_bytes());
    }
}

#[test]
fn align_is_idempotent() {
    for x in (0..10_000).chain([usize::MAX / 4 - 3, 1 << 40]) {
        let aligned = align_up(x, FRAME_ALIGN);
        assert!(aligned >= x);
        assert_eq!(aligned % FRAME_ALIGN, 0);
        assert_eq!(align_up(aligned, FRAME_ALIGN), aligned);
        assert!(aligned - x < FRAME_ALIGN);
    }
}

#[test]
fn buffer_growth_is_monotonic() -> anyhow::Result<()> {
    let mut frame = Frame::default();
    let mut capacity = frame.capacity();
    let sizes = [100, 5000, 13, 20_000, 7, 9000, 96];

    for pair in sizes.chunks(2) {
        frame.reset();
        let mut requested = 0;
        for (i, &len) in pair.iter().enumerate() {
            frame.reserve(len)?.fill(0xAA);
            frame.commit(len, i == 1);
            requested = align_up(requested, FRAME_ALIGN) + len;

            assert!(frame.capacity() >= capacity);
            assert!(frame.capacity() >= align_up(requested, BUFFER_ALIGN));
            assert_eq!(frame.capacity() % BUFFER_ALIGN, 0);
            capacity = frame.capacity();
        }
    }

    Ok(())
}

#[test]
fn commit_pads_and_records_segments() -> anyhow::Result<()> {
    let mut frame = Frame::default();

    frame.reserve(6)?.copy_from_slice(&[1, 2, 3, 4, 5, 6]);
    frame.commit(6, false);
    frame.reserve(3)?.copy_from_slice(&[7, 8, 9]);
    frame.commit(3, true);

    assert_eq!(frame.size(), 12);
    assert_eq!(frame.as_bytes(), &[1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 0]);
    assert_eq!(frame.core(), Some(&[1u8, 2, 3, 4, 5, 6][..]));
    assert_eq!(frame.extension(), Some(&[7u8, 8, 9][..]));

    frame.reset();
    assert_eq!(frame.size(), 0);
    assert!(frame.core().is_none());
    Ok(())
}
