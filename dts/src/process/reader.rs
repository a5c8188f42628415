use log::Level::Warn;
use log::{debug, trace};

use crate::engine::FrameCodec;
use crate::log_or_err;
use crate::structs::frame::{Frame, align_up};
use crate::structs::header::FRAME_HEADER_SIZE;
use crate::structs::stream_info::StreamInfo;
use crate::structs::sync::{Bitstream, SYNC_WORD_SIZE, SyncWord};
use crate::source::{ByteSource, FilePosition};
use crate::utils::errors::{HeaderError, ReadError};

/// Locates and assembles frames from a byte source without a frame index.
///
/// Each call to [`FrameReader::read_unit`] produces one unit: a core frame,
/// optionally followed by the extension frame stored right after it. Frames
/// are found with a rolling 32-bit sync word scan, so leading garbage or a
/// seek into the middle of a frame is recovered by scanning forward.
///
/// # Example
///
/// ```rust,no_run
/// use dts::engine::HeaderCodec;
/// use dts::process::reader::FrameReader;
/// use dts::source::IoSource;
///
/// let file = std::io::BufReader::new(std::fs::File::open("stream.dts")?);
/// let mut reader = FrameReader::new(IoSource::new(file)?)?;
///
/// while reader.read_unit(&HeaderCodec).is_ok() {
///     println!(
///         "unit of {} bytes, extension: {}",
///         reader.unit().len(),
///         reader.extension().is_some()
///     );
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct FrameReader<S: ByteSource> {
    source: S,
    frame: Frame,
    info: StreamInfo,
    fail_level: log::Level,
    units_read: u64,
    unit_sync: Option<SyncWord>,
}

impl<S: ByteSource> FrameReader<S> {
    pub fn new(mut source: S) -> Result<Self, ReadError> {
        let length = source.position(FilePosition::End)?;

        Ok(Self {
            source,
            frame: Frame::default(),
            info: StreamInfo::with_length(length),
            fail_level: log::Level::Error,
            units_read: 0,
            unit_sync: None,
        })
    }

    /// Sets the failure level for recoverable stream damage.
    ///
    /// - `log::Level::Error`: bytes skipped before a sync word are logged (default)
    /// - `log::Level::Warn`: skipped bytes fail the read (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }

    /// Marks whether units pair core frames with extension frames, which
    /// changes how [`FrameReader::seek`] resynchronizes.
    pub fn set_has_extensions(&mut self, has_extensions: bool) {
        self.info.set_extensions(has_extensions);
    }

    /// Reads the next unit into the frame buffer.
    ///
    /// Fails with [`ReadError::EndOfStream`] once the source has no further
    /// core frame. A missing extension frame is not an error.
    pub fn read_unit<C: FrameCodec + ?Sized>(&mut self, codec: &C) -> Result<(), ReadError> {
        self.frame.reset();
        self.unit_sync = None;
        self.frame.sync_word = self.frame.pending.take().unwrap_or(0);

        let sync = self.read_frame(codec, false)?;
        self.unit_sync = Some(sync);

        if sync.is_core() {
            self.frame.sync_word = 0;
            match self.read_frame(codec, true) {
                Ok(_) => {}
                Err(ReadError::NoExtensionSync { found }) => {
                    trace!("No extension frame, next unit starts with {found:#010X}");
                    self.frame.pending = Some(found);
                }
                Err(e) if e.is_end_of_stream() => {
                    trace!("No extension frame before end of stream");
                }
                Err(e) => return Err(e),
            }
        }

        self.frame.sync_word = 0;
        self.info.complete_first_unit(self.frame.size());
        self.units_read += 1;

        Ok(())
    }

    /// Seeks to an absolute byte offset and realigns on the next frame.
    ///
    /// When the stream pairs core and extension frames, extension markers
    /// found while scanning are skipped so the next unit starts with a core
    /// frame. On success the source is positioned on the sync word.
    pub fn seek(&mut self, offset: u64) -> Result<(), ReadError> {
        self.source.seek(offset)?;
        self.frame.reset();
        self.frame.pending = None;
        self.unit_sync = None;

        self.synchronize()?;
        self.frame.sync_word = 0;

        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), ReadError> {
        loop {
            self.frame.sync_word = 0;
            let (sync, _) = self.read_sync_word()?;

            if self.info.has_extensions() && sync.is_extension() {
                debug!("Skipping {sync} sync word while resynchronizing");
                continue;
            }

            let position = self.position()?;
            let marker = position.saturating_sub(SYNC_WORD_SIZE as u64);
            self.source.seek(marker)?;
            debug!("Resynchronized on {sync} sync word at {marker}");

            return Ok(());
        }
    }

    /// Shifts bytes into the rolling window until it holds a sync word.
    ///
    /// Returns the marker and the number of bytes skipped before it.
    fn read_sync_word(&mut self) -> Result<(SyncWord, u64), ReadError> {
        let mut shifted = 0u64;

        loop {
            if let Some(sync) = SyncWord::classify(self.frame.sync_word) {
                return Ok((sync, shifted.saturating_sub(SYNC_WORD_SIZE as u64)));
            }

            let Some(byte) = self.source.read_byte()? else {
                return Err(ReadError::EndOfStream);
            };
            self.frame.sync_word = (self.frame.sync_word << 8) | byte as u32;
            shifted += 1;
        }
    }

    fn read_frame<C: FrameCodec + ?Sized>(
        &mut self,
        codec: &C,
        extension: bool,
    ) -> Result<SyncWord, ReadError> {
        let (sync, skipped) = self.read_sync_word()?;

        if skipped > 0 {
            log_or_err!(
                self,
                Warn,
                ReadError::Desync {
                    skipped,
                    sync_word: self.frame.sync_word,
                }
            );
        }

        if extension && !sync.is_extension() {
            return Err(ReadError::NoExtensionSync {
                found: self.frame.sync_word,
            });
        }

        let size = self.read_frame_header(codec)?;
        // Little-endian 16-bit frames are stored in whole words; the last byte
        // of an odd-sized frame sits in the second half of its word.
        let stored = match sync.bitstream() {
            Some(Bitstream::Le16) => align_up(size, 2),
            _ => size,
        };
        let len = self.read_frame_data(codec, stored)?.min(size);
        self.frame.commit(len, extension);

        trace!("Read {sync} frame: {size} bytes stored, {len} bytes normalized");

        Ok(sync)
    }

    fn read_frame_header<C: FrameCodec + ?Sized>(&mut self, codec: &C) -> Result<usize, ReadError> {
        self.frame.load_sync_word();

        if !self
            .source
            .read_required(&mut self.frame.header[SYNC_WORD_SIZE..])?
        {
            return Err(ReadError::EndOfStream);
        }

        let size = codec.parse_header(&self.frame.header)?;
        if size < FRAME_HEADER_SIZE {
            return Err(HeaderError::Truncated {
                size,
                required: FRAME_HEADER_SIZE,
            }
            .into());
        }

        if !self.info.initialized() {
            let position = self.position()?;
            self.info
                .record_start(position.saturating_sub(FRAME_HEADER_SIZE as u64));
        }

        Ok(size)
    }

    fn read_frame_data<C: FrameCodec + ?Sized>(
        &mut self,
        codec: &C,
        size: usize,
    ) -> Result<usize, ReadError> {
        let header = self.frame.header;
        let buffer = self.frame.reserve(size)?;
        buffer[..FRAME_HEADER_SIZE].copy_from_slice(&header);

        if !self.source.read_required(&mut buffer[FRAME_HEADER_SIZE..])? {
            return Err(ReadError::EndOfStream);
        }

        let len = codec.normalize_bitstream(buffer)?;
        Ok(len.min(size))
    }

    /// Current read position of the source.
    pub fn position(&mut self) -> Result<u64, ReadError> {
        Ok(self.source.position(FilePosition::Current)?)
    }

    /// The assembled unit: aligned core frame followed by the aligned extension.
    pub fn unit(&self) -> &[u8] {
        self.frame.as_bytes()
    }

    pub fn core(&self) -> Option<&[u8]> {
        self.frame.core()
    }

    pub fn extension(&self) -> Option<&[u8]> {
        self.frame.extension()
    }

    /// Marker that opened the last unit, with the packing it was stored in.
    pub fn unit_sync(&self) -> Option<SyncWord> {
        self.unit_sync
    }

    /// Capacity of the reusable frame buffer.
    pub fn buffer_capacity(&self) -> usize {
        self.frame.capacity()
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Total byte length of the source.
    pub fn length(&self) -> u64 {
        self.info.length()
    }

    pub fn units_read(&self) -> u64 {
        self.units_read
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HeaderCodec;
    use crate::process::testing::{
        CoreFrameSpec, core_frame, exss_frame, filler, memory_source, pack_14bit, paired_stream,
    };
    use crate::structs::frame::{BUFFER_ALIGN, FRAME_ALIGN, align_up};
    use crate::structs::sync::{Bitstream, SYNC_WORD_CORE, SYNC_WORD_EXSS, is_sync_word};

    #[test]
    fn sync_scan_stops_after_marker() -> anyhow::Result<()> {
        for k in [0usize, 1, 3, 4, 5, 17, 255, 4099] {
            let mut data = filler(k, 7);
            data.extend_from_slice(&SYNC_WORD_CORE.to_be_bytes());
            data.extend_from_slice(&filler(64, 3));
            assert!(
                data.windows(4)
                    .filter(|w| is_sync_word(u32::from_be_bytes([w[0], w[1], w[2], w[3]])))
                    .count()
                    == 1
            );

            let mut reader = FrameReader::new(memory_source(data))?;
            let (sync, skipped) = reader.read_sync_word()?;
            assert!(sync.is_core());
            assert_eq!(skipped, k as u64);
            assert_eq!(reader.position()?, k as u64 + 4);
        }
        Ok(())
    }

    #[test]
    fn sync_scan_reports_exhaustion() -> anyhow::Result<()> {
        let mut reader = FrameReader::new(memory_source(filler(100, 1)))?;
        assert!(matches!(
            reader.read_sync_word(),
            Err(ReadError::EndOfStream)
        ));
        assert_eq!(reader.position()?, 100);
        Ok(())
    }

    #[test]
    fn pairs_core_and_extension_frames() -> anyhow::Result<()> {
        let (data, layout) = paired_stream(3, 302, Some(128))?;
        let mut reader = FrameReader::new(memory_source(data.clone()))?;

        for (core_at, ext_at) in layout {
            reader.read_unit(&HeaderCodec)?;
            let ext_at = ext_at.unwrap();

            assert_eq!(reader.core().unwrap(), &data[core_at..core_at + 302]);
            assert_eq!(reader.extension().unwrap(), &data[ext_at..ext_at + 128]);
            assert_eq!(reader.unit().len(), align_up(302, FRAME_ALIGN) + 128);
            assert_eq!(&reader.unit()[302..304], &[0, 0]);
        }

        assert!(matches!(
            reader.read_unit(&HeaderCodec),
            Err(ReadError::EndOfStream)
        ));
        assert_eq!(reader.units_read(), 3);
        Ok(())
    }

    #[test]
    fn core_only_units_do_not_error() -> anyhow::Result<()> {
        let (data, layout) = paired_stream(3, 256, None)?;
        let mut reader = FrameReader::new(memory_source(data.clone()))?;

        for (core_at, ext_at) in layout {
            assert!(ext_at.is_none());
            reader.read_unit(&HeaderCodec)?;
            assert_eq!(reader.core().unwrap(), &data[core_at..core_at + 256]);
            assert!(reader.extension().is_none());
            assert_eq!(reader.unit().len(), 256);
        }

        assert!(matches!(
            reader.read_unit(&HeaderCodec),
            Err(ReadError::EndOfStream)
        ));
        Ok(())
    }

    #[test]
    fn normalizes_little_endian_frames() -> anyhow::Result<()> {
        let (be, _) = paired_stream(2, 256, None)?;
        let mut le = be.clone();
        le.chunks_exact_mut(2).for_each(|word| word.swap(0, 1));

        let mut reader = FrameReader::new(memory_source(le))?;
        for unit in be.chunks(256) {
            reader.read_unit(&HeaderCodec)?;
            assert_eq!(reader.unit_sync(), Some(SyncWord::Core(Bitstream::Le16)));
            assert_eq!(reader.core().unwrap(), unit);
        }
        Ok(())
    }

    #[test]
    fn reads_odd_sized_little_endian_frames() -> anyhow::Result<()> {
        let odd = CoreFrameSpec {
            frame_size: 257,
            ..Default::default()
        };
        let mut be = core_frame(&odd, 1)?;
        be.push(0);
        let second_at = be.len();
        be.extend_from_slice(&core_frame(&CoreFrameSpec::default(), 2)?);

        let mut le = be.clone();
        le.chunks_exact_mut(2).for_each(|word| word.swap(0, 1));

        let mut reader = FrameReader::new(memory_source(le))?;
        reader.set_fail_level(log::Level::Warn);

        reader.read_unit(&HeaderCodec)?;
        assert_eq!(reader.core().unwrap(), &be[..257]);
        assert_eq!(reader.unit().len(), align_up(257, FRAME_ALIGN));

        reader.read_unit(&HeaderCodec)?;
        assert_eq!(reader.core().unwrap(), &be[second_at..]);
        Ok(())
    }

    #[test]
    fn reads_14bit_packed_units() -> anyhow::Result<()> {
        // 252 bytes are exactly 144 words of 14 bits, stored as 288 bytes.
        let spec = CoreFrameSpec {
            frame_size: 252,
            ..Default::default()
        };
        let frames = [core_frame(&spec, 0)?, core_frame(&spec, 1)?];

        for (little_endian, bitstream) in [(false, Bitstream::Be14), (true, Bitstream::Le14)] {
            let mut data = Vec::new();
            for frame in &frames {
                let packed = pack_14bit(frame, little_endian)?;
                assert_eq!(packed.len(), 288);
                data.extend_from_slice(&packed);
            }

            let mut reader = FrameReader::new(memory_source(data))?;
            reader.set_fail_level(log::Level::Warn);

            for frame in &frames {
                reader.read_unit(&HeaderCodec)?;
                assert_eq!(reader.unit_sync(), Some(SyncWord::Core(bitstream)));
                assert_eq!(reader.core().unwrap(), frame.as_slice());
                assert!(reader.extension().is_none());
            }
            assert_eq!(reader.position()?, 2 * 288);
            assert!(reader.read_unit(&HeaderCodec).unwrap_err().is_end_of_stream());
        }
        Ok(())
    }

    #[test]
    fn first_unit_sets_stream_info() -> anyhow::Result<()> {
        let mut data = filler(20, 5);
        let (frames, _) = paired_stream(4, 500, Some(100))?;
        data.extend_from_slice(&frames);
        let length = data.len() as u64;

        let mut reader = FrameReader::new(memory_source(data))?;
        assert!(!reader.info().initialized());

        reader.read_unit(&HeaderCodec)?;
        let info = reader.info().clone();
        assert!(info.initialized());
        assert_eq!(info.start(), 20);
        assert_eq!(info.length(), length);
        assert_eq!(info.frame_count(), (length - 20) / 1024);

        reader.read_unit(&HeaderCodec)?;
        assert_eq!(reader.info(), &info);
        Ok(())
    }

    #[test]
    fn strict_mode_rejects_skipped_bytes() -> anyhow::Result<()> {
        let mut data = filler(9, 2);
        data.extend_from_slice(&core_frame(&CoreFrameSpec::default(), 1)?);

        let mut lenient = FrameReader::new(memory_source(data.clone()))?;
        lenient.read_unit(&HeaderCodec)?;

        let mut strict = FrameReader::new(memory_source(data))?;
        strict.set_fail_level(log::Level::Warn);
        assert!(matches!(
            strict.read_unit(&HeaderCodec),
            Err(ReadError::Desync { skipped: 9, .. })
        ));
        Ok(())
    }

    #[test]
    fn malformed_header_fails_the_unit() -> anyhow::Result<()> {
        let mut frame = core_frame(&CoreFrameSpec::default(), 1)?;
        // Zero PCM blocks field.
        frame[4] &= 0b1111_1110;
        frame[5] &= 0b0000_0011;

        let mut reader = FrameReader::new(memory_source(frame))?;
        assert!(matches!(
            reader.read_unit(&HeaderCodec),
            Err(ReadError::Header(HeaderError::TooFewPcmBlocks(1)))
        ));
        Ok(())
    }

    #[test]
    fn truncated_frame_is_end_of_stream() -> anyhow::Result<()> {
        let mut frame = core_frame(&CoreFrameSpec::default(), 1)?;
        frame.truncate(100);

        let mut reader = FrameReader::new(memory_source(frame))?;
        assert!(reader.read_unit(&HeaderCodec).unwrap_err().is_end_of_stream());
        Ok(())
    }

    #[test]
    fn broken_extension_fails_the_unit() -> anyhow::Result<()> {
        let mut data = core_frame(&CoreFrameSpec::default(), 1)?;
        let mut ext = exss_frame(64, 2)?;
        // Header size field below 16 bytes.
        ext[5] &= 0b1110_0000;
        ext[6] &= 0b0001_1111;
        data.extend_from_slice(&ext);

        let mut reader = FrameReader::new(memory_source(data))?;
        assert!(matches!(
            reader.read_unit(&HeaderCodec),
            Err(ReadError::Header(HeaderError::InvalidSubstreamHeaderSize(1)))
        ));
        Ok(())
    }

    #[test]
    fn resync_skips_extension_markers() -> anyhow::Result<()> {
        let (data, layout) = paired_stream(3, 400, Some(200))?;
        let mut reader = FrameReader::new(memory_source(data.clone()))?;
        reader.read_unit(&HeaderCodec)?;
        reader.set_has_extensions(true);

        // Middle of the first core frame: the next marker is the first extension.
        let (first_core, first_ext) = layout[0];
        let (second_core, second_ext) = layout[1];
        reader.seek(first_core as u64 + 150)?;
        assert_eq!(reader.position()?, second_core as u64);

        reader.read_unit(&HeaderCodec)?;
        assert_eq!(reader.core().unwrap(), &data[second_core..second_core + 400]);
        let second_ext = second_ext.unwrap();
        assert_eq!(
            reader.extension().unwrap(),
            &data[second_ext..second_ext + 200]
        );

        // Inside the extension itself.
        reader.seek(first_ext.unwrap() as u64 + 2)?;
        assert_eq!(reader.position()?, second_core as u64);
        Ok(())
    }

    #[test]
    fn resync_without_extensions_takes_any_marker() -> anyhow::Result<()> {
        let (data, layout) = paired_stream(2, 400, Some(200))?;
        let mut reader = FrameReader::new(memory_source(data))?;

        let (first_core, first_ext) = layout[0];
        reader.seek(first_core as u64 + 150)?;
        assert_eq!(reader.position()?, first_ext.unwrap() as u64);

        reader.read_unit(&HeaderCodec)?;
        assert!(reader.core().is_some());
        assert!(reader.extension().is_none());
        assert_eq!(
            u32::from_be_bytes(reader.unit()[..4].try_into()?),
            SYNC_WORD_EXSS
        );
        Ok(())
    }

    #[test]
    fn seek_past_last_marker_fails() -> anyhow::Result<()> {
        let (data, layout) = paired_stream(2, 256, None)?;
        let mut reader = FrameReader::new(memory_source(data))?;

        assert!(matches!(
            reader.seek(layout[1].0 as u64 + 1),
            Err(ReadError::EndOfStream)
        ));
        assert!(reader.seek(1 << 20).is_err());
        Ok(())
    }

    #[test]
    fn buffer_grows_for_large_frames() -> anyhow::Result<()> {
        let mut data = Vec::new();
        for (i, size) in [256usize, 9000, 512, 16_383].into_iter().enumerate() {
            data.extend_from_slice(&core_frame(
                &CoreFrameSpec {
                    frame_size: size,
                    ..Default::default()
                },
                i,
            )?);
        }

        let mut reader = FrameReader::new(memory_source(data))?;
        let mut capacity = reader.buffer_capacity();
        let mut largest = 0;

        while reader.read_unit(&HeaderCodec).is_ok() {
            largest = largest.max(reader.unit().len());
            assert!(reader.buffer_capacity() >= capacity);
            assert!(reader.buffer_capacity() >= align_up(largest, BUFFER_ALIGN));
            capacity = reader.buffer_capacity();
        }
        assert_eq!(reader.units_read(), 4);
        Ok(())
    }
}
