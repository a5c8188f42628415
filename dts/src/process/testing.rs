//! Synthetic streams and a deterministic engine for unit tests.

use std::io::Cursor;

use crate::engine::{
    CoreInfo, Engine, EngineContext, ExtensionInfo, FilterOutput, FrameCodec,
};
use crate::source::IoSource;
use crate::structs::frame::{FRAME_ALIGN, align_up};
use crate::structs::header::{CoreHeader, FRAME_HEADER_SIZE, FrameHeader};
use crate::structs::sync::{SYNC_WORD_CORE, SYNC_WORD_EXSS, SyncWord};
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::EngineError;

/// Fields of a synthetic 16-bit big-endian core header.
#[derive(Debug, Clone)]
pub struct CoreFrameSpec {
    pub frame_size: usize,
    pub pcm_blocks: u8,
    pub audio_mode: u8,
    pub sample_rate_code: u8,
    pub lfe: u8,
    pub bit_rate_code: u8,
    pub pcm_resolution_code: u8,
    pub crc_present: bool,
}

impl Default for CoreFrameSpec {
    fn default() -> Self {
        Self {
            frame_size: 256,
            pcm_blocks: 8,
            audio_mode: 2,
            sample_rate_code: 13,
            lfe: 0,
            bit_rate_code: 24,
            pcm_resolution_code: 6,
            crc_present: false,
        }
    }
}

pub fn core_header_bytes(spec: &CoreFrameSpec) -> anyhow::Result<[u8; FRAME_HEADER_SIZE]> {
    let mut writer = BsIoVecWriter::with_capacity(FRAME_HEADER_SIZE);
    writer.put_n(32, SYNC_WORD_CORE)?;
    writer.put(true)?;
    writer.put_n(5, 31u8)?;
    writer.put(spec.crc_present)?;
    writer.put_n(7, spec.pcm_blocks - 1)?;
    writer.put_n(14, (spec.frame_size - 1) as u16)?;
    writer.put_n(6, spec.audio_mode)?;
    writer.put_n(4, spec.sample_rate_code)?;
    writer.put_n(5, spec.bit_rate_code)?;
    // reserved, DRC, time stamp, aux, HDCD
    writer.put_n(5, 0u8)?;
    // extension audio type and flag, sync SSF
    writer.put_n(5, 0u8)?;
    writer.put_n(2, spec.lfe)?;
    writer.put(false)?;
    if spec.crc_present {
        writer.put_n(16, 0u16)?;
    }
    writer.put(false)?;
    writer.put_n(4, 7u8)?;
    writer.put_n(2, 0u8)?;
    writer.put_n(3, spec.pcm_resolution_code)?;

    to_header(writer)
}

pub fn exss_header_bytes(frame_size: usize, wide: bool) -> anyhow::Result<[u8; FRAME_HEADER_SIZE]> {
    let extra = if wide { 4 } else { 0 };

    let mut writer = BsIoVecWriter::with_capacity(FRAME_HEADER_SIZE);
    writer.put_n(32, SYNC_WORD_EXSS)?;
    writer.put_n(8, 0u8)?;
    writer.put_n(2, 0u8)?;
    writer.put(wide)?;
    writer.put_n(8 + extra, (FRAME_HEADER_SIZE - 1) as u32)?;
    writer.put_n(16 + extra, (frame_size - 1) as u32)?;

    to_header(writer)
}

fn to_header(writer: BsIoVecWriter) -> anyhow::Result<[u8; FRAME_HEADER_SIZE]> {
    let bytes = writer.finish()?;
    anyhow::ensure!(bytes.len() <= FRAME_HEADER_SIZE, "header of {} bytes", bytes.len());

    let mut header = [0u8; FRAME_HEADER_SIZE];
    header[..bytes.len()].copy_from_slice(&bytes);
    Ok(header)
}

/// Payload bytes that never start a sync word.
pub fn filler(len: usize, seed: usize) -> Vec<u8> {
    (0..len)
        .map(|i| 0x20 + ((seed * 13 + i * 7) % 32) as u8)
        .collect()
}

pub fn core_frame(spec: &CoreFrameSpec, seed: usize) -> anyhow::Result<Vec<u8>> {
    let mut frame = core_header_bytes(spec)?.to_vec();
    frame.extend_from_slice(&filler(spec.frame_size - FRAME_HEADER_SIZE, seed));
    Ok(frame)
}

pub fn exss_frame(frame_size: usize, seed: usize) -> anyhow::Result<Vec<u8>> {
    let mut frame = exss_header_bytes(frame_size, false)?.to_vec();
    frame.extend_from_slice(&filler(frame_size - FRAME_HEADER_SIZE, seed + 100));
    Ok(frame)
}

/// `units` core frames of `core_size` bytes, each followed by an extension
/// frame of `ext_size` bytes when given.
///
/// Returns the stream and the offset of every frame.
pub fn paired_stream(
    units: usize,
    core_size: usize,
    ext_size: Option<usize>,
) -> anyhow::Result<(Vec<u8>, Vec<(usize, Option<usize>)>)> {
    let spec = CoreFrameSpec {
        frame_size: core_size,
        ..Default::default()
    };

    let mut data = Vec::new();
    let mut layout = Vec::new();
    for unit in 0..units {
        let core_at = data.len();
        data.extend_from_slice(&core_frame(&spec, unit)?);

        let ext_at = match ext_size {
            Some(size) => {
                let at = data.len();
                data.extend_from_slice(&exss_frame(size, unit)?);
                Some(at)
            }
            None => None,
        };
        layout.push((core_at, ext_at));
    }

    Ok((data, layout))
}

/// Repacks a 16-bit big-endian frame into 14-bit words, sign extended to 16
/// bits as stored on disc.
pub fn pack_14bit(frame: &[u8], little_endian: bool) -> anyhow::Result<Vec<u8>> {
    let bits = frame.len() * 8;
    anyhow::ensure!(bits % 14 == 0, "{} bytes are not whole 14-bit words", frame.len());

    let mut reader = BsIoSliceReader::from_slice(frame);
    let mut packed = Vec::with_capacity(bits / 14 * 2);
    for _ in 0..bits / 14 {
        let value = reader.get_n::<u16>(14)?;
        let word = if value & 0x2000 != 0 { value | 0xC000 } else { value };
        let bytes = if little_endian {
            word.to_le_bytes()
        } else {
            word.to_be_bytes()
        };
        packed.extend_from_slice(&bytes);
    }

    Ok(packed)
}

pub fn memory_source(data: Vec<u8>) -> IoSource<Cursor<Vec<u8>>> {
    IoSource::new(Cursor::new(data)).expect("in-memory source")
}

/// Sample the mock engine produces for `channel` at `index`, where
/// `history` counts the frames filtered since the last clear.
pub fn mock_sample(payload: &[u8], bits: u32, history: usize, channel: usize, index: usize) -> i32 {
    let byte = payload[(index * 3 + channel) % payload.len()] as i32;
    ((byte - 0x30) << (bits - 8)) + history as i32
}

/// Engine double decoding the synthetic frames built above.
///
/// Samples derive from the core payload bytes plus a per-context history
/// counter, so a missing [`EngineContext::clear`] shows up in the output.
/// A unit with an extension frame reports two extra channels at twice the
/// core sample rate.
#[derive(Debug, Clone)]
pub struct MockEngine {
    pub bits_per_sample: u32,
    pub fail_context: bool,
    pub fail_filter_after: Option<usize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            bits_per_sample: 16,
            fail_context: false,
            fail_filter_after: None,
        }
    }
}

impl FrameCodec for MockEngine {}

impl Engine for MockEngine {
    type Context = MockContext;

    fn create_context(&self, flags: u32) -> Result<MockContext, EngineError> {
        if self.fail_context {
            return Err(EngineError::Context(format!("refused flags {flags:#x}")));
        }

        Ok(MockContext {
            bits: self.bits_per_sample,
            fail_filter_after: self.fail_filter_after,
            ..Default::default()
        })
    }
}

#[derive(Debug, Default)]
pub struct MockContext {
    bits: u32,
    fail_filter_after: Option<usize>,
    core: Option<CoreHeader>,
    payload: Vec<u8>,
    extension: bool,
    planes: Vec<Vec<i32>>,
    history: usize,
    filtered: usize,
    pub clears: usize,
}

impl MockContext {
    fn output_channels(&self, core: &CoreHeader) -> usize {
        core.channels() + if self.extension { 2 } else { 0 }
    }
}

impl EngineContext for MockContext {
    fn parse(&mut self, frame: &[u8]) -> Result<(), EngineError> {
        let header: [u8; FRAME_HEADER_SIZE] = frame
            .get(..FRAME_HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or(EngineError::Parse(-1))?;
        let FrameHeader::Core(core) = FrameHeader::parse(&header)? else {
            return Err(EngineError::Parse(-2));
        };

        let core_len = core.frame_size.min(frame.len());
        let ext_at = align_up(core_len, FRAME_ALIGN);
        self.extension = frame
            .get(ext_at..ext_at + 4)
            .and_then(|w| SyncWord::classify(u32::from_be_bytes([w[0], w[1], w[2], w[3]])))
            .is_some_and(|sync| sync.is_extension());
        self.payload = frame[FRAME_HEADER_SIZE..core_len].to_vec();
        self.core = Some(core);

        Ok(())
    }

    fn filter(&mut self) -> Result<FilterOutput, EngineError> {
        let core = self.core.clone().ok_or(EngineError::Filter(-1))?;
        if self.fail_filter_after.is_some_and(|limit| self.filtered >= limit) {
            return Err(EngineError::Filter(-3));
        }

        let channels = self.output_channels(&core);
        let samples = core.samples_per_frame();
        self.planes = (0..channels)
            .map(|ch| {
                (0..samples)
                    .map(|i| mock_sample(&self.payload, self.bits, self.history, ch, i))
                    .collect()
            })
            .collect();
        self.history += 1;
        self.filtered += 1;

        Ok(FilterOutput {
            channels,
            sample_count: samples,
            channel_mask: (1 << channels) - 1,
            sample_rate: core.sample_rate() * if self.extension { 2 } else { 1 },
            bits_per_sample: self.bits,
            profile: if self.extension { 2 } else { 1 },
        })
    }

    fn plane(&self, channel: usize) -> &[i32] {
        self.planes.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    fn core_info(&self) -> Option<CoreInfo> {
        self.core.as_ref().map(|core| CoreInfo {
            channels: core.channels(),
            lfe_present: core.lfe != 0,
            sample_rate: core.sample_rate(),
            source_pcm_resolution: core.source_resolution().unwrap_or(0),
            es_format: false,
            bit_rate: core.bit_rate().unwrap_or(0),
        })
    }

    fn extension_info(&self) -> Option<ExtensionInfo> {
        let core = self.core.as_ref().filter(|_| self.extension)?;

        Some(ExtensionInfo {
            channels: self.output_channels(core),
            sample_rate: core.sample_rate() * 2,
            bits_per_sample: self.bits,
            profile: 2,
            embedded_stereo: true,
            embedded_6ch: false,
            spkr_mask: 0x000F,
        })
    }

    fn clear(&mut self) {
        self.history = 0;
        self.planes.clear();
        self.clears += 1;
    }
}
