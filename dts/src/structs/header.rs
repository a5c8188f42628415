//! Frame headers and bitstream normalization.
//!
//! Every frame starts with a fixed 16-byte header window holding the sync word
//! followed by enough fields to know the encoded size of the frame:
//!
//! - **Core header**: frame type, deficit samples, PCM block count, frame
//!   size, audio mode, sampling frequency, bit rate and source resolution.
//! - **Extension substream header**: substream index, header size and frame
//!   size, with an optional wide layout for large frames.
//!
//! Frames stored as little-endian 16-bit words or as 14-bit words are
//! normalized to the 16-bit big-endian layout before any field is read.

use log::trace;

use crate::structs::sync::{Bitstream, SYNC_WORD_SIZE, SyncWord};
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::HeaderError;

/// Size of the header window read after a sync word is found (sync included).
pub const FRAME_HEADER_SIZE: usize = 16;

/// Minimum encoded core frame size in bytes.
pub const MIN_CORE_FRAME_SIZE: usize = 96;

/// Samples produced by each PCM block of a core frame.
pub const SAMPLES_PER_PCM_BLOCK: usize = 32;

const SAMPLE_RATES: [u32; 16] = [
    0, 8000, 16000, 32000, 0, 0, 11025, 22050, 44100, 0, 0, 12000, 24000, 48000, 0, 0,
];

const AUDIO_MODE_CHANNELS: [usize; 16] = [1, 2, 2, 2, 2, 3, 3, 4, 4, 5, 6, 6, 6, 7, 8, 8];

const PCM_RESOLUTIONS: [u32; 8] = [16, 16, 20, 20, 0, 24, 24, 0];

#[rustfmt::skip]
const BIT_RATES: [u32; 29] = [
      32_000,   56_000,   64_000,   96_000,  112_000,  128_000,  192_000,  224_000,
     256_000,  320_000,  384_000,  448_000,  512_000,  576_000,  640_000,  768_000,
     960_000, 1_024_000, 1_152_000, 1_280_000, 1_344_000, 1_408_000, 1_411_200, 1_472_000,
   1_536_000, 1_920_000, 2_048_000, 3_072_000, 3_840_000,
];

/// Parsed frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameHeader {
    Core(CoreHeader),
    Substream(SubstreamHeader),
}

impl FrameHeader {
    /// Parses the 16-byte header window of a frame.
    ///
    /// Returns [`HeaderError::NoSync`] for markers without a parsable header
    /// (XCH, XXCH and X96 only appear embedded inside core frames).
    pub fn parse(header: &[u8; FRAME_HEADER_SIZE]) -> Result<Self, HeaderError> {
        let sync_word = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let Some(sync) = SyncWord::classify(sync_word) else {
            return Err(HeaderError::NoSync(sync_word));
        };
        let Some(bitstream) = sync.bitstream() else {
            return Err(HeaderError::NoSync(sync_word));
        };

        let mut window = *header;
        let len = normalize(bitstream, &mut window)?;
        let reader = &mut BsIoSliceReader::from_slice(&window[..len]);
        reader.skip_n(32)?;

        let parsed = match sync {
            SyncWord::Core(_) => FrameHeader::Core(CoreHeader::read(bitstream, reader)?),
            _ => FrameHeader::Substream(SubstreamHeader::read(bitstream, reader)?),
        };
        trace!("Parsed {sync} header: {} bytes", parsed.frame_size());

        Ok(parsed)
    }

    /// Encoded size of the whole frame as stored in the source, header included.
    pub fn frame_size(&self) -> usize {
        match self {
            FrameHeader::Core(core) => core.frame_size,
            FrameHeader::Substream(exss) => exss.frame_size,
        }
    }

    pub fn bitstream(&self) -> Bitstream {
        match self {
            FrameHeader::Core(core) => core.bitstream,
            FrameHeader::Substream(exss) => exss.bitstream,
        }
    }
}

/// Core frame header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreHeader {
    pub bitstream: Bitstream,
    pub normal_frame: bool,
    pub deficit_samples: u8,
    pub crc_present: bool,
    pub pcm_blocks: u8,
    /// Stored frame size in bytes. For 14-bit streams this is the size of
    /// the packed words on disk, not of the normalized frame.
    pub frame_size: usize,
    pub audio_mode: u8,
    pub sample_rate_code: u8,
    pub bit_rate_code: u8,
    pub drc_present: bool,
    pub ts_present: bool,
    pub aux_present: bool,
    pub hdcd_master: bool,
    pub ext_audio_type: u8,
    pub ext_audio_present: bool,
    pub sync_ssf: bool,
    pub lfe: u8,
    pub predictor_history: bool,
    pub filter_perfect: bool,
    pub encoder_revision: u8,
    pub copy_history: u8,
    pub pcm_resolution_code: u8,
}

impl CoreHeader {
    fn read(bitstream: Bitstream, reader: &mut BsIoSliceReader) -> Result<Self, HeaderError> {
        let normal_frame = reader.get()?;
        let deficit_samples = reader.get_n::<u8>(5)? + 1;
        if normal_frame && deficit_samples != SAMPLES_PER_PCM_BLOCK as u8 {
            return Err(HeaderError::InvalidDeficitSamples(deficit_samples));
        }

        let crc_present = reader.get()?;
        let pcm_blocks = reader.get_n::<u8>(7)? + 1;
        if pcm_blocks < 6 {
            return Err(HeaderError::TooFewPcmBlocks(pcm_blocks));
        }

        let mut frame_size = reader.get_n::<u32>(14)? as usize + 1;
        if frame_size < MIN_CORE_FRAME_SIZE {
            return Err(HeaderError::CoreFrameTooSmall(frame_size));
        }
        if matches!(bitstream, Bitstream::Be14 | Bitstream::Le14) {
            frame_size = frame_size * 8 / 14 * 2;
        }

        let audio_mode = reader.get_n::<u8>(6)?;
        if audio_mode as usize >= AUDIO_MODE_CHANNELS.len() {
            return Err(HeaderError::InvalidAudioMode(audio_mode));
        }

        let sample_rate_code = reader.get_n::<u8>(4)?;
        if SAMPLE_RATES[sample_rate_code as usize] == 0 {
            return Err(HeaderError::InvalidSampleRate(sample_rate_code));
        }

        let bit_rate_code = reader.get_n::<u8>(5)?;
        reader.skip_n(1)?;

        let mut header = Self {
            bitstream,
            normal_frame,
            deficit_samples,
            crc_present,
            pcm_blocks,
            frame_size,
            audio_mode,
            sample_rate_code,
            bit_rate_code,
            drc_present: reader.get()?,
            ts_present: reader.get()?,
            aux_present: reader.get()?,
            hdcd_master: reader.get()?,
            ext_audio_type: reader.get_n(3)?,
            ext_audio_present: reader.get()?,
            sync_ssf: reader.get()?,
            lfe: reader.get_n(2)?,
            predictor_history: reader.get()?,
            filter_perfect: false,
            encoder_revision: 0,
            copy_history: 0,
            pcm_resolution_code: 0,
        };

        if header.lfe == 3 {
            return Err(HeaderError::InvalidLfe(header.lfe));
        }

        if header.crc_present {
            reader.skip_n(16)?;
        }

        header.filter_perfect = reader.get()?;
        header.encoder_revision = reader.get_n(4)?;
        header.copy_history = reader.get_n(2)?;
        header.pcm_resolution_code = reader.get_n(3)?;

        Ok(header)
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.sample_rate_code as usize]
    }

    /// Full-bandwidth channels plus the LFE channel when present.
    pub fn channels(&self) -> usize {
        AUDIO_MODE_CHANNELS[self.audio_mode as usize] + usize::from(self.lfe != 0)
    }

    pub fn samples_per_frame(&self) -> usize {
        self.pcm_blocks as usize * SAMPLES_PER_PCM_BLOCK
    }

    /// Source PCM resolution in bits, `None` for reserved codes.
    pub fn source_resolution(&self) -> Option<u32> {
        match PCM_RESOLUTIONS[self.pcm_resolution_code as usize] {
            0 => None,
            bits => Some(bits),
        }
    }

    /// Nominal bit rate in bits per second, `None` for open, variable and
    /// lossless rate codes.
    pub fn bit_rate(&self) -> Option<u32> {
        BIT_RATES.get(self.bit_rate_code as usize).copied()
    }
}

/// Extension substream header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstreamHeader {
    pub bitstream: Bitstream,
    pub user_data: u8,
    pub index: u8,
    pub wide_header: bool,
    pub header_size: usize,
    pub frame_size: usize,
}

impl SubstreamHeader {
    fn read(bitstream: Bitstream, reader: &mut BsIoSliceReader) -> Result<Self, HeaderError> {
        let user_data = reader.get_n::<u8>(8)?;
        let index = reader.get_n::<u8>(2)?;
        let wide_header = reader.get()?;
        let wide = if wide_header { 4 } else { 0 };

        let header_size = reader.get_n::<u32>(8 + wide)? as usize + 1;
        if header_size & 3 != 0 || header_size < FRAME_HEADER_SIZE {
            return Err(HeaderError::InvalidSubstreamHeaderSize(header_size));
        }

        let frame_size = reader.get_n::<u32>(16 + wide)? as usize + 1;
        if frame_size & 3 != 0 || frame_size < header_size {
            return Err(HeaderError::InvalidSubstreamFrameSize {
                size: frame_size,
                header: header_size,
            });
        }

        Ok(Self {
            bitstream,
            user_data,
            index,
            wide_header,
            header_size,
            frame_size,
        })
    }
}

/// Rewrites `buf` in place into the 16-bit big-endian layout.
///
/// Returns the number of meaningful bytes left at the front of `buf`. The
/// size only shrinks for 14-bit streams, where every 16-bit word carries 14
/// payload bits; a trailing partial byte is zero padded.
pub fn normalize(bitstream: Bitstream, buf: &mut [u8]) -> Result<usize, HeaderError> {
    match bitstream {
        Bitstream::Be16 => Ok(buf.len()),
        Bitstream::Le16 => {
            buf.chunks_exact_mut(2).for_each(|word| word.swap(0, 1));
            Ok(buf.len())
        }
        Bitstream::Be14 | Bitstream::Le14 => {
            let words = buf.len() / 2;
            let mut writer = BsIoVecWriter::with_capacity(words * 14 / 8 + 1);

            for word in buf.chunks_exact(2) {
                let value = match bitstream {
                    Bitstream::Be14 => u16::from_be_bytes([word[0], word[1]]),
                    _ => u16::from_le_bytes([word[0], word[1]]),
                };
                writer.put_n(14, value & 0x3FFF)?;
            }

            let packed = writer.finish()?;
            buf[..packed.len()].copy_from_slice(&packed);
            Ok(packed.len())
        }
    }
}

/// Detects the packing of a frame from its leading sync word and normalizes it.
pub fn normalize_frame(buf: &mut [u8]) -> Result<usize, HeaderError> {
    if buf.len() < SYNC_WORD_SIZE {
        return Err(HeaderError::Truncated {
            size: buf.len(),
            required: SYNC_WORD_SIZE,
        });
    }

    let sync_word = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let bitstream = SyncWord::classify(sync_word)
        .and_then(|sync| sync.bitstream())
        .ok_or(HeaderError::NoSync(sync_word))?;

    normalize(bitstream, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::{CoreFrameSpec, core_header_bytes, exss_header_bytes};
    use crate::structs::sync::{SYNC_WORD_CORE, SYNC_WORD_CORE_LE};

    #[test]
    fn parse_core_header() -> anyhow::Result<()> {
        let spec = CoreFrameSpec {
            frame_size: 1006,
            pcm_blocks: 16,
            audio_mode: 9,
            sample_rate_code: 13,
            lfe: 1,
            ..Default::default()
        };
        let header = core_header_bytes(&spec)?;

        let FrameHeader::Core(core) = FrameHeader::parse(&header)? else {
            panic!("expected a core header");
        };
        assert_eq!(core.frame_size, 1006);
        assert_eq!(core.samples_per_frame(), 512);
        assert_eq!(core.channels(), 6);
        assert_eq!(core.sample_rate(), 48000);
        assert_eq!(core.source_resolution(), Some(24));
        assert_eq!(core.bit_rate(), Some(1_536_000));
        Ok(())
    }

    #[test]
    fn parse_substream_header() -> anyhow::Result<()> {
        let header = exss_header_bytes(2048, false)?;
        let FrameHeader::Substream(exss) = FrameHeader::parse(&header)? else {
            panic!("expected an extension substream header");
        };
        assert_eq!(exss.frame_size, 2048);
        assert_eq!(exss.header_size, 16);

        let wide = exss_header_bytes(0x2_0000, true)?;
        assert_eq!(FrameHeader::parse(&wide)?.frame_size(), 0x2_0000);
        Ok(())
    }

    #[test]
    fn reject_invalid_headers() -> anyhow::Result<()> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        header[..4].copy_from_slice(&crate::structs::sync::SYNC_WORD_XCH.to_be_bytes());
        assert!(matches!(
            FrameHeader::parse(&header),
            Err(HeaderError::NoSync(_))
        ));

        let small = core_header_bytes(&CoreFrameSpec {
            frame_size: 64,
            ..Default::default()
        })?;
        assert_eq!(
            FrameHeader::parse(&small),
            Err(HeaderError::CoreFrameTooSmall(64))
        );

        let bad_rate = core_header_bytes(&CoreFrameSpec {
            sample_rate_code: 4,
            ..Default::default()
        })?;
        assert_eq!(
            FrameHeader::parse(&bad_rate),
            Err(HeaderError::InvalidSampleRate(4))
        );
        Ok(())
    }

    #[test]
    fn parse_little_endian_core_header() -> anyhow::Result<()> {
        let be = core_header_bytes(&CoreFrameSpec::default())?;
        let mut le = be;
        le.chunks_exact_mut(2).for_each(|word| word.swap(0, 1));
        assert_eq!(
            u32::from_be_bytes([le[0], le[1], le[2], le[3]]),
            SYNC_WORD_CORE_LE
        );

        let parsed = FrameHeader::parse(&le)?;
        assert_eq!(parsed.bitstream(), Bitstream::Le16);
        assert_eq!(parsed.frame_size(), FrameHeader::parse(&be)?.frame_size());
        Ok(())
    }

    #[test]
    fn normalize_14bit_words() -> anyhow::Result<()> {
        // 0x1FFF 0xE800 carries the 28 bits 0x7FFE800 of the 16-bit sync word.
        let mut buf = [0x1F, 0xFF, 0xE8, 0x00, 0x3F, 0xFF, 0x00, 0x00];
        let len = normalize(Bitstream::Be14, &mut buf)?;
        assert_eq!(len, 7);
        assert_eq!(&buf[..4], &[0x7F, 0xFE, 0x80, 0x0F]);

        let mut le = [0xFF, 0x1F, 0x00, 0xE8];
        assert_eq!(normalize(Bitstream::Le14, &mut le)?, 4);
        assert_eq!(&le[..3], &[0x7F, 0xFE, 0x80]);
        Ok(())
    }

    #[test]
    fn normalize_frame_detects_packing() -> anyhow::Result<()> {
        let mut be = SYNC_WORD_CORE.to_be_bytes().to_vec();
        be.extend_from_slice(&[1, 2, 3, 4]);
        assert_eq!(normalize_frame(&mut be)?, 8);
        assert_eq!(&be[4..], &[1, 2, 3, 4]);

        let mut le = SYNC_WORD_CORE_LE.to_be_bytes().to_vec();
        le.extend_from_slice(&[1, 2, 3, 4]);
        normalize_frame(&mut le)?;
        assert_eq!(le, [0x7F, 0xFE, 0x80, 0x01, 2, 1, 4, 3]);

        assert!(normalize_frame(&mut [0u8; 2]).is_err());
        Ok(())
    }
}
