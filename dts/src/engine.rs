//! Contract with the external decoding engine.
//!
//! The engine turns assembled frames into per-channel integer PCM. Header
//! level work ([`FrameCodec`]) has default implementations backed by
//! [`crate::structs::header`], so the frame reader can run without an engine
//! through [`HeaderCodec`].
//!
//! ## Sample Ownership
//!
//! Decoded samples stay owned by the engine context. [`EngineContext::plane`]
//! lends one channel as a slice; the borrow ends before the next
//! [`EngineContext::parse`], [`EngineContext::filter`] or
//! [`EngineContext::clear`] call, all of which take `&mut self`.

use crate::structs::header::{FRAME_HEADER_SIZE, FrameHeader, normalize_frame};
use crate::utils::errors::{EngineError, HeaderError};

/// Header-level frame operations used while synchronizing.
pub trait FrameCodec {
    /// Returns the encoded size of the frame starting with `header`.
    fn parse_header(&self, header: &[u8; FRAME_HEADER_SIZE]) -> Result<usize, HeaderError> {
        FrameHeader::parse(header).map(|h| h.frame_size())
    }

    /// Rewrites a complete frame into the layout the engine parses and returns
    /// its adjusted size.
    fn normalize_bitstream(&self, frame: &mut [u8]) -> Result<usize, HeaderError> {
        normalize_frame(frame)
    }
}

/// Engine-less codec for scanning and extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderCodec;

impl FrameCodec for HeaderCodec {}

/// Factory for decoding contexts.
pub trait Engine: FrameCodec {
    type Context: EngineContext;

    fn create_context(&self, flags: u32) -> Result<Self::Context, EngineError>;
}

/// Scalars reported by a successful filter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterOutput {
    /// Planes available through [`EngineContext::plane`]. May differ from
    /// the layout reported for the first unit of the stream.
    pub channels: usize,
    pub sample_count: usize,
    pub channel_mask: u32,
    pub sample_rate: u32,
    pub bits_per_sample: u32,
    pub profile: u32,
}

/// Core stream parameters exposed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreInfo {
    pub channels: usize,
    pub lfe_present: bool,
    pub sample_rate: u32,
    pub source_pcm_resolution: u32,
    pub es_format: bool,
    pub bit_rate: u32,
}

/// Extension substream parameters exposed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub channels: usize,
    pub sample_rate: u32,
    pub bits_per_sample: u32,
    pub profile: u32,
    pub embedded_stereo: bool,
    pub embedded_6ch: bool,
    pub spkr_mask: u32,
}

/// One decoding context, destroyed on drop.
pub trait EngineContext {
    fn parse(&mut self, frame: &[u8]) -> Result<(), EngineError>;

    fn filter(&mut self) -> Result<FilterOutput, EngineError>;

    /// Decoded samples of `channel` from the last successful filter step,
    /// for `channel` below [`FilterOutput::channels`].
    fn plane(&self, channel: usize) -> &[i32];

    /// Core metadata of the last parsed frame. The returned value is a copy;
    /// dropping it releases it.
    fn core_info(&self) -> Option<CoreInfo>;

    fn extension_info(&self) -> Option<ExtensionInfo>;

    /// Discards state carried over between frames.
    fn clear(&mut self);
}
