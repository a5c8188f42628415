//! Sample format descriptors.

use std::fmt::Display;

/// Encoding of the samples handed to the playback pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputEncoding {
    /// Signed 16-bit integers.
    #[default]
    Int16,
    /// 32-bit IEEE floats.
    Float32,
}

impl OutputEncoding {
    /// Maps the host's "float output" flag.
    pub fn from_float_flag(float: bool) -> Self {
        if float {
            OutputEncoding::Float32
        } else {
            OutputEncoding::Int16
        }
    }

    pub fn bits_per_sample(&self) -> u32 {
        match self {
            OutputEncoding::Int16 => 16,
            OutputEncoding::Float32 => 32,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample() as usize / 8
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            bits_per_sample: self.bits_per_sample(),
            bytes_per_sample: self.bytes_per_sample(),
            samples_per_frame: 0,
        }
    }
}

impl Display for OutputEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputEncoding::Int16 => write!(f, "16-bit integer"),
            OutputEncoding::Float32 => write!(f, "32-bit float"),
        }
    }
}

/// Bit depth and frame geometry of a sample stream.
///
/// `samples_per_frame` is only meaningful for the decoded input side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFormat {
    pub bits_per_sample: u32,
    pub bytes_per_sample: usize,
    pub samples_per_frame: usize,
}

impl AudioFormat {
    pub fn input(bits_per_sample: u32, samples_per_frame: usize) -> Self {
        Self {
            bits_per_sample,
            bytes_per_sample: bits_per_sample as usize / 8,
            samples_per_frame,
        }
    }
}

/// Stream facts reported to the playback driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channels: usize,
    pub sample_rate: u32,
    /// Bit depth of the decoded samples before conversion.
    pub original_bits: u32,
}
