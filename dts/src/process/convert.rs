use crate::structs::format::{AudioFormat, OutputEncoding};
use crate::utils::errors::ConvertError;

/// Bit depths the engine may report for decoded samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDepth {
    Bits16,
    Bits24,
    Bits32,
}

impl InputDepth {
    pub fn from_bits(bits: u32) -> Result<Self, ConvertError> {
        match bits {
            16 => Ok(InputDepth::Bits16),
            24 => Ok(InputDepth::Bits24),
            32 => Ok(InputDepth::Bits32),
            _ => Err(ConvertError::UnsupportedInputDepth(bits)),
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            InputDepth::Bits16 => 16,
            InputDepth::Bits24 => 24,
            InputDepth::Bits32 => 32,
        }
    }

    /// `2^bits`, the span of the input's integer range.
    fn full_scale(&self) -> f64 {
        (1u64 << self.bits()) as f64
    }
}

/// Converts decoded integer samples into the output encoding.
///
/// Resolved once per stream; every valid (input depth, output encoding) pair
/// has a conversion, so no fallible lookup happens per sample.
///
/// - integer output: `sample × 2^(16 − bits)`, truncated toward zero
/// - float output: `(sample + 0.5) / (2^bits + 0.5)`
///
/// Samples are written in native byte order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Converter {
    input: InputDepth,
    output: OutputEncoding,
    int_scale: f64,
    float_divisor: f64,
}

impl Converter {
    pub fn new(input_bits: u32, output: OutputEncoding) -> Result<Self, ConvertError> {
        let input = InputDepth::from_bits(input_bits)?;

        Ok(Self {
            input,
            output,
            int_scale: 2f64.powi(16 - input.bits() as i32),
            float_divisor: input.full_scale() + 0.5,
        })
    }

    pub fn input(&self) -> InputDepth {
        self.input
    }

    pub fn output(&self) -> OutputEncoding {
        self.output
    }

    pub fn output_format(&self) -> AudioFormat {
        self.output.format()
    }

    #[inline(always)]
    pub fn to_i16(&self, sample: i32) -> i16 {
        (sample as f64 * self.int_scale) as i16
    }

    #[inline(always)]
    pub fn to_f32(&self, sample: i32) -> f32 {
        ((sample as f64 + 0.5) / self.float_divisor) as f32
    }

    /// Writes `sample` into interleaved slot `position` of `dst`.
    #[inline(always)]
    pub fn write(&self, dst: &mut [u8], position: usize, sample: i32) {
        match self.output {
            OutputEncoding::Int16 => {
                let offset = position * 2;
                dst[offset..offset + 2].copy_from_slice(&self.to_i16(sample).to_ne_bytes());
            }
            OutputEncoding::Float32 => {
                let offset = position * 4;
                dst[offset..offset + 4].copy_from_slice(&self.to_f32(sample).to_ne_bytes());
            }
        }
    }
}
