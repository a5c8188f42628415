//! Pull-based decode and conversion of one DTS stream.
//!
//! A [`Session`] owns the frame reader, the engine and one decoding context.
//! The playback side repeatedly asks for output bytes; the session refills
//! from the next unit whenever the decoded samples run out, and only ever
//! writes whole interleaved sample frames.

use std::fmt::Display;

use log::{debug, info, trace, warn};

use crate::engine::{Engine, EngineContext, FilterOutput};
use crate::process::convert::Converter;
use crate::process::estimate::estimate_length_bytes;
use crate::process::reader::FrameReader;
use crate::source::ByteSource;
use crate::structs::format::{AudioFormat, ChannelInfo, OutputEncoding};
use crate::utils::errors::{EngineError, SessionError};

/// Options fixed at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub output: OutputEncoding,
    /// Passed through to [`Engine::create_context`].
    pub engine_flags: u32,
    /// Level at which recoverable stream damage becomes an error.
    pub fail_level: log::Level,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output: OutputEncoding::Int16,
            engine_flags: 0,
            fail_level: log::Level::Error,
        }
    }
}

/// Unit of host positions and lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionUnit {
    Bytes,
    Samples,
    Seconds,
}

impl Display for PositionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionUnit::Bytes => write!(f, "bytes"),
            PositionUnit::Samples => write!(f, "samples"),
            PositionUnit::Seconds => write!(f, "seconds"),
        }
    }
}

pub struct Session<S: ByteSource, E: Engine> {
    reader: FrameReader<S>,
    engine: E,
    context: E::Context,
    converter: Converter,
    input_format: AudioFormat,
    output_format: AudioFormat,
    channel_count: usize,
    decoded_channels: usize,
    sample_rate: u32,
    sample_count: usize,
    sample_position: usize,
    channel_mask: u32,
    profile: u32,
}

fn decode_unit<S: ByteSource, E: Engine>(
    reader: &mut FrameReader<S>,
    engine: &E,
    context: &mut E::Context,
) -> Result<FilterOutput, SessionError> {
    reader.read_unit(engine)?;
    context.parse(reader.unit())?;
    Ok(context.filter()?)
}

/// Samples of the last unit that every decoded output channel can supply.
fn available_samples<C: EngineContext>(
    context: &C,
    output: &FilterOutput,
    channel_count: usize,
) -> usize {
    (0..output.channels.min(channel_count))
        .map(|channel| context.plane(channel).len())
        .fold(output.sample_count, usize::min)
}

impl<S: ByteSource, E: Engine> Session<S, E> {
    /// Opens a stream: decodes its first unit to learn the channel layout,
    /// sample rate and decoded bit depth, then fixes the sample conversion.
    ///
    /// The channel count and sample rate come from the extension substream
    /// when the engine reports one, otherwise from the core.
    pub fn create(source: S, engine: E, config: SessionConfig) -> Result<Self, SessionError> {
        let mut reader = FrameReader::new(source)?;
        reader.set_fail_level(config.fail_level);

        let mut context = engine.create_context(config.engine_flags)?;

        let output = match decode_unit(&mut reader, &engine, &mut context) {
            Ok(output) => output,
            Err(SessionError::Source(e)) if e.is_end_of_stream() => {
                return Err(SessionError::NoInitialFrame);
            }
            Err(e) => return Err(e),
        };

        let core = context.core_info().ok_or(EngineError::MissingCoreInfo)?;
        let (channel_count, sample_rate) = match context.extension_info() {
            Some(extension) => {
                reader.set_has_extensions(true);
                (extension.channels, extension.sample_rate)
            }
            None => {
                reader.set_has_extensions(false);
                (core.channels, core.sample_rate)
            }
        };

        if channel_count == 0 {
            return Err(SessionError::NotAvailable(
                "stream reports no channels".to_string(),
            ));
        }

        let converter = Converter::new(output.bits_per_sample, config.output)?;
        let sample_count = available_samples(&context, &output, channel_count);

        info!(
            "Opened stream: {channel_count} channels, {sample_rate} Hz, {}-bit decode to {}{}",
            output.bits_per_sample,
            config.output,
            if reader.info().has_extensions() {
                ", with extension substream"
            } else {
                ""
            }
        );

        Ok(Self {
            reader,
            engine,
            context,
            converter,
            input_format: AudioFormat::input(output.bits_per_sample, output.sample_count),
            output_format: converter.output_format(),
            channel_count,
            decoded_channels: output.channels,
            sample_rate,
            sample_count,
            sample_position: 0,
            channel_mask: output.channel_mask,
            profile: output.profile,
        })
    }

    /// Decodes the next unit. `false` means no more data, whatever the cause.
    fn refill(&mut self) -> bool {
        match decode_unit(&mut self.reader, &self.engine, &mut self.context) {
            Ok(output) => {
                if output.bits_per_sample != self.input_format.bits_per_sample {
                    warn!(
                        "Decoded bit depth changed from {} to {} bits",
                        self.input_format.bits_per_sample, output.bits_per_sample
                    );
                }

                if output.channels != self.decoded_channels {
                    warn!(
                        "Decoded channel count changed from {} to {}, writing {} channels",
                        self.decoded_channels, output.channels, self.channel_count
                    );
                }

                self.decoded_channels = output.channels;
                self.sample_count = available_samples(&self.context, &output, self.channel_count);
                self.sample_position = 0;
                self.input_format = AudioFormat::input(output.bits_per_sample, output.sample_count);
                self.channel_mask = output.channel_mask;
                self.profile = output.profile;

                trace!(
                    "Unit {}: {} samples",
                    self.reader.units_read(),
                    self.sample_count
                );
                true
            }
            Err(SessionError::Source(e)) if e.is_end_of_stream() => {
                debug!("End of stream after {} units", self.reader.units_read());
                false
            }
            Err(e) => {
                warn!("Stopping playback: {e}");
                false
            }
        }
    }

    /// Fills `buf` with interleaved samples in the output encoding.
    ///
    /// Only whole sample frames (one sample per channel) are written; the
    /// returned byte count falls short of `buf.len()` once the stream is
    /// exhausted or when `buf` cannot hold another whole frame.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let frame_bytes = self.output_format.bytes_per_sample * self.channel_count;
        let mut written = 0;

        while buf.len() - written >= frame_bytes {
            if self.sample_position >= self.sample_count && !self.refill() {
                break;
            }

            let available = self.sample_count - self.sample_position;
            let frames = available.min((buf.len() - written) / frame_bytes);
            let end = written + frames * frame_bytes;
            self.write_samples(&mut buf[written..end], frames);
            written = end;

            if self.sample_position >= self.sample_count {
                self.reset(false);
            }
        }

        written
    }

    /// Interleaves `frames` sample frames into `dst`. Output channels the
    /// current unit did not decode are written as zero samples.
    fn write_samples(&mut self, dst: &mut [u8], frames: usize) {
        let start = self.sample_position;
        let converter = self.converter;
        let stride = self.channel_count;

        for channel in 0..stride {
            let plane: &[i32] = if channel < self.decoded_channels {
                &self.context.plane(channel)[start..start + frames]
            } else {
                &[]
            };

            for frame in 0..frames {
                let sample = plane.get(frame).copied().unwrap_or(0);
                converter.write(dst, frame * stride + channel, sample);
            }
        }

        self.sample_position = start + frames;
    }

    /// Drops the decoded samples, optionally clearing the engine's
    /// inter-frame state as well.
    pub fn reset(&mut self, clear_context: bool) {
        self.sample_count = 0;
        self.sample_position = 0;

        if clear_context {
            self.context.clear();
        }
    }

    /// Approximate decoded length. Only byte lengths are available.
    pub fn length(&self, unit: PositionUnit) -> Result<u64, SessionError> {
        match unit {
            PositionUnit::Bytes => Ok(estimate_length_bytes(
                self.reader.info(),
                &self.input_format,
                &self.output_format,
                self.channel_count,
            )),
            other => Err(SessionError::NotAvailable(format!("length in {other}"))),
        }
    }

    pub fn can_seek(&self, _position: u64, unit: PositionUnit) -> bool {
        match unit {
            PositionUnit::Bytes => true,
            other => {
                warn!("Seeking in {other} is not supported");
                false
            }
        }
    }

    /// Seeks to a host byte position and realigns on the next unit.
    ///
    /// Returns the requested position, not the offset actually reached.
    pub fn seek(&mut self, position: u64, unit: PositionUnit) -> Result<u64, SessionError> {
        if unit != PositionUnit::Bytes {
            return Err(SessionError::NotAvailable(format!("seek in {unit}")));
        }

        // Hosts pass byte positions scaled by the channel count.
        let mut offset = position / self.channel_count as u64;
        // Some hosts report twice the real position; halve anything past the end.
        if offset > self.reader.length() {
            offset /= 2;
        }

        match self.reader.seek(offset) {
            Ok(()) => {
                self.reset(true);
                debug!("Seek to {position} landed near source offset {offset}");
                Ok(position)
            }
            Err(e) => {
                warn!("Seek to {position} failed: {e}");
                Err(SessionError::NotAvailable(format!(
                    "seek to byte {position}: {e}"
                )))
            }
        }
    }

    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            channels: self.channel_count,
            sample_rate: self.sample_rate,
            original_bits: self.input_format.bits_per_sample,
        }
    }

    /// Speaker mask of the last decoded unit.
    pub fn channel_mask(&self) -> u32 {
        self.channel_mask
    }

    /// Engine profile of the last decoded unit.
    pub fn profile(&self) -> u32 {
        self.profile
    }

    pub fn output(&self) -> OutputEncoding {
        self.converter.output()
    }

    pub fn reader(&self) -> &FrameReader<S> {
        &self.reader
    }

    pub fn context(&self) -> &E::Context {
        &self.context
    }
}
