//! Stream-level estimates derived from the first unit.
//!
//! DTS files carry no frame index, so the number of units is approximated
//! from the source length and the size of the first unit. Files often hold
//! some non-frame data after the first unit, which makes the estimate run
//! slightly high.

use log::debug;

use crate::structs::format::AudioFormat;
use crate::structs::stream_info::StreamInfo;

impl StreamInfo {
    pub(crate) fn with_length(length: u64) -> Self {
        Self {
            length,
            end: length,
            ..Default::default()
        }
    }

    /// Notes the offset of the first frame header. Later calls are ignored.
    pub(crate) fn record_start(&mut self, header_offset: u64) {
        if !self.initialized && self.start.is_none() {
            self.start = Some(header_offset);
        }
    }

    /// Finalizes the estimate after the first complete unit.
    pub(crate) fn complete_first_unit(&mut self, unit_size: usize) {
        if self.initialized {
            return;
        }

        self.frame_count = estimate_frame_count(self.length, self.start(), unit_size);
        self.initialized = true;

        debug!(
            "Estimated {} units from {} bytes (first unit {} bytes at offset {})",
            self.frame_count,
            self.length,
            unit_size,
            self.start()
        );
    }

    pub(crate) fn set_extensions(&mut self, has_extensions: bool) {
        self.has_extensions = has_extensions;
    }
}

/// `(length − start) / unit_size` with the unit size rounded up to a power of two.
pub fn estimate_frame_count(length: u64, start: u64, unit_size: usize) -> u64 {
    if unit_size == 0 {
        return 0;
    }

    length.saturating_sub(start) / unit_size.next_power_of_two() as u64
}

/// Approximate decoded length in output bytes.
pub fn estimate_length_bytes(
    info: &StreamInfo,
    input: &AudioFormat,
    output: &AudioFormat,
    channels: usize,
) -> u64 {
    info.frame_count()
        * input.samples_per_frame as u64
        * output.bytes_per_sample as u64
        * channels as u64
}

#[test]
fn frame_count_uses_power_of_two_units() {
    assert_eq!(estimate_frame_count(1_000_000, 0, 1006), 976);
    assert_eq!(estimate_frame_count(1_000_000, 0, 1024), 976);
    assert_eq!(estimate_frame_count(1_000_000, 0, 1025), 488);
    assert_eq!(estimate_frame_count(4096, 96, 1000), 3);
    assert_eq!(estimate_frame_count(10, 20, 1000), 0);
    assert_eq!(estimate_frame_count(10, 0, 0), 0);
}

#[test]
fn first_unit_initializes_once() {
    let mut info = StreamInfo::with_length(8192);
    info.record_start(16);
    info.record_start(600);
    assert!(!info.initialized());

    info.complete_first_unit(1000);
    assert!(info.initialized());
    assert_eq!(info.start(), 16);
    assert_eq!(info.frame_count(), (8192 - 16) / 1024);

    info.complete_first_unit(10);
    info.record_start(0);
    assert_eq!(info.start(), 16);
    assert_eq!(info.frame_count(), 7);
}

#[test]
fn length_in_output_bytes() {
    let mut info = StreamInfo::with_length(1 << 20);
    info.record_start(0);
    info.complete_first_unit(1024);

    let input = AudioFormat::input(24, 512);
    let output = crate::structs::format::OutputEncoding::Float32.format();
    assert_eq!(
        estimate_length_bytes(&info, &input, &output, 6),
        1024 * 512 * 4 * 6
    );
}
