use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar};
use serde::Serialize;

use super::command::{Cli, InfoArgs, ReportFormat};
use super::progress::{create_progress_bar, update_progress};
use crate::input::{InputReader, InputSource};
use crate::timestamp::time_str;
use dts::engine::HeaderCodec;
use dts::process::reader::FrameReader;
use dts::structs::header::{CoreHeader, FRAME_HEADER_SIZE, FrameHeader, SubstreamHeader};
use dts::utils::errors::ReadError;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing DTS stream: {}", args.input.display());

    let report = analyze_stream(args, cli, multi)?;

    match args.format {
        ReportFormat::Yaml => print!("{}", serde_yaml_ng::to_string(&report)?),
        ReportFormat::Text if report.units == 0 => {
            println!("No DTS frames found in the file.");
            println!("This doesn't appear to be a valid DTS stream.");
        }
        ReportFormat::Text => display_report(&report),
    }

    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct StreamReport {
    input: String,
    size_bytes: u64,
    start_offset: u64,
    packing: Option<String>,
    core: Option<CoreReport>,
    extension: Option<ExtensionReport>,
    units: u64,
    units_with_extension: u64,
    estimated_units: u64,
    skipped_units: u64,
    duration_secs: Option<f64>,
    average_bit_rate_kbps: Option<f64>,
}

#[derive(Debug, Serialize)]
struct CoreReport {
    sample_rate: u32,
    channels: usize,
    lfe: bool,
    audio_mode: u8,
    samples_per_frame: usize,
    frame_size: usize,
    source_resolution: Option<u32>,
    bit_rate: Option<u32>,
    crc_present: bool,
    encoder_revision: u8,
}

impl From<&CoreHeader> for CoreReport {
    fn from(core: &CoreHeader) -> Self {
        Self {
            sample_rate: core.sample_rate(),
            channels: core.channels(),
            lfe: core.lfe != 0,
            audio_mode: core.audio_mode,
            samples_per_frame: core.samples_per_frame(),
            frame_size: core.frame_size,
            source_resolution: core.source_resolution(),
            bit_rate: core.bit_rate(),
            crc_present: core.crc_present,
            encoder_revision: core.encoder_revision,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExtensionReport {
    substream_index: u8,
    header_size: usize,
    frame_size: usize,
    wide_header: bool,
}

impl From<&SubstreamHeader> for ExtensionReport {
    fn from(exss: &SubstreamHeader) -> Self {
        Self {
            substream_index: exss.index,
            header_size: exss.header_size,
            frame_size: exss.frame_size,
            wide_header: exss.wide_header,
        }
    }
}

fn parse_frame(frame: &[u8]) -> Result<FrameHeader> {
    let header: &[u8; FRAME_HEADER_SIZE] = frame
        .get(..FRAME_HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| anyhow::anyhow!("Frame of {} bytes has no full header", frame.len()))?;

    Ok(FrameHeader::parse(header)?)
}

impl StreamReport {
    fn describe_first_unit(&mut self, reader: &FrameReader<InputSource>) -> Result<()> {
        self.start_offset = reader.info().start();
        self.packing = reader.unit_sync().map(|sync| sync.to_string());

        for frame in [reader.core(), reader.extension()].into_iter().flatten() {
            match parse_frame(frame)? {
                FrameHeader::Core(core) => self.core = Some(CoreReport::from(&core)),
                FrameHeader::Substream(exss) => {
                    self.extension = Some(ExtensionReport::from(&exss))
                }
            }
        }

        Ok(())
    }

    fn finish(&mut self, estimated_units: u64) {
        self.estimated_units = estimated_units;

        let Some(core) = &self.core else {
            return;
        };

        let total_samples = self.units * core.samples_per_frame as u64;
        let duration_secs = total_samples as f64 / core.sample_rate as f64;
        self.duration_secs = Some(duration_secs);

        if duration_secs > 0.0 {
            let payload = self.size_bytes.saturating_sub(self.start_offset);
            self.average_bit_rate_kbps = Some((payload as f64 * 8.0) / (duration_secs * 1000.0));
        }
    }
}

fn analyze_stream(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<StreamReport> {
    let input_reader = InputReader::new(&args.input)?;
    let mut reader = FrameReader::new(input_reader.into_source()?)?;
    reader.set_fail_level(cli.fail_level());

    let pb: Option<ProgressBar> = multi
        .map(|multi| create_progress_bar(multi, Some(reader.length())))
        .transpose()?;

    let mut report = StreamReport {
        input: args.input.display().to_string(),
        size_bytes: reader.length(),
        ..Default::default()
    };

    loop {
        match reader.read_unit(&HeaderCodec) {
            Ok(()) => {}
            Err(e) if e.is_end_of_stream() => break,
            Err(e @ ReadError::Io(_)) => return Err(e.into()),
            Err(e) if cli.strict => return Err(e.into()),
            Err(e) => {
                report.skipped_units += 1;
                log::warn!("Skipping unit after {} units: {e}", report.units);
                continue;
            }
        }

        if report.units == 0 {
            report.describe_first_unit(&reader)?;
            reader.set_has_extensions(reader.extension().is_some());
        }

        report.units += 1;
        if reader.extension().is_some() {
            report.units_with_extension += 1;
        }

        update_progress(pb.as_ref(), report.units, reader.position()?, 100);
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    report.finish(reader.info().frame_count());
    Ok(report)
}

fn display_report(report: &StreamReport) {
    println!();
    println!("DTS Stream Information");
    println!("======================");
    println!();

    if let Some(packing) = &report.packing {
        println!("Bitstream packing           {packing}");
    }
    println!("First frame offset          {}", report.start_offset);
    println!();

    if let Some(core) = &report.core {
        display_core(core);
    }
    if let Some(extension) = &report.extension {
        display_extension(extension);
    }

    println!("Analysis Summary");
    println!("  Units processed           {}", report.units);
    println!("  Units with extension      {}", report.units_with_extension);
    println!("  Estimated units           {}", report.estimated_units);
    if report.skipped_units > 0 {
        println!("  Skipped units             {}", report.skipped_units);
    }

    let size_mb = report.size_bytes as f64 / 1_000_000.0;
    println!(
        "  Size                      {size_mb:.2} MB ({} bytes)",
        report.size_bytes
    );

    if let Some(duration) = report.duration_secs {
        println!("  Duration                  {}", time_str(duration));
    }
    if let Some(rate) = report.average_bit_rate_kbps {
        println!("  Average data rate         {rate:.1} kbps");
    }
    println!();
}

fn display_core(core: &CoreReport) {
    println!("Core");
    println!("  Sampling rate             {} Hz", core.sample_rate);
    println!(
        "  Channels                  {}{}",
        core.channels,
        if core.lfe { " (including LFE)" } else { "" }
    );
    println!("  Audio mode                {}", core.audio_mode);
    println!("  Samples per frame         {}", core.samples_per_frame);
    println!("  Frame size                {} bytes", core.frame_size);

    match core.source_resolution {
        Some(bits) => println!("  Source resolution         {bits} bits"),
        None => println!("  Source resolution         reserved"),
    }
    match core.bit_rate {
        Some(rate) => println!("  Bit rate                  {} kbps", rate / 1000),
        None => println!("  Bit rate                  open/variable"),
    }
    println!("  CRC present               {}", core.crc_present);
    println!("  Encoder revision          {}", core.encoder_revision);
    println!();
}

fn display_extension(extension: &ExtensionReport) {
    println!("Extension Substream");
    println!("  Substream index           {}", extension.substream_index);
    println!("  Header size               {} bytes", extension.header_size);
    println!("  Frame size                {} bytes", extension.frame_size);
    println!("  Wide header               {}", extension.wide_header);
    println!();
}
