use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar};

use super::command::{Cli, ExtractArgs};
use super::progress::{create_progress_bar, update_progress};
use crate::input::InputReader;
use dts::engine::HeaderCodec;
use dts::process::reader::FrameReader;
use dts::utils::errors::ReadError;

#[derive(Debug, Default)]
struct ExtractStats {
    units: u64,
    core_bytes: u64,
    extension_bytes: u64,
    skipped_units: u64,
}

/// Writes every unit's frames, normalized to 16-bit big-endian words,
/// back to back without the alignment padding used in memory.
pub fn cmd_extract(args: &ExtractArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Extracting DTS stream: {} -> {} (strict mode: {}, core only: {})",
        args.input.display(),
        args.output.display(),
        cli.strict,
        args.core_only
    );

    let input_reader = InputReader::new(&args.input)?;
    if input_reader.is_pipe() {
        log::debug!("Reading from stdin");
    }

    let mut reader = FrameReader::new(input_reader.into_source()?)?;
    reader.set_fail_level(cli.fail_level());

    let mut writer = BufWriter::new(File::create(&args.output)?);

    let pb: Option<ProgressBar> = multi
        .map(|multi| create_progress_bar(multi, Some(reader.length())))
        .transpose()?;

    let mut stats = ExtractStats::default();
    let start = std::time::Instant::now();

    loop {
        match reader.read_unit(&HeaderCodec) {
            Ok(()) => {}
            Err(e) if e.is_end_of_stream() => break,
            Err(e @ ReadError::Io(_)) => return Err(e.into()),
            Err(e) if cli.strict => return Err(e.into()),
            Err(e) => {
                stats.skipped_units += 1;
                log::warn!("Skipping unit after {} units: {e}", stats.units);
                continue;
            }
        }

        if let Some(core) = reader.core() {
            writer.write_all(core)?;
            stats.core_bytes += core.len() as u64;
        }

        if !args.core_only {
            if let Some(extension) = reader.extension() {
                writer.write_all(extension)?;
                stats.extension_bytes += extension.len() as u64;
            }
        }

        stats.units += 1;
        update_progress(pb.as_ref(), stats.units, reader.position()?, 100);
    }

    writer.flush()?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if stats.units == 0 {
        anyhow::bail!("No DTS frames found in {}", args.input.display());
    }

    log::info!(
        "Wrote {} units in {:.3}s: {} core bytes, {} extension bytes{}",
        stats.units,
        start.elapsed().as_secs_f64(),
        stats.core_bytes,
        stats.extension_bytes,
        if stats.skipped_units > 0 {
            format!(", {} units skipped", stats.skipped_units)
        } else {
            String::new()
        }
    );

    Ok(())
}
