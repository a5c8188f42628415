//! Frame synchronizer and streaming decode session for DTS audio.
//!
//! ## Technical Overview
//!
//! A DTS elementary stream is a sequence of frames without any index. Each
//! frame starts with a 32-bit sync word identifying its type and packing:
//!
//! - **Core frames**: the primary audio payload, stored as 16-bit words in
//!   either byte order or packed into 14-bit words.
//! - **Extension frames**: an optional secondary sub-stream (typically the
//!   extension substream) stored directly after its core frame.
//!
//! A core frame and the extension frame following it form a **unit**, the
//! input of one decode step.
//!
//! ### Decoding
//!
//! Audio decoding itself is delegated to an external engine implementing
//! [`engine::Engine`]. This crate locates and assembles units, feeds them to
//! the engine, and converts the decoded integer samples to 16-bit integer or
//! 32-bit float output on demand.
//!
//! ## Quick Start
//!
//! 1. Wrap the input in a [`source::ByteSource`], e.g. [`source::IoSource`]
//! 2. Scan units with [`process::reader::FrameReader`], or
//! 3. Open a [`process::session::Session`] with an engine and pull samples
//!
//! ```rust,no_run
//! use dts::engine::HeaderCodec;
//! use dts::process::reader::FrameReader;
//! use dts::source::IoSource;
//! use dts::structs::header::FrameHeader;
//!
//! let file = std::io::BufReader::new(std::fs::File::open("stream.dts")?);
//! let mut reader = FrameReader::new(IoSource::new(file)?)?;
//!
//! reader.read_unit(&HeaderCodec)?;
//! let header: [u8; 16] = reader.unit()[..16].try_into()?;
//! if let FrameHeader::Core(core) = FrameHeader::parse(&header)? {
//!     println!("{} channels at {} Hz", core.channels(), core.sample_rate());
//! }
//! println!("~{} units", reader.info().frame_count());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Decoding engine contract.
pub mod engine;

/// Stream processing.
///
/// 1. **Frame Reading** ([`process::reader`]): Sync word scanning and unit
///    assembly.
///
/// 2. **Streaming Session** ([`process::session`]): Pull-based decoding into
///    interleaved output samples.
///
/// 3. **Conversion** ([`process::convert`]): Integer to output sample formats.
pub mod process;

/// Byte source abstraction.
pub mod source;

/// Data structures representing DTS format components.
///
/// - **Sync Words** ([`structs::sync`]): Frame markers and bitstream packing
/// - **Headers** ([`structs::header`]): Core and extension substream headers
/// - **Frames** ([`structs::frame`]): Unit reassembly buffer
/// - **Stream Info** ([`structs::stream_info`]): Whole-source facts
/// - **Formats** ([`structs::format`]): Sample format descriptors
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading/writing
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
