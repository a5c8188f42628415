//! Utility functions and supporting infrastructure.
//!
//! Provides bitstream I/O and error handling.

pub mod bitstream_io;
pub mod errors;
