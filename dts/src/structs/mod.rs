//! Data structures representing format components.
//!
//! Contains sync word classification, frame headers, the unit reassembly
//! buffer and the stream-level facts derived while reading.

pub mod format;
pub mod frame;
pub mod header;
pub mod stream_info;
pub mod sync;
