/// Unit assembly from a byte source.
///
/// Provides the [`FrameReader`](reader::FrameReader), which scans for sync
/// words and pairs core frames with the extension frames that follow them.
pub mod reader;

/// Streaming decode session.
///
/// Provides the [`Session`](session::Session), which drives an
/// [`Engine`](crate::engine::Engine) unit by unit and hands out interleaved
/// samples in the requested output encoding.
pub mod session;

/// Sample conversion to the output encoding.
pub mod convert;

/// Frame count and length estimates.
pub mod estimate;

#[cfg(test)]
pub(crate) mod testing;
