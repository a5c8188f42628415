/// Facts about the whole source, established from its first unit.
///
/// `frame_count` is an estimate: it divides the byte length by the first
/// unit's size rounded up to a power of two. An exact count would require a
/// full forward scan. Mutated only through [`crate::process::estimate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub(crate) initialized: bool,
    pub(crate) frame_count: u64,
    pub(crate) length: u64,
    pub(crate) start: Option<u64>,
    pub(crate) end: u64,
    pub(crate) has_extensions: bool,
}

impl StreamInfo {
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Approximate number of units in the source.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Total byte length of the source.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Offset of the first frame header.
    pub fn start(&self) -> u64 {
        self.start.unwrap_or(0)
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn has_extensions(&self) -> bool {
        self.has_extensions
    }
}
