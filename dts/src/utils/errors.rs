#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err.into());
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Unrecognized sync word {0:#010X}")]
    NoSync(u32),

    #[error("Normal core frame must carry 32 samples, deficit field reads {0}")]
    InvalidDeficitSamples(u8),

    #[error("Core frame must contain at least 6 PCM blocks. Read {0}")]
    TooFewPcmBlocks(u8),

    #[error("Core frame size must be at least 96 bytes. Read {0}")]
    CoreFrameTooSmall(usize),

    #[error("Invalid core audio mode {0}")]
    InvalidAudioMode(u8),

    #[error("Invalid core sample rate code {0}")]
    InvalidSampleRate(u8),

    #[error("Invalid LFE flag {0}")]
    InvalidLfe(u8),

    #[error("Extension substream header size {0} is not a multiple of 4 or below 16")]
    InvalidSubstreamHeaderSize(usize),

    #[error("Extension substream frame size {size} is misaligned or smaller than its header {header}")]
    InvalidSubstreamFrameSize { size: usize, header: usize },

    #[error("Frame of {size} bytes is shorter than the {required} bytes required")]
    Truncated { size: usize, required: usize },

    #[error("Bitstream I/O error: {0}")]
    Bitstream(String),
}

impl From<std::io::Error> for HeaderError {
    fn from(e: std::io::Error) -> Self {
        HeaderError::Bitstream(e.to_string())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("Byte source exhausted")]
    EndOfStream,

    #[error("Malformed frame: {0}")]
    Header(#[from] HeaderError),

    #[error("Expected an extension sync word, found {found:#010X}")]
    NoExtensionSync { found: u32 },

    #[error("Skipped {skipped} bytes before sync word {sync_word:#010X}")]
    Desync { skipped: u64, sync_word: u32 },

    #[error("Failed to grow frame buffer to {0} bytes")]
    Allocation(usize),

    #[error("Byte source error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReadError {
    /// `true` when the source simply ran out of bytes.
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            ReadError::EndOfStream => true,
            ReadError::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Decoder context creation failed: {0}")]
    Context(String),

    #[error("Frame parse failed with code {0}")]
    Parse(i32),

    #[error("Frame filter failed with code {0}")]
    Filter(i32),

    #[error("Decoder exposes no core information")]
    MissingCoreInfo,

    #[error(transparent)]
    Header(#[from] HeaderError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("No conversion from {0}-bit input samples")]
    UnsupportedInputDepth(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("Failed to open stream: {0}")]
    Source(#[from] ReadError),

    #[error("Decoder failure: {0}")]
    Engine(#[from] EngineError),

    #[error("Stream does not start with a decodable frame")]
    NoInitialFrame,

    #[error("Feature not available: {0}")]
    NotAvailable(String),
}

impl From<ConvertError> for SessionError {
    fn from(e: ConvertError) -> Self {
        SessionError::NotAvailable(e.to_string())
    }
}
