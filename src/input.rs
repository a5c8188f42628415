use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::Path;

use anyhow::Result;
use dts::source::IoSource;

/// Readers the frame reader can seek in.
pub trait SeekableRead: Read + Seek {}

impl<T: Read + Seek> SeekableRead for T {}

pub type InputSource = IoSource<Box<dyn SeekableRead>>;

/// Unified input that handles both file and pipe input with buffered reading.
///
/// Frame resynchronization needs random access, so pipe input is buffered in
/// memory before reading starts.
pub struct InputReader {
    reader: Box<dyn SeekableRead>,
    is_pipe: bool,
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path_str = input_path.as_ref().to_string_lossy();
        let is_pipe = path_str == "-";

        let reader: Box<dyn SeekableRead> = if is_pipe {
            let mut data = Vec::new();
            io::stdin().lock().read_to_end(&mut data)?;
            log::debug!("Buffered {} bytes from stdin", data.len());
            Box::new(Cursor::new(data))
        } else {
            let file = File::open(input_path)?;
            Box::new(BufReader::new(file))
        };

        Ok(Self { reader, is_pipe })
    }

    /// Check if this is pipe input
    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    pub fn into_source(self) -> Result<InputSource> {
        Ok(IoSource::new(self.reader)?)
    }
}
