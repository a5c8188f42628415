//! Sync words marking the start of DTS frames.
//!
//! ## Core Sync Words
//!
//! The core frame marker exists in four byte-order/word-width variants:
//! 16-bit big endian (0x7FFE8001), 16-bit little endian (0xFE7F0180) and
//! 14-bit packed in either byte order (0x1FFFE800, 0xFF1F00E8).
//!
//! ## Extension Sync Words
//!
//! Secondary sub-streams that may follow a core frame: XCH, XXCH, X96 and
//! the extension substream (EXSS) in both byte orders.

use std::fmt::Display;

pub const SYNC_WORD_CORE: u32 = 0x7FFE_8001;
pub const SYNC_WORD_CORE_LE: u32 = 0xFE7F_0180;
pub const SYNC_WORD_CORE_LE14: u32 = 0xFF1F_00E8;
pub const SYNC_WORD_CORE_BE14: u32 = 0x1FFF_E800;

pub const SYNC_WORD_XCH: u32 = 0x5A5A_5A5A;
pub const SYNC_WORD_XXCH: u32 = 0x4700_4A03;
pub const SYNC_WORD_X96: u32 = 0x1D95_F262;
pub const SYNC_WORD_EXSS: u32 = 0x6458_2025;
pub const SYNC_WORD_EXSS_LE: u32 = 0x5864_2520;

/// Byte width of every sync word.
pub const SYNC_WORD_SIZE: usize = 4;

/// Recognized frame marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncWord {
    Core(Bitstream),
    Xch,
    Xxch,
    X96,
    Exss(Bitstream),
}

/// Physical packing of the bytes that follow a sync word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitstream {
    Be16,
    Le16,
    Be14,
    Le14,
}

impl SyncWord {
    pub fn classify(value: u32) -> Option<Self> {
        let sync = match value {
            SYNC_WORD_CORE => SyncWord::Core(Bitstream::Be16),
            SYNC_WORD_CORE_LE => SyncWord::Core(Bitstream::Le16),
            SYNC_WORD_CORE_BE14 => SyncWord::Core(Bitstream::Be14),
            SYNC_WORD_CORE_LE14 => SyncWord::Core(Bitstream::Le14),
            SYNC_WORD_XCH => SyncWord::Xch,
            SYNC_WORD_XXCH => SyncWord::Xxch,
            SYNC_WORD_X96 => SyncWord::X96,
            SYNC_WORD_EXSS => SyncWord::Exss(Bitstream::Be16),
            SYNC_WORD_EXSS_LE => SyncWord::Exss(Bitstream::Le16),
            _ => return None,
        };

        Some(sync)
    }

    pub fn is_core(&self) -> bool {
        matches!(self, SyncWord::Core(_))
    }

    pub fn is_extension(&self) -> bool {
        !self.is_core()
    }

    /// Packing of the frame, `None` for markers that only occur embedded in
    /// a normalized core frame.
    pub fn bitstream(&self) -> Option<Bitstream> {
        match self {
            SyncWord::Core(bs) | SyncWord::Exss(bs) => Some(*bs),
            _ => None,
        }
    }
}

pub fn is_sync_word(value: u32) -> bool {
    SyncWord::classify(value).is_some()
}

pub fn is_core_sync_word(value: u32) -> bool {
    SyncWord::classify(value).is_some_and(|s| s.is_core())
}

pub fn is_extension_sync_word(value: u32) -> bool {
    SyncWord::classify(value).is_some_and(|s| s.is_extension())
}

impl Display for SyncWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncWord::Core(bs) => write!(f, "Core ({bs})"),
            SyncWord::Xch => write!(f, "XCH"),
            SyncWord::Xxch => write!(f, "XXCH"),
            SyncWord::X96 => write!(f, "X96"),
            SyncWord::Exss(bs) => write!(f, "Extension substream ({bs})"),
        }
    }
}

impl Display for Bitstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bitstream::Be16 => write!(f, "16-bit big endian"),
            Bitstream::Le16 => write!(f, "16-bit little endian"),
            Bitstream::Be14 => write!(f, "14-bit big endian"),
            Bitstream::Le14 => write!(f, "14-bit little endian"),
        }
    }
}

#[test]
fn classify_sync_words() {
    for core in [
        SYNC_WORD_CORE,
        SYNC_WORD_CORE_LE,
        SYNC_WORD_CORE_LE14,
        SYNC_WORD_CORE_BE14,
    ] {
        assert!(is_core_sync_word(core));
        assert!(!is_extension_sync_word(core));
    }

    for ext in [
        SYNC_WORD_XCH,
        SYNC_WORD_XXCH,
        SYNC_WORD_X96,
        SYNC_WORD_EXSS,
        SYNC_WORD_EXSS_LE,
    ] {
        assert!(is_extension_sync_word(ext));
        assert!(!is_core_sync_word(ext));
    }

    assert!(!is_sync_word(0));
    assert!(!is_sync_word(0x7FFE_8000));
    assert_eq!(SyncWord::Xch.bitstream(), None);
}
