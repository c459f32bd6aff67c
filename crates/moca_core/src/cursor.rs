//! Word cursor over an FMR payload.
//!
//! Entries are packed back to back: 48 bits each in the 2.x layout, 16 bits
//! each in the 1.x layout. The cursor is a plain value; `decode` and `skip`
//! return the advanced cursor instead of mutating shared state, and both flip
//! the alignment phase on every call.

use crate::error::DecodeError;
use crate::version::MocaVersion;
use crate::{FMR_PAYLOAD_START, MIXED_MODE_GCD_OFFSET};

/// Bit alignment of the next entry within the current word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Entry starts at bit 31 of the current word.
    Aligned,
    /// Entry starts at bit 15 of the current word.
    Unaligned,
}

impl Phase {
    pub fn toggled(self) -> Self {
        match self {
            Phase::Aligned => Phase::Unaligned,
            Phase::Unaligned => Phase::Aligned,
        }
    }
}

/// Raw fields of one destination entry.
///
/// The VLPER fields only exist in the 2.x layout and read as zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FmrEntry {
    pub gap_nper: u32,
    pub gap_vlper: u32,
    pub symbols_nper: u32,
    pub symbols_vlper: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    pub index: usize,
    pub phase: Phase,
}

impl Default for FrameCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCursor {
    /// Cursor positioned at the first destination entry.
    pub fn new() -> Self {
        Self {
            index: FMR_PAYLOAD_START,
            phase: Phase::Aligned,
        }
    }

    pub fn at(index: usize, phase: Phase) -> Self {
        Self { index, phase }
    }

    /// Read one destination entry laid out for `version`.
    pub fn decode(self, words: &[u32], version: MocaVersion) -> Result<(Self, FmrEntry), DecodeError> {
        if version.has_wide_entries() {
            self.decode_wide(words)
        } else {
            self.decode_narrow(words)
        }
    }

    /// 48-bit entry: two 8-bit gaps and two 16-bit symbol counts.
    fn decode_wide(self, words: &[u32]) -> Result<(Self, FmrEntry), DecodeError> {
        let i = self.index;
        if i + 1 >= words.len() {
            return Err(DecodeError::InsufficientData {
                index: i,
                len: words.len(),
            });
        }
        let (w0, w1) = (words[i], words[i + 1]);

        let (entry, advance) = match self.phase {
            Phase::Aligned => (
                FmrEntry {
                    gap_nper: (w0 >> 24) & 0xFF,
                    gap_vlper: (w0 >> 16) & 0xFF,
                    symbols_nper: w0 & 0xFFFF,
                    symbols_vlper: (w1 >> 16) & 0xFFFF,
                },
                1,
            ),
            Phase::Unaligned => (
                FmrEntry {
                    gap_nper: (w0 >> 8) & 0xFF,
                    gap_vlper: w0 & 0xFF,
                    symbols_nper: (w1 >> 16) & 0xFFFF,
                    symbols_vlper: w1 & 0xFFFF,
                },
                2,
            ),
        };

        Ok((Self::at(i + advance, self.phase.toggled()), entry))
    }

    /// 16-bit entry: 5-bit gap and 11-bit symbol count, NPER only.
    fn decode_narrow(self, words: &[u32]) -> Result<(Self, FmrEntry), DecodeError> {
        let i = self.index;
        let Some(&w) = words.get(i) else {
            return Err(DecodeError::InsufficientData {
                index: i,
                len: words.len(),
            });
        };

        let (entry, advance) = match self.phase {
            Phase::Aligned => (
                FmrEntry {
                    gap_nper: (w & 0xF800_0000) >> 27,
                    symbols_nper: (w & 0x07FF_0000) >> 16,
                    ..FmrEntry::default()
                },
                0,
            ),
            Phase::Unaligned => (
                FmrEntry {
                    gap_nper: (w & 0x0000_F800) >> 11,
                    symbols_nper: w & 0x0000_07FF,
                    ..FmrEntry::default()
                },
                1,
            ),
        };

        Ok((Self::at(i + advance, self.phase.toggled()), entry))
    }

    /// Step over the entry of an absent destination.
    ///
    /// Width follows the entry node's own version class, not a per-pair
    /// version: 2.x entries are 48 bits, anything else 16 bits. This has to
    /// match the producer exactly or every later destination is misread.
    pub fn skip(self, entry_version: MocaVersion) -> Self {
        let advance = match (entry_version.is_moca2(), self.phase) {
            (true, Phase::Aligned) => 1,
            (true, Phase::Unaligned) => 2,
            (false, Phase::Aligned) => 0,
            (false, Phase::Unaligned) => 1,
        };
        Self::at(self.index + advance, self.phase.toggled())
    }
}

/// Read the (gap, symbol count) pair at the fixed mixed-mode GCD word.
pub fn mixed_mode_gcd_fields(words: &[u32]) -> Result<(u32, u32), DecodeError> {
    let w = words
        .get(MIXED_MODE_GCD_OFFSET)
        .copied()
        .ok_or(DecodeError::MixedModeUnavailable {
            offset: MIXED_MODE_GCD_OFFSET,
            len: words.len(),
        })?;
    Ok(((w >> 24) & 0xFF, (w >> 8) & 0xFFFF))
}
