use core::fmt;

/// Failures while walking an FMR word sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The cursor ran past the end of the word sequence (truncated frame).
    InsufficientData { index: usize, len: usize },
    /// The fixed mixed-mode GCD word is missing. Never escapes `compute_rates`.
    MixedModeUnavailable { offset: usize, len: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InsufficientData { index, len } => write!(
                f,
                "insufficient FMR data at index {} ({} words available)",
                index, len
            ),
            DecodeError::MixedModeUnavailable { offset, len } => write!(
                f,
                "insufficient FMR data for GCD at offset {} ({} words available)",
                offset, len
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}
