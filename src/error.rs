
use strum::{Display, IntoStaticStr};

use crate::mac::status::StatusFlags;

/// Core MAC errors
///
/// Transmission results are reported as [`crate::mac::status::Outcome`]s,
/// these only cover misuse of the engine and harness failures.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Invalid timing configuration
    Config(ConfigError),

    /// No outcome was reported in the allowed number of ticks
    Timeout,

    /// More than one outcome indicator was observed for a single frame
    ConflictingStatus(StatusFlags),
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Display, IntoStaticStr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Byte time must be a non-zero number of ticks
    ZeroByteTime,
    /// Byte time must split evenly into two nibbles
    OddByteTime,
    /// Preamble must contain at least the SFD
    NoPreamble,
    /// Collision window must be non-zero
    ZeroSlot,
    /// Inter-packet gap must be longer than the pipeline slack
    GapTooShort,
    /// Early deferral phase must end before the gap does
    EarlyPhaseTooLong,
    /// At least one collision must be allowed per frame
    ZeroCollisions,
    /// Backoff exponent cap must fit a 32-bit slot count
    BackoffLimit,
    /// Backoff slot must be non-zero
    ZeroBackoffSlot,
}

/// Receive errors, reported by the modelled receiver when checking a frame
#[derive(Debug, Clone, Copy, PartialEq, Display, IntoStaticStr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxError {
    /// Odd number of nibbles received
    Alignment,
    /// No start of frame delimiter following the preamble
    NoSfd,
    /// Checksum residual mismatch (including corrupted units)
    FrameCheck,
    /// Frame shorter than the minimum length
    Padding,
}
