
use crate::{Tick, error::ConfigError};

/// Configuration for the CSMA/CD MAC
///
/// All timing is expressed in byte times except where noted, and converted to
/// engine ticks via `byte_ticks`. Defaults are the IEEE 802.3 values.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Engine ticks per byte time, must be even as bytes are driven as two nibbles
    ///
    /// The default of 8 gives one tick per bit time
    pub byte_ticks: u32,

    /// Preamble length including the start of frame delimiter
    pub preamble_bytes: u32,

    /// Collision window (slot time), measured from the first preamble nibble
    pub slot_bytes: u32,

    /// Minimum inter-packet gap
    pub ipg_bytes: u32,

    /// Ticks shaved from the gap to account for input sampling latency
    pub pipeline_slack: u32,

    /// Length of the jam sequence driven after a collision
    pub jam_bytes: u32,

    /// Minimum frame length before the FCS, shorter frames are zero padded
    pub min_frame_bytes: u32,

    /// Length of a single backoff slot
    ///
    /// This is normally the slot time, smaller values shorten backoff for simulation
    pub backoff_slot_bytes: u32,

    /// Number of ordinary collisions after which a frame is abandoned
    pub max_collisions: u8,

    /// Maximum backoff exponent, backoff is drawn from [0, 2^min(n, limit))
    pub backoff_limit: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            byte_ticks: 8,
            preamble_bytes: 8,
            slot_bytes: 64,
            ipg_bytes: 12,
            pipeline_slack: 4,
            jam_bytes: 4,
            min_frame_bytes: 60,
            backoff_slot_bytes: 64,
            max_collisions: 16,
            backoff_limit: 10,
        }
    }
}

impl Config {
    /// Default configuration with single byte backoff slots,
    /// keeping worst case backoff tractable in simulation
    pub fn short_backoff() -> Self {
        Self {
            backoff_slot_bytes: 1,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.byte_ticks == 0 {
            return Err(ConfigError::ZeroByteTime);
        }
        if self.byte_ticks % 2 != 0 {
            return Err(ConfigError::OddByteTime);
        }
        if self.preamble_bytes == 0 {
            return Err(ConfigError::NoPreamble);
        }
        if self.slot_bytes == 0 {
            return Err(ConfigError::ZeroSlot);
        }
        if self.ipg_ticks() <= self.pipeline_slack as Tick {
            return Err(ConfigError::GapTooShort);
        }
        if self.early_ticks() >= self.gap_ticks() {
            return Err(ConfigError::EarlyPhaseTooLong);
        }
        if self.max_collisions == 0 {
            return Err(ConfigError::ZeroCollisions);
        }
        if self.backoff_limit > 31 {
            return Err(ConfigError::BackoffLimit);
        }
        if self.backoff_slot_bytes == 0 {
            return Err(ConfigError::ZeroBackoffSlot);
        }
        Ok(())
    }

    /// Ticks per nibble (clock enable period)
    pub fn nibble_ticks(&self) -> Tick {
        (self.byte_ticks / 2) as Tick
    }

    pub fn byte_ticks(&self) -> Tick {
        self.byte_ticks as Tick
    }

    /// Collision window in ticks
    pub fn slot_ticks(&self) -> Tick {
        self.slot_bytes as Tick * self.byte_ticks()
    }

    /// Nominal inter-packet gap in ticks
    pub fn ipg_ticks(&self) -> Tick {
        self.ipg_bytes as Tick * self.byte_ticks()
    }

    /// End of the early deferral phase (first two thirds of the IPG)
    pub fn early_ticks(&self) -> Tick {
        self.ipg_ticks() * 2 / 3
    }

    /// Idle ticks between the end of one transmission and the start of the next
    pub fn gap_ticks(&self) -> Tick {
        self.ipg_ticks() - self.pipeline_slack as Tick
    }

    /// Number of nibbles in the jam sequence
    pub fn jam_nibbles(&self) -> u32 {
        self.jam_bytes * 2
    }

    pub fn preamble_nibbles(&self) -> u32 {
        self.preamble_bytes * 2
    }

    pub fn backoff_slot_ticks(&self) -> Tick {
        self.backoff_slot_bytes as Tick * self.byte_ticks()
    }
}
