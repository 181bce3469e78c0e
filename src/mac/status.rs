
use strum::{Display, IntoStaticStr};

use crate::error::CoreError;

bitflags::bitflags!{
    /// Transmit status indicators, pulsed for a single tick when a frame completes
    pub struct StatusFlags: u8 {
        /// Frame transmitted without collision
        const OK             = 0b0000_0001;
        /// Frame abandoned after too many collisions
        const GAVE_UP        = 0b0000_0010;
        /// Frame abandoned due to a collision outside the collision window
        const LATE_COLLISION = 0b0000_0100;
        /// Frame abandoned as the source could not keep up with the line rate
        const UNDERFLOW      = 0b0000_1000;
    }
}

/// Terminal outcome of a frame's transmission, including all retries
#[derive(Debug, Clone, Copy, PartialEq, Display, IntoStaticStr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    Ok,
    GaveUp,
    LateCollision,
    Underflow,
}

impl Outcome {
    pub fn flag(&self) -> StatusFlags {
        match self {
            Outcome::Ok => StatusFlags::OK,
            Outcome::GaveUp => StatusFlags::GAVE_UP,
            Outcome::LateCollision => StatusFlags::LATE_COLLISION,
            Outcome::Underflow => StatusFlags::UNDERFLOW,
        }
    }

    /// Decode a set of indicators holding exactly one flag
    pub fn from_flags(flags: StatusFlags) -> Option<Outcome> {
        if flags == StatusFlags::OK {
            Some(Outcome::Ok)
        } else if flags == StatusFlags::GAVE_UP {
            Some(Outcome::GaveUp)
        } else if flags == StatusFlags::LATE_COLLISION {
            Some(Outcome::LateCollision)
        } else if flags == StatusFlags::UNDERFLOW {
            Some(Outcome::Underflow)
        } else {
            None
        }
    }
}

impl From<Outcome> for StatusFlags {
    fn from(o: Outcome) -> Self {
        o.flag()
    }
}

/// Status latch, collects indicator pulses for a single frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reporter {
    seen: StatusFlags,
    pulses: u32,
}

impl Default for StatusFlags {
    fn default() -> Self {
        StatusFlags::empty()
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the indicators sampled on a tick
    pub fn observe(&mut self, flags: StatusFlags) {
        self.pulses += flags.bits().count_ones();
        self.seen |= flags;
    }

    /// Number of indicator assertions observed
    pub fn pulses(&self) -> u32 {
        self.pulses
    }

    /// Fetch the frame outcome, `None` until an indicator has been observed.
    ///
    /// Returns an error if more than one indicator has been seen.
    pub fn outcome(&self) -> Result<Option<Outcome>, CoreError> {
        match self.pulses {
            0 => Ok(None),
            1 => Ok(Outcome::from_flags(self.seen)),
            _ => Err(CoreError::ConflictingStatus(self.seen)),
        }
    }

    /// Clear the latch ahead of the next frame
    pub fn clear(&mut self) {
        self.seen = StatusFlags::empty();
        self.pulses = 0;
    }
}

#[cfg(test)]
mod test {
    use std::string::ToString;

    use super::*;

    #[test]
    fn flags_map_to_outcomes() {
        let all = [Outcome::Ok, Outcome::GaveUp, Outcome::LateCollision, Outcome::Underflow];

        for o in all.iter() {
            assert_eq!(Outcome::from_flags(o.flag()), Some(*o));
            assert_eq!(StatusFlags::from(*o).bits().count_ones(), 1);
        }

        assert_eq!(Outcome::from_flags(StatusFlags::empty()), None);
        assert_eq!(Outcome::from_flags(StatusFlags::OK | StatusFlags::UNDERFLOW), None);
        assert_eq!(Outcome::LateCollision.to_string(), "LateCollision");
    }

    #[test]
    fn reporter_latches_single_pulse() {
        let mut r = Reporter::new();
        assert_eq!(r.outcome(), Ok(None));

        r.observe(StatusFlags::empty());
        r.observe(StatusFlags::GAVE_UP);
        r.observe(StatusFlags::empty());

        assert_eq!(r.pulses(), 1);
        assert_eq!(r.outcome(), Ok(Some(Outcome::GaveUp)));

        r.clear();
        assert_eq!(r.outcome(), Ok(None));
    }

    #[test]
    fn reporter_rejects_multiple_pulses() {
        let mut r = Reporter::new();

        r.observe(StatusFlags::OK);
        r.observe(StatusFlags::OK);
        assert_eq!(r.outcome(), Err(CoreError::ConflictingStatus(StatusFlags::OK)));

        r.clear();
        r.observe(StatusFlags::OK | StatusFlags::UNDERFLOW);
        assert!(r.outcome().is_err());
    }
}
