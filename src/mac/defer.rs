//! Carrier deferral and inter-packet gap timing
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

use crate::Tick;
use crate::log::trace;

use super::config::Config;

/// Deferral timer states
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeferState {
    /// Medium has been quiet for at least the inter-packet gap
    Idle,
    /// First two thirds of the gap, carrier restarts the gap
    DeferEarly{ since: Tick },
    /// Final third of the gap, carrier is ignored
    DeferLate{ since: Tick },
    /// Gap complete, transmission may start this tick
    ReadyToSend,
}

/// Deferral timer, gates the start of every transmission attempt.
///
/// `since` is the first quiet tick of the current gap. Carrier (including our
/// own transmission) seen before `since + early` restarts the gap, after that
/// the gap runs to completion regardless of carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct Deferral {
    early: Tick,
    gap: Tick,
    state: DeferState,
}

impl Deferral {
    /// Create a deferral timer, deferring for a full gap from `now`
    pub fn new(config: &Config, now: Tick) -> Self {
        Self {
            early: config.early_ticks(),
            gap: config.gap_ticks(),
            state: DeferState::DeferEarly{ since: now },
        }
    }

    pub fn state(&self) -> DeferState {
        self.state
    }

    /// Advance the timer by one tick with the sampled carrier state,
    /// returning whether a transmission may start on this tick
    pub fn tick(&mut self, now: Tick, carrier: bool) -> bool {
        // Ready is only held for a single tick
        if self.state == DeferState::ReadyToSend {
            self.state = DeferState::Idle;
        }

        if let DeferState::Idle = self.state {
            if !carrier {
                return true;
            }

            trace!("Carrier at {}, deferring", now);
            self.state = DeferState::DeferEarly{ since: now + 1 };
            return false;
        }

        if let DeferState::DeferEarly{ since } = self.state {
            if now >= since + self.early {
                trace!("Entering late deferral at {}", now);
                self.state = DeferState::DeferLate{ since };

            } else if carrier {
                self.state = DeferState::DeferEarly{ since: now + 1 };
                return false;

            } else {
                return false;
            }
        }

        if let DeferState::DeferLate{ since } = self.state {
            if now >= since + self.gap {
                trace!("Gap complete at {}", now);
                self.state = DeferState::ReadyToSend;
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Run the timer from `start` with carrier supplied by `carrier(now)`,
    /// returning the first tick at which transmission is permitted
    fn first_ready<F: Fn(Tick) -> bool>(d: &mut Deferral, start: Tick, carrier: F) -> Tick {
        for now in start..start + 10_000 {
            if d.tick(now, carrier(now)) {
                return now;
            }
        }
        panic!("timer never expired");
    }

    #[test]
    fn defer_from_reset() {
        let c = Config::default();
        let mut d = Deferral::new(&c, 0);

        assert_eq!(first_ready(&mut d, 0, |_| false), c.gap_ticks());
        assert_eq!(d.state(), DeferState::ReadyToSend);

        // Stays ready while the medium is idle
        assert_eq!(d.tick(c.gap_ticks() + 1, false), true);
        assert_eq!(d.state(), DeferState::Idle);
    }

    #[test]
    fn gap_after_carrier() {
        let c = Config::default();
        let mut d = Deferral::new(&c, 0);

        // Busy until tick 99, quiet from 100
        let t = first_ready(&mut d, 0, |now| now < 100);
        assert_eq!(t, 100 + c.gap_ticks());
    }

    #[test]
    fn early_carrier_restarts_gap() {
        let c = Config::default();
        let mut d = Deferral::new(&c, 0);

        // Quiet for the early phase less one tick, then a single busy tick
        let blip = c.early_ticks() - 1;
        let t = first_ready(&mut d, 0, |now| now == blip);
        assert_eq!(t, blip + 1 + c.gap_ticks());
    }

    #[test]
    fn late_carrier_ignored() {
        let c = Config::default();
        let mut d = Deferral::new(&c, 0);

        // Medium busy from the start of the late phase onwards
        let late = c.early_ticks();
        let t = first_ready(&mut d, 0, |now| now >= late);
        assert_eq!(t, c.gap_ticks());
    }

    #[test]
    fn idle_carrier_defers() {
        let c = Config::default();
        let mut d = Deferral::new(&c, 0);
        first_ready(&mut d, 0, |_| false);

        assert_eq!(d.tick(200, true), false);
        assert_eq!(d.state(), DeferState::DeferEarly{ since: 201 });

        let t = first_ready(&mut d, 201, |_| false);
        assert_eq!(t, 201 + c.gap_ticks());
    }
}
