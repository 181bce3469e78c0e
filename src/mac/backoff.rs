//! Collision window classification and truncated binary exponential backoff
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

use rand_core::RngCore;
use strum::{Display, IntoStaticStr};

use crate::Tick;
use crate::log::debug;

use super::config::Config;

/// Collision classification relative to the collision window
#[derive(Debug, Clone, Copy, PartialEq, Display, IntoStaticStr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Collision {
    /// Inside the collision window, retried after backoff
    Ordinary,
    /// At or after the end of the collision window, fatal for the frame
    Late,
}

/// Resolution of a collision for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verdict {
    /// Retry once `delay` ticks (`slots` backoff slots) have passed after the jam
    Retry{ slots: u32, delay: Tick },
    /// Collision limit reached, abandon the frame
    GiveUp,
    /// Late collision, abandon the frame
    Late,
}

/// Transmission attempt bookkeeping
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attempt {
    /// Zero based attempt index for the current frame
    pub number: u8,
    /// Tick at which the first preamble nibble was driven
    pub start: Tick,
}

/// Collision window and backoff controller
///
/// Owns the collision count and attempt timing for a frame's full retry sequence,
/// generic over the random source used to draw backoff slots.
#[derive(Debug)]
pub struct CollisionWindow<G> {
    slot: Tick,
    byte: Tick,
    backoff_slot: Tick,
    max_collisions: u8,
    backoff_limit: u8,

    collisions: u8,
    attempt: Option<Attempt>,

    rng: G,
}

impl <G> CollisionWindow<G>
where
    G: RngCore,
{
    pub fn new(config: &Config, rng: G) -> Self {
        Self {
            slot: config.slot_ticks(),
            byte: config.byte_ticks(),
            backoff_slot: config.backoff_slot_ticks(),
            max_collisions: config.max_collisions,
            backoff_limit: config.backoff_limit,

            collisions: 0,
            attempt: None,

            rng,
        }
    }

    /// Reset state for a new frame
    pub fn reset(&mut self) {
        self.collisions = 0;
        self.attempt = None;
    }

    /// Mark the start of an attempt at `now`
    pub fn begin(&mut self, now: Tick) -> Attempt {
        let a = Attempt {
            number: self.collisions,
            start: now,
        };
        self.attempt = Some(a);
        a
    }

    /// Current attempt, if one is in progress
    pub fn attempt(&self) -> Option<Attempt> {
        self.attempt
    }

    /// Ordinary collisions seen for the current frame
    pub fn collisions(&self) -> u8 {
        self.collisions
    }

    /// Ticks since the start of the current attempt
    pub fn elapsed(&self, now: Tick) -> Tick {
        match self.attempt {
            Some(a) => now.saturating_sub(a.start),
            None => 0,
        }
    }

    /// Whole byte times since the start of the current attempt
    pub fn elapsed_bytes(&self, now: Tick) -> Tick {
        self.elapsed(now) / self.byte
    }

    /// Classify a collision observed at `now`
    pub fn classify(&self, now: Tick) -> Collision {
        if self.elapsed(now) < self.slot {
            Collision::Ordinary
        } else {
            Collision::Late
        }
    }

    /// Handle a collision observed at `now`, ending the current attempt
    pub fn collide(&mut self, now: Tick) -> Verdict {
        let elapsed = self.elapsed(now);
        let kind = self.classify(now);
        self.attempt = None;

        if kind == Collision::Late {
            debug!("Late collision {} ticks into attempt", elapsed);
            return Verdict::Late;
        }

        self.collisions = self.collisions.saturating_add(1);

        if self.collisions >= self.max_collisions {
            debug!("Collision {} of {}, giving up", self.collisions, self.max_collisions);
            return Verdict::GiveUp;
        }

        let slots = self.backoff_slots();
        let delay = slots as Tick * self.backoff_slot;

        debug!("Collision {} at {} ticks into attempt, backoff {} slots ({} ticks)",
            self.collisions, elapsed, slots, delay);

        Verdict::Retry{ slots, delay }
    }

    /// Draw a backoff slot count for the current collision count,
    /// uniform over [0, 2^min(n, limit) - 1]
    pub fn backoff_slots(&mut self) -> u32 {
        let exponent = self.collisions.min(self.backoff_limit) as u32;
        let range = 1u64 << exponent;
        (self.rng.next_u32() as u64 % range) as u32
    }
}

#[cfg(test)]
mod test {
    use crate::lfsr::Lfsr;
    use crate::mock::{MaxRng, ZeroRng};

    use super::*;

    #[test]
    fn window_boundary() {
        let c = Config::default();
        let mut w = CollisionWindow::new(&c, ZeroRng);

        w.begin(1000);
        assert_eq!(w.classify(1000), Collision::Ordinary);
        assert_eq!(w.classify(1000 + c.slot_ticks() - 1), Collision::Ordinary);
        assert_eq!(w.classify(1000 + c.slot_ticks()), Collision::Late);
        assert_eq!(w.elapsed_bytes(1000 + c.slot_ticks() - 1), 63);

        assert_eq!(w.collide(1000 + c.slot_ticks() - 1), Verdict::Retry{ slots: 0, delay: 0 });
        assert_eq!(w.collisions(), 1);

        let a = w.begin(5000);
        assert_eq!(a, Attempt{ number: 1, start: 5000 });
        assert_eq!(w.collide(5000 + c.slot_ticks()), Verdict::Late);
        assert_eq!(w.collisions(), 1);
        assert_eq!(w.attempt(), None);
    }

    #[test]
    fn backoff_truncated() {
        let c = Config::default();
        let mut w = CollisionWindow::new(&c, MaxRng);

        for n in 1..c.max_collisions {
            w.begin(0);
            let v = w.collide(0);

            let max = (1u32 << (n as u32).min(c.backoff_limit as u32)) - 1;
            assert_eq!(v, Verdict::Retry{ slots: max, delay: max as Tick * c.backoff_slot_ticks() });
        }
    }

    #[test]
    fn give_up_on_limit() {
        let c = Config::default();
        let mut w = CollisionWindow::new(&c, ZeroRng);

        for _ in 1..c.max_collisions {
            w.begin(0);
            assert!(matches!(w.collide(10), Verdict::Retry{ .. }));
        }

        w.begin(0);
        assert_eq!(w.collide(10), Verdict::GiveUp);
        assert_eq!(w.collisions(), c.max_collisions);

        w.reset();
        assert_eq!(w.collisions(), 0);
    }

    #[test]
    fn backoff_within_range() {
        let c = Config::default();
        let mut w = CollisionWindow::new(&c, Lfsr::new(0x1234_5678));

        for _ in 1..c.max_collisions {
            w.begin(0);
            let n = w.collisions() + 1;
            let limit = 1u32 << (n.min(c.backoff_limit) as u32);

            match w.collide(0) {
                Verdict::Retry{ slots, .. } => assert!(slots < limit),
                v => panic!("unexpected verdict: {:?}", v),
            }
        }
    }
}
