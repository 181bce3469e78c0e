//! Medium Access Control (MAC) layer module.
//!
//! Contains the CSMA/CD transmit engine and the state machines it is built from,
//! the deferral timer, collision window / backoff controller, transmit sequencer
//! and status reporting.
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

use rand_core::RngCore;

use crate::{Tick, timer::Timer, error::CoreError, frame::ByteSource};
use crate::log::{trace, debug, info, warn};

pub mod config;
pub use config::Config;

pub mod defer;
use defer::{Deferral, DeferState};

pub mod backoff;
use backoff::{Attempt, CollisionWindow, Verdict};

pub mod sequencer;
use sequencer::{Done, MiiTx, Sequencer, Stage, Step};

pub mod status;
use status::{Outcome, StatusFlags};

/// External inputs, sampled once per tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Inputs {
    /// Carrier sense from the PHY
    pub carrier: bool,
    /// Collision detect from the PHY
    pub collision: bool,
}

/// Engine outputs for a single tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outputs {
    /// MII transmit signals
    pub mii: MiiTx,
    /// Status indicators, at most one flag is set on one tick per frame
    pub status: StatusFlags,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacStats {
    /// Frames sent successfully
    pub sent: u32,
    /// Ordinary collisions (retried or otherwise)
    pub collisions: u32,
    pub late_collisions: u32,
    pub gave_up: u32,
    pub underflows: u32,
    /// Attempts held off by carrier from another station
    pub deferrals: u32,
}

impl MacStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// CSMA/CD MAC transmit engine
/// Generic over the upstream byte Source (S), backoff Generator (G) and Timer (T)
pub struct Mac<S, G, T> {
    config: Config,

    source: S,
    timer: T,

    deferral: Deferral,
    window: CollisionWindow<G>,
    sequencer: Sequencer,

    /// Collision resolution awaiting the end of the jam
    verdict: Option<Verdict>,
    /// Earliest retry time after backoff
    backoff_until: Option<Tick>,
    /// Next attempt was held off by carrier
    deferred: bool,

    stats: MacStats,
}

impl <S, G, T> Mac<S, G, T>
where
    S: ByteSource,
    G: RngCore,
    T: Timer,
{
    /// Create a new MAC, deferring for a full gap before the first transmission
    pub fn new(config: Config, source: S, rng: G, timer: T) -> Result<Self, CoreError> {
        config.validate()?;

        let now = timer.ticks();

        debug!("Setup MAC at {} ({} ticks per byte, gap {} ticks)", now, config.byte_ticks, config.gap_ticks());

        Ok(Self {
            deferral: Deferral::new(&config, now),
            window: CollisionWindow::new(&config, rng),
            sequencer: Sequencer::new(&config),

            config,
            source,
            timer,

            verdict: None,
            backoff_until: None,
            deferred: false,

            stats: MacStats::new(),
        })
    }

    /// Advance the engine by one tick.
    ///
    /// Inputs are sampled first, then every component computes its next state
    /// from that snapshot: the active attempt, the deferral timer (which sees our
    /// own transmission as carrier), and finally the start of a new attempt.
    pub fn tick(&mut self, inputs: Inputs) -> Outputs {
        let now = self.timer.ticks();
        let Inputs{ carrier, collision } = inputs;

        let mut status = StatusFlags::empty();

        // Drive the current attempt (if any)
        let mut step = self.drive(now, collision);
        if let Some(done) = step.done {
            if let Some(outcome) = self.complete(now, done) {
                status = outcome.flag();
            }
        }

        // Deferral is evaluated before any new attempt may start
        let ready = self.deferral.tick(now, carrier || step.mii.en);

        if !self.sequencer.active() && self.source.ready() {
            let backoff_done = match self.backoff_until {
                Some(t) => now >= t,
                None => true,
            };

            // Only count carrier that holds off an otherwise permitted attempt
            if backoff_done && !ready && carrier {
                self.deferred = true;
            }

            if ready && backoff_done {
                self.start(now);
                step = self.drive(now, collision);
            }
        }

        Outputs {
            mii: step.mii,
            status,
        }
    }

    /// Check whether a frame is in flight (transmitting, jamming or backing off)
    pub fn busy(&self) -> bool {
        self.sequencer.active() || self.backoff_until.is_some() || self.window.collisions() > 0
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch MAC statistics
    pub fn stats(&self) -> MacStats {
        self.stats.clone()
    }

    /// Ordinary collisions seen by the current frame
    pub fn collisions(&self) -> u8 {
        self.window.collisions()
    }

    /// Current attempt, if transmitting
    pub fn attempt(&self) -> Option<Attempt> {
        self.window.attempt()
    }

    pub fn deferral_state(&self) -> DeferState {
        self.deferral.state()
    }

    pub fn stage(&self) -> Stage {
        self.sequencer.stage()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn start(&mut self, now: Tick) {
        if self.window.collisions() == 0 {
            self.window.reset();
        }

        let a = self.window.begin(now);
        self.sequencer.start();
        self.backoff_until = None;

        if self.deferred {
            self.stats.deferrals = self.stats.deferrals.saturating_add(1);
            self.deferred = false;
        }

        debug!("Starting attempt {} at {}", a.number, now);
    }

    fn drive(&mut self, now: Tick, collision: bool) -> Step {
        let step = self.sequencer.step(now, collision, &mut self.source);

        if step.collided {
            self.verdict = Some(self.window.collide(now));
        }

        step
    }

    /// Handle the end of an attempt, returning the frame outcome if it is final
    fn complete(&mut self, now: Tick, done: Done) -> Option<Outcome> {
        let outcome = match done {
            Done::Sent => Outcome::Ok,
            Done::Underflow => Outcome::Underflow,
            Done::Jammed => match self.verdict.take() {
                Some(Verdict::Retry{ slots, delay }) => {
                    self.stats.collisions = self.stats.collisions.saturating_add(1);
                    self.backoff_until = Some(now + delay);
                    self.source.rewind();

                    trace!("Jam complete at {}, retry after {} slots at {}", now, slots, now + delay);
                    return None;
                },
                Some(Verdict::GiveUp) => {
                    self.stats.collisions = self.stats.collisions.saturating_add(1);
                    Outcome::GaveUp
                },
                Some(Verdict::Late) => Outcome::LateCollision,
                None => {
                    warn!("Jam complete at {} with no collision verdict, retrying", now);
                    self.source.rewind();
                    return None;
                },
            },
        };

        match outcome {
            Outcome::Ok => self.stats.sent = self.stats.sent.saturating_add(1),
            Outcome::GaveUp => self.stats.gave_up = self.stats.gave_up.saturating_add(1),
            Outcome::LateCollision => self.stats.late_collisions = self.stats.late_collisions.saturating_add(1),
            Outcome::Underflow => self.stats.underflows = self.stats.underflows.saturating_add(1),
        }

        info!("Frame complete at {}: {} ({} collisions)", now, outcome, self.window.collisions());

        self.verdict = None;
        self.backoff_until = None;
        self.window.reset();
        self.source.release();

        Some(outcome)
    }
}
