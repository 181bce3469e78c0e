//! Mock implementations for testing the MAC against a modelled medium
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

use std::collections::VecDeque;
use std::vec::Vec;

use rand_core::{impls, Error, RngCore};

use crate::Tick;
use crate::error::{CoreError, RxError};
use crate::fcs::{self, FCS_LEN};
use crate::frame::{ByteSource, Pull};
use crate::log::{debug, trace};
use crate::mac::{Config, Inputs, Mac, Outputs};
use crate::mac::sequencer::{MiiTx, SFD};
use crate::mac::status::{Outcome, Reporter, StatusFlags};
use crate::timer::mock::MockTimer;

/// Random source that always selects the shortest backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroRng;

impl RngCore for ZeroRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.iter_mut().for_each(|b| *b = 0 );
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Random source that always selects the longest backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxRng;

impl RngCore for MaxRng {
    fn next_u32(&mut self) -> u32 {
        u32::MAX
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.iter_mut().for_each(|b| *b = 0xff );
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Entries in a mock frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Entry {
    Byte(u8),
    Poisoned,
    /// Source stalls here indefinitely
    Stall,
}

/// Frame description for [`MockSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct MockFrame {
    entries: Vec<Entry>,
    /// Minimum ticks between bytes
    cadence: Tick,
}

impl MockFrame {
    pub fn data(data: &[u8]) -> Self {
        Self::entries(data.iter().map(|b| Entry::Byte(*b) ).collect())
    }

    pub fn entries(entries: Vec<Entry>) -> Self {
        Self{ entries, cadence: 0 }
    }

    /// Frame that stalls after `index` bytes
    pub fn stall_at(data: &[u8], index: usize) -> Self {
        let mut f = Self::data(data);
        f.entries.insert(index, Entry::Stall);
        f
    }

    /// Pace bytes no faster than one per `ticks`
    pub fn with_cadence(mut self, ticks: Tick) -> Self {
        self.cadence = ticks;
        self
    }
}

/// Mock upstream source, frames may stall or be paced slower than the line rate.
///
/// Stalls and pacing apply to every attempt, as a replay of the frame would.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    frames: VecDeque<MockFrame>,
    cursor: usize,
    last: Option<Tick>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: MockFrame) {
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl ByteSource for MockSource {
    fn ready(&self) -> bool {
        !self.frames.is_empty()
    }

    fn pull(&mut self, now: Tick) -> Pull {
        let frame = match self.frames.front() {
            Some(f) => f,
            None => return Pull::Starved,
        };

        let entry = match frame.entries.get(self.cursor) {
            Some(e) => *e,
            None => return Pull::End,
        };

        if let Some(last) = self.last {
            if now < last + frame.cadence {
                return Pull::Starved;
            }
        }

        let p = match entry {
            Entry::Byte(b) => Pull::Byte(b),
            Entry::Poisoned => Pull::Poisoned,
            Entry::Stall => return Pull::Starved,
        };

        self.cursor += 1;
        self.last = Some(now);

        p
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.last = None;
    }

    fn release(&mut self) {
        let _ = self.frames.pop_front();
        self.cursor = 0;
        self.last = None;
    }
}

/// Frame as seen by the modelled receiver
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    /// First tick with transmit enable asserted
    pub start: Tick,
    /// First tick after transmit enable was deasserted
    pub end: Tick,
    /// Frame contents with preamble and FCS removed
    pub result: Result<Vec<u8>, RxError>,
}

/// Modelled receiver, collects nibbles from the MII and checks each burst
#[derive(Debug, Clone)]
pub struct MockPhy {
    min_len: usize,
    active: Option<Tick>,
    nibbles: Vec<Option<u8>>,
    frames: Vec<Received>,
}

impl MockPhy {
    /// Create a receiver rejecting frames shorter than `min_len` (including FCS)
    pub fn new(min_len: usize) -> Self {
        Self {
            min_len,
            active: None,
            nibbles: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Sample the transmit interface for a single tick
    pub fn sample(&mut self, now: Tick, mii: &MiiTx) {
        match (self.active, mii.en) {
            (None, true) => {
                self.active = Some(now);
                self.nibbles.clear();
            },
            (Some(start), false) => {
                let result = decode(&self.nibbles, self.min_len);
                debug!("Received {} nibbles ({}..{}): {:?}", self.nibbles.len(), start, now, result.as_ref().map(|f| f.len()));

                self.frames.push(Received{ start, end: now, result });
                self.active = None;
                return;
            },
            (None, false) => return,
            _ => (),
        }

        if mii.ce {
            self.nibbles.push(match mii.er {
                true => None,
                false => Some(mii.data & 0x0f),
            });
        }
    }

    pub fn frames(&self) -> &[Received] {
        &self.frames
    }

    pub fn last(&self) -> Option<&Received> {
        self.frames.last()
    }
}

/// Decode a burst of nibbles (least significant first), errored nibbles are `None`
pub fn decode(nibbles: &[Option<u8>], min_len: usize) -> Result<Vec<u8>, RxError> {
    if nibbles.len() % 2 != 0 {
        return Err(RxError::Alignment);
    }

    let bytes: Vec<Option<u8>> = nibbles.chunks(2).map(|n| match (n[0], n[1]) {
        (Some(lo), Some(hi)) => Some(lo | hi << 4),
        _ => None,
    }).collect();

    let sfd = match bytes.iter().position(|b| *b == Some(SFD) ) {
        Some(i) => i,
        None => return Err(RxError::NoSfd),
    };

    let frame: Option<Vec<u8>> = bytes[sfd + 1..].iter().cloned().collect();
    let frame = match frame {
        Some(f) => f,
        None => return Err(RxError::FrameCheck),
    };

    fcs::check_frame(&frame, min_len).map(|f| f.to_vec())
}

/// Test bench, runs a [`Mac`] against a scripted medium and a modelled receiver
pub struct Bench<G> {
    pub mac: Mac<MockSource, G, MockTimer>,
    pub phy: MockPhy,

    timer: MockTimer,
    reporter: Reporter,

    /// Collision offsets applied to successive attempts
    collisions: VecDeque<Tick>,
    /// Collision tick for the current attempt
    pending: Option<Tick>,
    /// Carrier windows, [from, to)
    carrier: Vec<(Tick, Tick)>,

    was_en: bool,

    starts: Vec<Tick>,
    hits: Vec<Tick>,
    statuses: Vec<(Tick, StatusFlags)>,
}

impl <G: RngCore> Bench<G> {
    pub fn new(config: Config, rng: G) -> Result<Self, CoreError> {
        let timer = MockTimer::new();
        let phy = MockPhy::new(config.min_frame_bytes as usize + FCS_LEN);
        let mac = Mac::new(config, MockSource::new(), rng, timer.clone())?;

        Ok(Self {
            mac,
            phy,
            timer,
            reporter: Reporter::new(),
            collisions: VecDeque::new(),
            pending: None,
            carrier: Vec::new(),
            was_en: false,
            starts: Vec::new(),
            hits: Vec::new(),
            statuses: Vec::new(),
        })
    }

    pub fn now(&self) -> Tick {
        self.timer.val()
    }

    pub fn send(&mut self, frame: MockFrame) {
        self.mac.source_mut().push(frame);
    }

    /// Queue a single tick collision `offset` ticks into an attempt,
    /// queued collisions are applied to successive attempts.
    ///
    /// Collisions can only be seen from the tick after transmit enable rises,
    /// so an offset of zero is applied at one.
    pub fn collide(&mut self, offset: Tick) {
        self.collisions.push_back(offset.max(1));
    }

    /// Assert carrier over [from, to)
    pub fn carrier(&mut self, from: Tick, to: Tick) {
        self.carrier.push((from, to));
    }

    /// Attempt start ticks
    pub fn starts(&self) -> &[Tick] {
        &self.starts
    }

    /// Ticks at which collisions were asserted
    pub fn hits(&self) -> &[Tick] {
        &self.hits
    }

    /// Status indicators observed, with the tick they were seen on
    pub fn statuses(&self) -> &[(Tick, StatusFlags)] {
        &self.statuses
    }

    pub fn clear_records(&mut self) {
        self.starts.clear();
        self.hits.clear();
    }

    /// Run a single tick
    pub fn step(&mut self) -> Outputs {
        let now = self.timer.val();

        let carrier = self.carrier.iter().any(|(from, to)| now >= *from && now < *to );
        let collision = self.pending == Some(now);
        if collision {
            trace!("Asserting collision at {}", now);
            self.hits.push(now);
        }

        let out = self.mac.tick(Inputs{ carrier, collision });

        if out.mii.en && !self.was_en {
            self.starts.push(now);
            self.pending = self.collisions.pop_front().map(|o| now + o );
        }
        self.was_en = out.mii.en;

        self.phy.sample(now, &out.mii);

        self.reporter.observe(out.status);
        if !out.status.is_empty() {
            self.statuses.push((now, out.status));
        }

        self.timer.inc();

        out
    }

    pub fn run(&mut self, ticks: Tick) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Run until the next attempt starts, returning the start tick
    pub fn run_until_start(&mut self, limit: Tick) -> Result<Tick, CoreError> {
        for _ in 0..limit {
            let now = self.now();
            if self.step().mii.en && self.starts.last() == Some(&now) {
                return Ok(now);
            }
        }
        Err(CoreError::Timeout)
    }

    /// Run until a frame outcome is reported
    pub fn run_until_outcome(&mut self, limit: Tick) -> Result<Outcome, CoreError> {
        self.reporter.clear();

        for _ in 0..limit {
            self.step();
            if let Some(o) = self.reporter.outcome()? {
                return Ok(o);
            }
        }

        Err(CoreError::Timeout)
    }
}
