//! Transmit sequencer, drives preamble, data, padding and FCS onto the MII
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

use crate::Tick;
use crate::fcs::{Fcs, FCS_LEN};
use crate::frame::{ByteSource, Pull};
use crate::log::{trace, debug, warn};

use super::config::Config;

/// Preamble byte
pub const PREAMBLE: u8 = 0x55;

/// Start of frame delimiter
pub const SFD: u8 = 0xd5;

/// Nibble driven during the jam sequence
pub const JAM: u8 = 0x5;

/// MII transmit interface signals for a single tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MiiTx {
    /// Clock enable, a new nibble is presented on this tick
    pub ce: bool,
    /// Transmit enable
    pub en: bool,
    /// Transmit error, the current nibble is corrupt
    pub er: bool,
    /// Transmit nibble
    pub data: u8,
}

/// Sequencer stages
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    Idle,
    Preamble,
    Data,
    Pad,
    Fcs,
    /// Driving the error marker for the byte the source failed to supply
    Underflow,
    /// Driving the jam sequence after a collision
    Jam{ remaining: u32 },
}

impl Stage {
    /// Stages in which a collision aborts the attempt
    pub fn abortable(&self) -> bool {
        match self {
            Stage::Preamble | Stage::Data | Stage::Pad | Stage::Fcs => true,
            _ => false,
        }
    }
}

/// Completion events, reported on the first tick the sequencer stops driving
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Done {
    /// Frame and FCS sent in full
    Sent,
    /// Jam sequence complete following a collision
    Jammed,
    /// Attempt terminated following source underflow
    Underflow,
}

/// Result of a single sequencer tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Step {
    /// Signals to drive this tick
    pub mii: MiiTx,
    /// A collision was latched on this tick
    pub collided: bool,
    /// The attempt finished on this tick
    pub done: Option<Done>,
}

/// Transmit sequencer
///
/// Streams one attempt onto the MII one nibble per clock enable, least
/// significant nibble first. Bytes are pulled from the source at each byte
/// boundary, and a collision latched mid-byte takes effect at the next one.
#[derive(Debug, Clone)]
pub struct Sequencer {
    nibble_ticks: Tick,
    preamble_bytes: u32,
    preamble_nibbles: u32,
    jam_nibbles: u32,
    min_frame: usize,

    stage: Stage,
    /// Ticks since the attempt started
    elapsed: Tick,
    /// Nibbles driven in this attempt
    nibbles: u32,
    /// Byte position within the preamble or FCS
    pos: usize,
    /// Data and padding bytes driven
    len: usize,
    abort: bool,

    byte: u8,
    er: bool,
    high: bool,
    mii: MiiTx,

    fcs: Fcs,
    trailer: [u8; FCS_LEN],
}

impl Sequencer {
    pub fn new(config: &Config) -> Self {
        Self {
            nibble_ticks: config.nibble_ticks(),
            preamble_bytes: config.preamble_bytes,
            preamble_nibbles: config.preamble_nibbles(),
            jam_nibbles: config.jam_nibbles(),
            min_frame: config.min_frame_bytes as usize,

            stage: Stage::Idle,
            elapsed: 0,
            nibbles: 0,
            pos: 0,
            len: 0,
            abort: false,

            byte: 0,
            er: false,
            high: false,
            mii: MiiTx::default(),

            fcs: Fcs::new(),
            trailer: [0u8; FCS_LEN],
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Check whether an attempt is in progress
    pub fn active(&self) -> bool {
        self.stage != Stage::Idle
    }

    /// Data and padding bytes driven in the current attempt
    pub fn len(&self) -> usize {
        self.len
    }

    /// Begin a new attempt, the first nibble is driven by the next call to `step`
    pub fn start(&mut self) {
        self.stage = Stage::Preamble;
        self.elapsed = 0;
        self.nibbles = 0;
        self.pos = 0;
        self.len = 0;
        self.abort = false;
        self.high = false;
        self.fcs.reset();
    }

    /// Advance by one tick with the sampled collision input
    pub fn step<S: ByteSource>(&mut self, now: Tick, collision: bool, source: &mut S) -> Step {
        if self.stage == Stage::Idle {
            return Step::default();
        }

        // Between clock enables hold the current nibble
        if self.elapsed % self.nibble_ticks != 0 {
            self.elapsed += 1;
            return self.drive(collision, false);
        }

        if !self.high {
            if let Some(done) = self.load(now, source) {
                trace!("Attempt done at {} ({:?}, {} nibbles)", now, done, self.nibbles);
                self.stage = Stage::Idle;
                self.mii = MiiTx::default();
                return Step{ done: Some(done), ..Default::default() };
            }
        }

        let data = match self.stage {
            Stage::Jam{ .. } => JAM,
            _ if self.high => self.byte >> 4,
            _ => self.byte & 0x0f,
        };

        self.mii = MiiTx {
            ce: true,
            en: true,
            er: self.er,
            data,
        };

        if let Stage::Jam{ remaining } = &mut self.stage {
            *remaining -= 1;
        } else {
            self.high = !self.high;
        }

        self.nibbles += 1;
        self.elapsed += 1;

        self.drive(collision, true)
    }

    fn drive(&mut self, collision: bool, ce: bool) -> Step {
        let mut collided = false;

        if collision && !self.abort && self.stage.abortable() {
            trace!("Collision latched in {:?} after {} nibbles", self.stage, self.nibbles);
            self.abort = true;
            collided = true;
        }

        Step {
            mii: MiiTx{ ce, ..self.mii },
            collided,
            done: None,
        }
    }

    /// Load the next byte at a byte boundary, returning an event if the attempt is complete
    fn load<S: ByteSource>(&mut self, now: Tick, source: &mut S) -> Option<Done> {
        if self.abort && self.stage.abortable() {
            self.abort = false;

            // Starvation wins over a pending collision
            if self.stage == Stage::Data && source.pull(now) == Pull::Starved {
                warn!("Source underflow at {} with pending collision", now);
                return self.underflow();
            }

            let mut remaining = self.jam_nibbles;
            if self.stage == Stage::Preamble {
                remaining += self.preamble_nibbles - self.nibbles;
            }

            trace!("Jamming for {} nibbles", remaining);
            self.stage = Stage::Jam{ remaining };
            self.er = false;
        }

        loop {
            match self.stage {
                Stage::Idle => return None,
                Stage::Jam{ remaining } => {
                    return match remaining {
                        0 => Some(Done::Jammed),
                        _ => None,
                    };
                },
                Stage::Underflow => return Some(Done::Underflow),
                Stage::Preamble => {
                    if (self.pos as u32) < self.preamble_bytes {
                        self.pos += 1;
                        self.byte = match self.pos as u32 == self.preamble_bytes {
                            true => SFD,
                            false => PREAMBLE,
                        };
                        self.er = false;
                        return None;
                    }

                    self.stage = Stage::Data;
                },
                Stage::Data => {
                    match source.pull(now) {
                        Pull::Byte(b) => {
                            self.push(b, false);
                            return None;
                        },
                        Pull::Poisoned => {
                            debug!("Forwarding poisoned byte {} at {}", self.len, now);
                            self.push(0, true);
                            return None;
                        },
                        Pull::Starved => {
                            warn!("Source underflow at {} after {} bytes", now, self.len);
                            return self.underflow();
                        },
                        Pull::End => {
                            self.stage = match self.len < self.min_frame {
                                true => Stage::Pad,
                                false => Stage::Fcs,
                            };
                            self.pos = 0;
                        },
                    }
                },
                Stage::Pad => {
                    if self.len < self.min_frame {
                        self.push(0, false);
                        return None;
                    }
                    self.stage = Stage::Fcs;
                    self.pos = 0;
                },
                Stage::Fcs => {
                    if self.pos == 0 {
                        self.trailer = self.fcs.trailer();
                    }
                    if self.pos < FCS_LEN {
                        self.byte = self.trailer[self.pos];
                        self.er = false;
                        self.pos += 1;
                        return None;
                    }
                    return Some(Done::Sent);
                },
            }
        }
    }

    fn push(&mut self, byte: u8, er: bool) {
        self.byte = byte;
        self.er = er;
        self.len += 1;
        self.fcs.update(byte);
    }

    /// Drive the error marker for the remainder of this byte window
    fn underflow(&mut self) -> Option<Done> {
        self.stage = Stage::Underflow;
        self.byte = 0;
        self.er = true;
        None
    }
}

#[cfg(test)]
mod test {
    use std::vec::Vec;

    use crate::fcs;
    use crate::frame::{Frame, FrameSource, Unit};

    use super::*;

    /// Run a single attempt to completion, collecting driven nibbles
    fn run(seq: &mut Sequencer, src: &mut FrameSource<4>, collide_at: Option<Tick>) -> (Vec<MiiTx>, Done, Tick) {
        let mut nibbles = Vec::new();
        seq.start();

        for now in 0..100_000 {
            let s = seq.step(now, collide_at == Some(now), src);
            if let Some(d) = s.done {
                assert_eq!(s.mii.en, false);
                return (nibbles, d, now);
            }
            assert!(s.mii.en);
            if s.mii.ce {
                nibbles.push(s.mii);
            }
        }
        panic!("attempt never completed");
    }

    fn bytes(nibbles: &[MiiTx]) -> Vec<u8> {
        nibbles.chunks(2).map(|n| n[0].data | n[1].data << 4 ).collect()
    }

    #[test]
    fn sends_padded_frame() {
        let c = Config::default();
        let mut seq = Sequencer::new(&c);
        let mut src = FrameSource::<4>::new();

        let data: Vec<u8> = (0..32).collect();
        src.enqueue(Frame::from_bytes(&data).unwrap()).unwrap();

        let (nibbles, done, end) = run(&mut seq, &mut src, None);
        assert_eq!(done, Done::Sent);
        assert_eq!(seq.len(), 60);

        // Preamble + padded payload + FCS, one byte per byte time
        assert_eq!(end, (8 + 60 + 4) * c.byte_ticks());
        assert!(nibbles.iter().all(|n| !n.er ));

        let b = bytes(&nibbles);
        assert_eq!(&b[..7], &[PREAMBLE; 7]);
        assert_eq!(b[7], SFD);
        assert_eq!(&b[8..40], &data[..]);
        assert!(b[40..68].iter().all(|v| *v == 0));
        assert_eq!(fcs::check_frame(&b[8..], 64).map(|f| f.len()), Ok(60));
    }

    #[test]
    fn poisoned_byte_forwarded() {
        let c = Config::default();
        let mut seq = Sequencer::new(&c);
        let mut src = FrameSource::<4>::new();

        let mut f = Frame::from_bytes(&[0xab; 10]).unwrap();
        f.push(Unit::Poisoned).unwrap();
        f.push(Unit::Byte(0xcd)).unwrap();
        src.enqueue(f).unwrap();

        let (nibbles, done, _end) = run(&mut seq, &mut src, None);
        assert_eq!(done, Done::Sent);

        // Error flagged for exactly the poisoned byte
        let errs: Vec<usize> = nibbles.iter().enumerate().filter(|(_, n)| n.er ).map(|(i, _)| i ).collect();
        assert_eq!(errs, &[2 * (8 + 10), 2 * (8 + 10) + 1]);

        let b = bytes(&nibbles);
        assert_eq!(b[8 + 11], 0xcd);
        assert_eq!(b.len(), 8 + 60 + 4);
    }

    #[test]
    fn collision_jams_after_preamble() {
        let c = Config::default();
        let mut seq = Sequencer::new(&c);
        let mut src = FrameSource::<4>::new();
        src.enqueue(Frame::from_bytes(&[1; 64]).unwrap()).unwrap();

        let (nibbles, done, end) = run(&mut seq, &mut src, Some(3));
        assert_eq!(done, Done::Jammed);

        // Preamble completed then jam, no SFD
        assert_eq!(nibbles.len() as u32, c.preamble_nibbles() + c.jam_nibbles());
        assert!(nibbles[2..].iter().all(|n| n.data == JAM ));
        assert_eq!(end, (c.preamble_bytes + c.jam_bytes) as Tick * c.byte_ticks());
    }

    #[test]
    fn collision_in_data() {
        let c = Config::default();
        let mut seq = Sequencer::new(&c);
        let mut src = FrameSource::<4>::new();
        src.enqueue(Frame::from_bytes(&[1; 64]).unwrap()).unwrap();

        // Mid way through data byte 20, jam starts at the next byte
        let at = (8 + 20) * c.byte_ticks() + 5;
        let (nibbles, done, end) = run(&mut seq, &mut src, Some(at));
        assert_eq!(done, Done::Jammed);
        assert_eq!(nibbles.len() as u32, 2 * (8 + 21) + c.jam_nibbles());
        assert_eq!(end, (8 + 21 + 4) * c.byte_ticks());
    }

    #[test]
    fn collision_after_end_ignored() {
        let c = Config::default();
        let mut seq = Sequencer::new(&c);
        let mut src = FrameSource::<4>::new();
        src.enqueue(Frame::from_bytes(&[1; 32]).unwrap()).unwrap();

        let (_nibbles, done, _end) = run(&mut seq, &mut src, Some(72 * c.byte_ticks()));
        assert_eq!(done, Done::Sent);
    }
}
