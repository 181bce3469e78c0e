//! Frames and the upstream byte source interface
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

use heapless::{Vec, spsc::Queue};

use crate::Tick;

/// Maximum frame length (destination through payload, excluding FCS)
pub const MAX_FRAME_LEN: usize = 1514;

/// A single unit of frame data
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Unit {
    /// Data byte
    Byte(u8),
    /// Byte corrupted upstream, forwarded as an error on the wire
    Poisoned,
}

/// Frame object with owned static storage
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    units: Vec<Unit, MAX_FRAME_LEN>,
}

impl Default for Frame {
    fn default() -> Self {
        Self{ units: Vec::new() }
    }
}

impl Frame {
    /// Build a frame from clean data bytes
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let mut f = Self::default();
        for b in data {
            f.push(Unit::Byte(*b)).ok()?;
        }
        Some(f)
    }

    /// Append a unit, returning it if the frame is full
    pub fn push(&mut self, unit: Unit) -> Result<(), Unit> {
        self.units.push(unit)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Result of pulling from a [`ByteSource`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// Next data byte of the current frame
    Byte(u8),
    /// Next byte was corrupted upstream, driven with the error marker while
    /// the rest of the frame continues (the receiver's FCS check rejects it)
    Poisoned,
    /// No more bytes in the current frame
    End,
    /// Next byte is not available yet
    Starved,
}

impl From<Unit> for Pull {
    fn from(u: Unit) -> Self {
        match u {
            Unit::Byte(b) => Pull::Byte(b),
            Unit::Poisoned => Pull::Poisoned,
        }
    }
}

/// Upstream byte source, pulled by the transmit sequencer once per byte time.
///
/// The source owns the current frame until [`ByteSource::release`] is called,
/// retries replay the frame from the start via [`ByteSource::rewind`].
pub trait ByteSource {
    /// Check whether a frame is waiting for transmission
    fn ready(&self) -> bool;

    /// Fetch the next unit of the current frame
    fn pull(&mut self, now: Tick) -> Pull;

    /// Rewind to the first byte of the current frame ahead of a retry
    fn rewind(&mut self);

    /// Release the current frame once its outcome is known
    fn release(&mut self);
}

/// In-memory frame queue implementing [`ByteSource`],
/// frames are replayable until released so never starve mid-frame.
///
/// Note heapless queues hold N-1 entries.
pub struct FrameSource<const N: usize> {
    queue: Queue<Frame, N>,
    cursor: usize,
}

impl <const N: usize> Default for FrameSource<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl <const N: usize> FrameSource<N> {
    pub fn new() -> Self {
        Self {
            queue: Queue::new(),
            cursor: 0,
        }
    }

    /// Queue a frame for transmission, returning it if the queue is full
    pub fn enqueue(&mut self, frame: Frame) -> Result<(), Frame> {
        self.queue.enqueue(frame)
    }

    /// Number of frames waiting (including any in flight)
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Offset of the next unit in the current frame
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl <const N: usize> ByteSource for FrameSource<N> {
    fn ready(&self) -> bool {
        !self.queue.is_empty()
    }

    fn pull(&mut self, _now: Tick) -> Pull {
        let frame = match self.queue.peek() {
            Some(f) => f,
            None => return Pull::Starved,
        };

        match frame.units().get(self.cursor) {
            Some(u) => {
                self.cursor += 1;
                Pull::from(*u)
            },
            None => Pull::End,
        }
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn release(&mut self) {
        let _ = self.queue.dequeue();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frame_capacity() {
        let data = [0xaa; MAX_FRAME_LEN];
        let mut f = Frame::from_bytes(&data).unwrap();

        assert_eq!(f.len(), MAX_FRAME_LEN);
        assert_eq!(f.push(Unit::Poisoned), Err(Unit::Poisoned));

        assert!(Frame::from_bytes(&[0u8; MAX_FRAME_LEN + 1]).is_none());
    }

    #[test]
    fn source_replays_until_released() {
        let mut src = FrameSource::<4>::new();
        assert!(!src.ready());
        assert_eq!(src.pull(0), Pull::Starved);

        let mut f = Frame::from_bytes(&[1, 2]).unwrap();
        f.push(Unit::Poisoned).unwrap();
        src.enqueue(f).unwrap();
        src.enqueue(Frame::from_bytes(&[9]).unwrap()).unwrap();

        assert!(src.ready());
        assert_eq!(src.pull(0), Pull::Byte(1));
        assert_eq!(src.pull(1), Pull::Byte(2));

        src.rewind();
        assert_eq!(src.pull(2), Pull::Byte(1));
        assert_eq!(src.pull(3), Pull::Byte(2));
        assert_eq!(src.pull(4), Pull::Poisoned);
        assert_eq!(src.pull(5), Pull::End);
        assert_eq!(src.pull(6), Pull::End);

        src.release();
        assert_eq!(src.len(), 1);
        assert_eq!(src.pull(7), Pull::Byte(9));
        assert_eq!(src.pull(8), Pull::End);

        src.release();
        assert!(!src.ready());
    }

    #[test]
    fn source_full() {
        let mut src = FrameSource::<2>::new();
        src.enqueue(Frame::default()).unwrap();
        assert!(src.enqueue(Frame::default()).is_err());
    }
}
