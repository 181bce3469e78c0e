//! Frame Check Sequence (Ethernet CRC-32)
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher;

use crate::error::RxError;

/// Length of the FCS trailer in bytes
pub const FCS_LEN: usize = 4;

/// CRC residual of any frame followed by its correct FCS
/// (the CRC of four zero bytes)
pub const FCS_GOOD: u32 = 0x2144_DF1C;

/// Compute the CRC-32 of a byte sequence
pub fn crc(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Encode a CRC as the on-wire FCS trailer (least significant byte first)
pub fn encode(crc: u32) -> [u8; FCS_LEN] {
    let mut b = [0u8; FCS_LEN];
    LittleEndian::write_u32(&mut b, crc);
    b
}

/// Compute the residual of a frame including its trailing FCS,
/// this is [`FCS_GOOD`] for an intact frame
pub fn residual(frame: &[u8]) -> u32 {
    crc32fast::hash(frame)
}

/// Validate a received frame (after the SFD) including FCS,
/// returning the contents with the FCS stripped
pub fn check_frame(frame: &[u8], min_len: usize) -> Result<&[u8], RxError> {
    if frame.len() < FCS_LEN || residual(frame) != FCS_GOOD {
        return Err(RxError::FrameCheck);
    }

    if frame.len() < min_len {
        return Err(RxError::Padding);
    }

    Ok(&frame[..frame.len() - FCS_LEN])
}

/// Incremental FCS generator, fed one byte at a time as the frame is driven
#[derive(Clone)]
pub struct Fcs {
    hasher: Hasher,
}

impl Default for Fcs {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Fcs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Fcs({:08x})", self.hasher.clone().finalize())
    }
}

impl Fcs {
    pub fn new() -> Self {
        Self{ hasher: Hasher::new() }
    }

    pub fn update(&mut self, byte: u8) {
        self.hasher.update(&[byte]);
    }

    /// Fetch the FCS trailer for the bytes seen so far
    pub fn trailer(&self) -> [u8; FCS_LEN] {
        encode(self.hasher.clone().finalize())
    }

    pub fn reset(&mut self) {
        self.hasher.reset();
    }
}

#[cfg(test)]
mod test {
    use std::vec::Vec;

    use super::*;

    #[test]
    fn residual_of_zeros() {
        assert_eq!(crc(&[0u8; 4]), FCS_GOOD);
    }

    #[test]
    fn appended_fcs_yields_good_residual() {
        let data: Vec<u8> = (0..64u8).collect();

        let mut frame = data.clone();
        frame.extend_from_slice(&encode(crc(&data)));

        assert_eq!(residual(&frame), FCS_GOOD);
        assert_eq!(check_frame(&frame, 64), Ok(&data[..]));
    }

    #[test]
    fn incremental_matches_oneshot() {
        let data = b"incremental fcs check";

        let mut fcs = Fcs::new();
        for b in data.iter() {
            fcs.update(*b);
        }

        assert_eq!(fcs.trailer(), encode(crc(data)));

        fcs.reset();
        assert_eq!(fcs.trailer(), encode(crc(&[])));
    }

    #[test]
    fn corrupt_frame_rejected() {
        let data: Vec<u8> = (0..64u8).collect();

        let mut frame = data.clone();
        frame.extend_from_slice(&encode(crc(&data)));
        frame[10] ^= 0x01;

        assert_eq!(check_frame(&frame, 64), Err(RxError::FrameCheck));
    }

    #[test]
    fn short_frame_rejected() {
        let data: Vec<u8> = (0..32u8).collect();

        let mut frame = data.clone();
        frame.extend_from_slice(&encode(crc(&data)));

        assert_eq!(check_frame(&frame, 64), Err(RxError::Padding));
        assert_eq!(check_frame(&frame[..3], 64), Err(RxError::FrameCheck));
    }
}
