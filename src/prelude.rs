//! CSMA/CD crate prelude
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

pub use crate::Tick;
pub use crate::timer::{Timer as MacTimer};

pub use crate::error::{CoreError, ConfigError, RxError};

pub use crate::frame::{ByteSource, Frame, FrameSource, Pull, Unit};

pub use crate::mac::{Mac, MacStats, Inputs, Outputs, Config as MacConfig};
pub use crate::mac::sequencer::MiiTx;
pub use crate::mac::status::{Outcome, StatusFlags};

pub use crate::lfsr::Lfsr;
