//! Half-duplex Ethernet MAC transmit engine
//!
//! Implements the CSMA/CD side of an Ethernet MAC: carrier-sense deferral with
//! the inter-packet gap, collision window classification, truncated binary
//! exponential backoff, underflow detection and a single terminal status per
//! frame. The engine is a clock-stepped state machine, call [`mac::Mac::tick`]
//! once per clock with the sampled carrier and collision inputs.
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

#![no_std]

#[cfg(any(test, feature="std"))]
extern crate std;

pub mod timer;

pub mod log;

pub mod error;

pub mod fcs;

pub mod frame;

pub mod lfsr;

pub mod mac;

#[cfg(any(test, feature="mocks"))]
pub mod mock;

pub mod prelude;

pub use timer::Tick;
