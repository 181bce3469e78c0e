//! Logging facade, backed by `log` or `defmt` depending on features
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

#[cfg(not(feature = "defmt"))]
pub use ::log::{trace, debug, info, warn, error};

#[cfg(feature = "defmt")]
pub use defmt::{trace, debug, info, warn, error};
