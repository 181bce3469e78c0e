//! MAC Timer API
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

/// Ticks are 64-bit counts of the engine clock.
///
/// With the default configuration one tick is one bit time on the wire.
pub type Tick = u64;

/// Timer trait provides the shared time source for the MAC state machines.
///
/// All methods are monotonic and relative to the same unknown epoc,
/// the engine reads this once per tick and passes the value down
/// to each component.
pub trait Timer {
    /// Returns the number of clock ticks since some unknown epoc
    fn ticks(&self) -> Tick;
}

#[cfg(any(test, feature="mocks"))]
pub mod mock {
    use std::sync::{Arc, Mutex};

    use super::Tick;

    /// Mock timer implementation to assist with testing
    #[derive(Clone, Debug)]
    pub struct MockTimer (Arc<Mutex<Tick>>);

    impl MockTimer {
        pub fn new() -> Self {
            Self(Arc::new(Mutex::new(0)))
        }

        pub fn set(&mut self, val: Tick) {
            *self.0.lock().unwrap() = val;
        }

        pub fn inc(&mut self) {
            let mut v  = self.0.lock().unwrap();
            *v += 1;
        }

        pub fn val(&self) -> Tick {
            *self.0.lock().unwrap()
        }
    }

    impl super::Timer for MockTimer {
        fn ticks(&self) -> Tick {
            let v = self.0.lock().unwrap();
            return *v
        }
    }
}
