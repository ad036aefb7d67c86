//! Hardware abstraction layer for the expander: time types and the key output sink

// Re-export time types based on feature
#[cfg(feature = "embassy-time")]
pub use embassy_time::Duration;

#[cfg(not(feature = "embassy-time"))]
pub use self::mock_time::Duration;

#[cfg(not(feature = "embassy-time"))]
mod mock_time {
    /// Mock duration type for compilation without embassy-time
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Duration(u64);

    impl Duration {
        pub const fn from_millis(ms: u64) -> Self {
            Self(ms)
        }

        pub const fn as_millis(&self) -> u64 {
            self.0
        }
    }

    impl core::ops::Div<u32> for Duration {
        type Output = Duration;

        fn div(self, rhs: u32) -> Duration {
            Duration(self.0 / rhs as u64)
        }
    }

    impl core::ops::Add for Duration {
        type Output = Duration;

        fn add(self, rhs: Duration) -> Duration {
            Duration(self.0 + rhs.0)
        }
    }
}

use crate::types::KeyCode;

/// Error types for the reference output sinks
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// The HID report could not be queued
    ReportRejected,
    /// The transport endpoint is not connected
    NotConnected,
}

#[cfg(feature = "std")]
impl core::fmt::Display for OutputError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OutputError::ReportRejected => write!(f, "HID report rejected"),
            OutputError::NotConnected => write!(f, "Output endpoint not connected"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OutputError {}

/// Sink for emulated key transitions.
///
/// Implementations press or release `key` and flush the resulting report to the
/// host before returning. Modifiers are sent as their own keycodes.
pub trait KeyOutput {
    type Error;

    /// Press (`pressed = true`) or release a key and flush the report
    fn send_key(&mut self, key: KeyCode, pressed: bool) -> Result<(), Self::Error>;
}

impl<O: KeyOutput + ?Sized> KeyOutput for &mut O {
    type Error = O::Error;

    fn send_key(&mut self, key: KeyCode, pressed: bool) -> Result<(), Self::Error> {
        (**self).send_key(key, pressed)
    }
}

/// Output sink that discards everything
pub struct NullOutput;

impl KeyOutput for NullOutput {
    type Error = OutputError;

    fn send_key(&mut self, _key: KeyCode, _pressed: bool) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use std::vec::Vec;

    /// Records every key transition in order
    #[derive(Default, Debug)]
    pub struct RecordingOutput {
        events: Vec<(KeyCode, bool)>,
        fail_on: Option<(KeyCode, bool)>,
        fail_after: Option<usize>,
    }

    impl RecordingOutput {
        pub fn new() -> Self {
            Self::default()
        }

        /// Reject the given transition every time it is sent
        pub fn fail_on(mut self, key: KeyCode, pressed: bool) -> Self {
            self.fail_on = Some((key, pressed));
            self
        }

        /// Reject every send once `count` transitions have been accepted
        pub fn fail_after(mut self, count: usize) -> Self {
            self.fail_after = Some(count);
            self
        }

        pub fn events(&self) -> &[(KeyCode, bool)] {
            &self.events
        }

        pub fn clear(&mut self) {
            self.events.clear();
        }

        /// Keys whose last recorded transition is a press
        pub fn held_keys(&self) -> Vec<KeyCode> {
            let mut held: Vec<KeyCode> = Vec::new();
            for &(key, pressed) in &self.events {
                if pressed {
                    if !held.contains(&key) {
                        held.push(key);
                    }
                } else {
                    held.retain(|k| *k != key);
                }
            }
            held
        }

        /// Number of presses recorded for `key`
        pub fn press_count(&self, key: KeyCode) -> usize {
            self.events
                .iter()
                .filter(|&&(k, pressed)| k == key && pressed)
                .count()
        }
    }

    impl KeyOutput for RecordingOutput {
        type Error = OutputError;

        fn send_key(&mut self, key: KeyCode, pressed: bool) -> Result<(), Self::Error> {
            if self.fail_on == Some((key, pressed)) {
                return Err(OutputError::ReportRejected);
            }
            if let Some(limit) = self.fail_after {
                if self.events.len() >= limit {
                    return Err(OutputError::NotConnected);
                }
            }
            self.events.push((key, pressed));
            Ok(())
        }
    }
}
