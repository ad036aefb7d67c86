//! Host-based tests for the keyboard text expander
//!
//! Runs against the `std` build of `expander-core` with its test utilities
//! and the embassy glue enabled.

pub mod support;

mod embassy_tests;
mod playback_timing_tests;
mod typing_scenarios;
