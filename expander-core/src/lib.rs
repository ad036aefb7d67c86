#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # Expander Core
//!
//! Keyboard text expander core for embedded systems.
//! Short codes typed on the keyboard are looked up in a compact trie and
//! replaced by their expansion, replayed as timed key transitions.

pub mod types;
pub mod hal;
pub mod codec;
pub mod markup;
pub mod dictionary;
pub mod accumulator;
pub mod engine;
pub mod expander;

#[cfg(feature = "embassy")]
pub mod tasks;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;


pub use types::*;
pub use hal::{Duration, KeyOutput, NullOutput, OutputError};
pub use codec::{Codec, UsLayout};
pub use dictionary::{
    load_entries, CompiledTrie, Dictionary, DictionaryLimits, Entry, ImageError, LoadReport,
    MutableDictionary, PoolTrie,
};
pub use engine::{PlaybackEngine, PlaybackState};
pub use expander::TextExpander;

/// Expander library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration: 10 ms typing delay, space resets, no auto-expand keys
pub fn default_config() -> ExpanderConfig {
    ExpanderConfig::default()
}
