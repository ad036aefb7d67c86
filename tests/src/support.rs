//! Shared fixtures for the host tests

use expander_core::codec::{keys, Codec, UsLayout};
use expander_core::dictionary::{load_entries, Entry, PoolTrie};
use expander_core::{Dictionary, Duration, ExpanderConfig, KeyCode, KeyOutput, OutputError, TextExpander};
use tokio::time::Instant;

/// Pool trie sized for every fixture in this crate
pub type Trie = PoolTrie<64, 2048>;

pub fn pool_expander(entries: &[Entry<'_>], config: ExpanderConfig) -> TextExpander<Trie> {
    let mut dict = Trie::new((&config).into());
    load_entries(&mut dict, entries);
    TextExpander::with_defaults(dict, config).expect("config fits the default capacities")
}

/// Keycodes typed for `text` on the US layout, ignoring shift
pub fn keys_for(text: &str) -> Vec<KeyCode> {
    text.chars()
        .map(|ch| UsLayout.char_to_keycode(ch).expect("typable character").0)
        .collect()
}

/// Text the host would show after receiving `events`
pub fn screen(events: &[(KeyCode, bool)]) -> String {
    let mut text = String::new();
    let mut shift = false;
    for &(key, pressed) in events {
        if key == keys::LEFT_SHIFT {
            shift = pressed;
            continue;
        }
        if !pressed {
            continue;
        }
        if key == keys::BACKSPACE {
            text.pop();
            continue;
        }
        if let Some(ch) = UsLayout.keycode_to_char(key) {
            let shifted = (' '..='~')
                .find(|&c| UsLayout.char_to_keycode(c) == Some((key, true)))
                .filter(|_| shift);
            text.push(shifted.unwrap_or(ch));
        }
    }
    text
}

pub fn to_std(duration: Duration) -> std::time::Duration {
    std::time::Duration::from_millis(duration.as_millis())
}

/// One transition stamped with the tokio clock
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stamped {
    pub at_ms: u64,
    pub key: KeyCode,
    pub pressed: bool,
}

/// Output sink recording when each transition reached the host
pub struct TimedOutput {
    start: Instant,
    stamped: Vec<Stamped>,
}

impl TimedOutput {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            stamped: Vec::new(),
        }
    }

    pub fn stamped(&self) -> &[Stamped] {
        &self.stamped
    }

    pub fn transitions(&self) -> Vec<(KeyCode, bool)> {
        self.stamped.iter().map(|s| (s.key, s.pressed)).collect()
    }

    /// Times at which `key` went down
    pub fn presses_of(&self, key: KeyCode) -> Vec<u64> {
        self.stamped
            .iter()
            .filter(|s| s.key == key && s.pressed)
            .map(|s| s.at_ms)
            .collect()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for TimedOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyOutput for TimedOutput {
    type Error = OutputError;

    fn send_key(&mut self, key: KeyCode, pressed: bool) -> Result<(), Self::Error> {
        self.stamped.push(Stamped {
            at_ms: self.elapsed_ms(),
            key,
            pressed,
        });
        Ok(())
    }
}

/// Drive playback on tokio timers until the expander is idle and its queue drained
pub async fn play<D, O>(expander: &mut TextExpander<D>, first: Option<Duration>, out: &mut O)
where
    D: Dictionary,
    O: KeyOutput,
{
    let mut next = first;
    while let Some(delay) = next {
        tokio::time::sleep(to_std(delay)).await;
        next = expander.on_timer(out);
    }
}
