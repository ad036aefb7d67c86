//! Short-code accumulator
//!
//! Folds key presses into a candidate buffer and decides when a dictionary
//! lookup should hand off to playback. Never runs while playback is active;
//! the expander queues events instead.

use heapless::String;

use crate::codec::{keys, Codec};
use crate::dictionary::{is_code_char, Dictionary, TextRef};
use crate::markup::rendered_len;
use crate::types::{ExpanderConfig, KeyCode, KeyEvent};

/// What playback types once the backspaces are done
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TextSource {
    /// Expansion text held by the dictionary
    Dictionary(TextRef),
    /// The short code of the last expansion, retyped by undo
    UndoCode,
    /// Nothing to type
    Empty,
}

/// Everything the playback engine needs to start
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlaybackRequest {
    pub source: TextSource,
    pub backspaces: u16,
    pub replay_key: Option<KeyCode>,
}

/// Outcome of a manual trigger
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerOutcome {
    Play(PlaybackRequest),
    NoMatch,
    Empty,
}

/// The last expansion, kept so it can be reverted
#[derive(Clone, Debug)]
struct UndoRecord<const N: usize> {
    code: String<N>,
    /// Characters playback left on screen
    typed_len: u16,
    replayed: bool,
    /// The code was kept on screen as the start of the expansion
    suffix_applied: bool,
}

/// Candidate buffer plus undo bookkeeping; `N` bounds the buffer
pub struct Accumulator<const N: usize> {
    buffer: String<N>,
    undo: Option<UndoRecord<N>>,
    just_expanded: bool,
}

impl<const N: usize> Default for Accumulator<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Accumulator<N> {
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
            undo: None,
            just_expanded: false,
        }
    }

    /// Current candidate code
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        if !self.buffer.is_empty() {
            #[cfg(feature = "defmt")]
            defmt::debug!("Resetting short code");
        }
        self.buffer.clear();
    }

    /// Short code retyped by an undo, empty when none is pending
    pub fn undo_code(&self) -> &str {
        self.undo.as_ref().map(|u| u.code.as_str()).unwrap_or("")
    }

    /// True while the next key event may still undo the last expansion
    pub fn can_undo(&self) -> bool {
        self.just_expanded && self.undo.is_some()
    }

    /// Drop the undo record; playback stopped before the expansion was fully typed
    pub fn forget_undo(&mut self) {
        self.just_expanded = false;
        self.undo = None;
    }

    /// Feed one key event; returns a request when it starts playback
    pub fn on_key<D: Dictionary, C: Codec>(
        &mut self,
        event: KeyEvent,
        dictionary: &D,
        codec: &C,
        config: &ExpanderConfig,
    ) -> Option<PlaybackRequest> {
        if !event.pressed {
            return None;
        }
        let key = event.keycode;
        let just_expanded = core::mem::replace(&mut self.just_expanded, false);

        if just_expanded && config.undo_key == Some(key) {
            if let Some(request) = self.undo_request() {
                return Some(request);
            }
        }

        if let Some(ch) = codec.keycode_to_char(key).filter(|&c| is_code_char(c)) {
            self.push_code_char(ch, config);
            if config.aggressive_reset
                && !self.buffer.is_empty()
                && dictionary.lookup_prefix_node(&self.buffer).is_none()
            {
                #[cfg(feature = "defmt")]
                defmt::debug!("Aggressive reset triggered for '{}'", self.buffer.as_str());
                self.buffer.clear();
                if config.restart_with_trigger_char {
                    let _ = self.buffer.push(ch);
                }
            }
            return None;
        }

        if key == keys::BACKSPACE {
            self.buffer.pop();
            return None;
        }

        if config.is_auto_expand_key(key) {
            let request = self.expand(dictionary, codec, config, Some(key));
            if request.is_none() {
                self.clear();
            }
            return request;
        }

        if config.is_reset_key(key) || !is_ignorable(key, config) {
            self.clear();
        }
        None
    }

    /// Manual trigger: look up the buffer as typed
    pub fn trigger<D: Dictionary, C: Codec>(
        &mut self,
        dictionary: &D,
        codec: &C,
        config: &ExpanderConfig,
    ) -> TriggerOutcome {
        self.just_expanded = false;
        if self.buffer.is_empty() {
            return TriggerOutcome::Empty;
        }
        match self.expand(dictionary, codec, config, None) {
            Some(request) => TriggerOutcome::Play(request),
            None => {
                #[cfg(feature = "defmt")]
                defmt::debug!("No expansion found for '{}', resetting", self.buffer.as_str());
                self.clear();
                TriggerOutcome::NoMatch
            }
        }
    }

    fn push_code_char(&mut self, ch: char, config: &ExpanderConfig) {
        if self.buffer.len() >= config.max_code_len.min(N) || self.buffer.push(ch).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Short code buffer full, resetting");
            self.buffer.clear();
            if config.restart_with_trigger_char {
                let _ = self.buffer.push(ch);
            }
        }
    }

    /// Exact-lookup the buffer and build the playback request on a hit.
    ///
    /// `trigger` is the auto-expand key that reached the host, if any; it
    /// adds one backspace and may be replayed afterwards.
    fn expand<D: Dictionary, C: Codec>(
        &mut self,
        dictionary: &D,
        codec: &C,
        config: &ExpanderConfig,
        trigger: Option<KeyCode>,
    ) -> Option<PlaybackRequest> {
        let expansion = dictionary.lookup_exact(&self.buffer)?;
        let full = dictionary.resolve(expansion.text);

        let code_len = self.buffer.len();
        let suffix_applied = full.starts_with(self.buffer.as_str());
        let (text, mut backspaces) = if suffix_applied {
            (expansion.text.skip(code_len), 0)
        } else {
            (expansion.text, code_len as u16)
        };

        let replay_key = match trigger {
            Some(key) => {
                backspaces += 1;
                (expansion.preserve_trigger || config.preserve_trigger).then_some(key)
            }
            None => None,
        };

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Found expansion for '{}', backspaces={}, suffix={}",
            self.buffer.as_str(),
            backspaces,
            suffix_applied
        );

        let typed_len = rendered_len(dictionary.resolve(text), codec);
        self.undo = Some(UndoRecord {
            code: self.buffer.clone(),
            typed_len: typed_len.min(u16::MAX as usize) as u16,
            replayed: replay_key.is_some(),
            suffix_applied,
        });
        self.just_expanded = true;
        self.buffer.clear();

        Some(PlaybackRequest {
            source: TextSource::Dictionary(text),
            backspaces,
            replay_key,
        })
    }

    fn undo_request(&mut self) -> Option<PlaybackRequest> {
        let record = self.undo.as_ref()?;
        let backspaces = record.typed_len.saturating_add(record.replayed as u16);
        let source = if record.suffix_applied {
            TextSource::Empty
        } else {
            TextSource::UndoCode
        };

        #[cfg(feature = "defmt")]
        defmt::info!("Undoing expansion of '{}'", record.code.as_str());

        // The code is back on screen, so it is the candidate again
        self.buffer.clone_from(&record.code);
        Some(PlaybackRequest {
            source,
            backspaces,
            replay_key: None,
        })
    }
}

/// Keys that leave the buffer alone when they are not otherwise handled
fn is_ignorable(key: KeyCode, config: &ExpanderConfig) -> bool {
    key.is_modifier()
        || (key == keys::ENTER && !config.reset_on_enter)
        || (key == keys::TAB && !config.reset_on_tab)
}
