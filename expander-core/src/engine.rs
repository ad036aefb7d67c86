//! Expansion playback engine
//!
//! Deletes the typed code and retypes the expansion one key transition per
//! step. [`PlaybackEngine::step`] runs exactly one transition and returns the
//! delay before the next one, or `None` once the engine is idle.

use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::accumulator::{PlaybackRequest, TextSource};
use crate::codec::{hex_digit_key, keys, numpad_key, Codec};
use crate::hal::{Duration, KeyOutput};
use crate::markup::{command_at, literal_at, Command, LITERAL_CLOSE_LEN};
use crate::types::{ExpanderConfig, ExpanderError, KeyCode, UnicodeMode};

const NO_WAIT: Duration = Duration::from_millis(0);

/// Playback states
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackState {
    Idle,
    StartBackspace,
    BackspacePress,
    BackspaceRelease,
    StartTyping,
    TypeCharStart,
    TypeLiteralChar,
    TypeCharKeyPress,
    TypeCharKeyRelease,
    Finish,
    ReplayKeyPress,
    ReplayKeyRelease,
    UnicodeStart,
    UnicodePressMods,
    UnicodePressKey,
    UnicodeReleaseKey,
    UnicodeTypeHex,
    UnicodeReleaseMods,
    UnicodePressTerminator,
    UnicodeReleaseTerminator,
}

/// Single-instance playback state machine
pub struct PlaybackEngine {
    state: PlaybackState,
    source: TextSource,
    backspaces: u16,
    cursor: usize,
    literal_end: Option<usize>,
    /// Key and shift for the character at the cursor; `None` if unmappable
    pending: Option<(KeyCode, bool)>,
    pending_len: usize,
    in_flight: Option<KeyCode>,
    shift_active: bool,
    held_mods: Vec<KeyCode, 2>,
    replay_key: Option<KeyCode>,
    codepoint: u32,
    digits: String<8>,
    digit_cursor: usize,
    unicode_mode: UnicodeMode,
    typing_delay: Duration,
    /// Why the last expansion stopped early, until taken
    error: Option<ExpanderError>,
}

impl PlaybackEngine {
    pub fn new(config: &ExpanderConfig) -> Self {
        Self {
            state: PlaybackState::Idle,
            source: TextSource::Empty,
            backspaces: 0,
            cursor: 0,
            literal_end: None,
            pending: None,
            pending_len: 0,
            in_flight: None,
            shift_active: false,
            held_mods: Vec::new(),
            replay_key: None,
            codepoint: 0,
            digits: String::new(),
            digit_cursor: 0,
            unicode_mode: config.unicode_mode,
            typing_delay: config.typing_delay,
            error: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    /// Text the engine is typing from
    pub fn source(&self) -> TextSource {
        self.source
    }

    /// Unicode entry convention; persists across expansions
    pub fn unicode_mode(&self) -> UnicodeMode {
        self.unicode_mode
    }

    pub fn remaining_backspaces(&self) -> u16 {
        self.backspaces
    }

    /// Failure that aborted the last expansion; cleared by reading it
    pub fn take_error(&mut self) -> Option<ExpanderError> {
        self.error.take()
    }

    fn half_delay(&self) -> Duration {
        self.typing_delay / 2
    }

    /// Begin a new expansion, cancelling any active one first.
    ///
    /// Returns the delay before the first step.
    pub fn start<O: KeyOutput>(&mut self, request: PlaybackRequest, out: &mut O) -> Duration {
        self.cancel(out);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Starting expansion: backspaces={}, replay={}",
            request.backspaces,
            request.replay_key
        );

        self.source = request.source;
        self.backspaces = request.backspaces;
        self.replay_key = request.replay_key;
        self.cursor = 0;
        self.literal_end = None;
        self.pending = None;
        self.pending_len = 0;
        self.state = if self.backspaces > 0 {
            PlaybackState::StartBackspace
        } else {
            PlaybackState::StartTyping
        };
        self.typing_delay
    }

    /// Stop the active expansion without leaving any key pressed
    pub fn cancel<O: KeyOutput>(&mut self, out: &mut O) {
        if self.is_idle() {
            return;
        }
        #[cfg(feature = "defmt")]
        defmt::info!("Cancelling current expansion in state {}", self.state);
        self.release_all(out);
        self.state = PlaybackState::Idle;
    }

    /// Run one transition against `text`, the string behind [`Self::source`]
    pub fn step<O: KeyOutput, C: Codec>(
        &mut self,
        text: &str,
        out: &mut O,
        codec: &C,
    ) -> Option<Duration> {
        #[cfg(feature = "defmt")]
        defmt::trace!("Expansion engine state: {}", self.state);

        let delay = match self.state {
            PlaybackState::Idle => return None,
            PlaybackState::StartBackspace => self.handle_start_backspace(),
            PlaybackState::BackspacePress => self.handle_backspace_press(out),
            PlaybackState::BackspaceRelease => self.handle_backspace_release(out),
            PlaybackState::StartTyping | PlaybackState::TypeCharStart => {
                self.handle_type_char_start(text, codec)
            }
            PlaybackState::TypeLiteralChar => self.handle_type_literal_char(text, codec),
            PlaybackState::TypeCharKeyPress => self.handle_type_char_key_press(out),
            PlaybackState::TypeCharKeyRelease => self.handle_type_char_key_release(out),
            PlaybackState::Finish => self.handle_finish(out),
            PlaybackState::ReplayKeyPress => self.handle_replay_key_press(out),
            PlaybackState::ReplayKeyRelease => self.handle_replay_key_release(out),
            PlaybackState::UnicodeStart
            | PlaybackState::UnicodePressMods
            | PlaybackState::UnicodePressKey
            | PlaybackState::UnicodeReleaseKey
            | PlaybackState::UnicodeTypeHex
            | PlaybackState::UnicodeReleaseMods
            | PlaybackState::UnicodePressTerminator
            | PlaybackState::UnicodeReleaseTerminator => self.handle_unicode(out),
        };

        if self.is_idle() {
            None
        } else {
            delay
        }
    }

    fn handle_start_backspace(&mut self) -> Option<Duration> {
        if self.backspaces > 0 {
            self.state = PlaybackState::BackspacePress;
            Some(NO_WAIT)
        } else {
            self.state = PlaybackState::StartTyping;
            Some(self.typing_delay)
        }
    }

    fn handle_backspace_press<O: KeyOutput>(&mut self, out: &mut O) -> Option<Duration> {
        self.press(out, keys::BACKSPACE)?;
        self.state = PlaybackState::BackspaceRelease;
        Some(self.half_delay())
    }

    fn handle_backspace_release<O: KeyOutput>(&mut self, out: &mut O) -> Option<Duration> {
        self.release_in_flight(out);
        self.backspaces = self.backspaces.saturating_sub(1);
        self.state = PlaybackState::StartBackspace;
        Some(self.half_delay())
    }

    fn handle_type_char_start<C: Codec>(&mut self, text: &str, codec: &C) -> Option<Duration> {
        if self.cursor >= text.len() {
            #[cfg(feature = "defmt")]
            defmt::debug!("End of expansion string reached");
            self.state = PlaybackState::Finish;
            return Some(NO_WAIT);
        }

        if let Some((body_start, close)) = literal_at(text, self.cursor) {
            #[cfg(feature = "defmt")]
            defmt::debug!("Literal block ends at {}", close);
            self.cursor = body_start;
            self.literal_end = Some(close);
            self.state = PlaybackState::TypeLiteralChar;
            return Some(NO_WAIT);
        }

        if let Some((command, next)) = command_at(text, self.cursor) {
            self.cursor = next;
            match command {
                Command::Unicode(codepoint) => {
                    self.codepoint = codepoint;
                    self.state = PlaybackState::UnicodeStart;
                }
                Command::SetMode(mode) => {
                    #[cfg(feature = "defmt")]
                    defmt::info!("Set unicode mode to {}", mode);
                    self.unicode_mode = mode;
                    self.state = PlaybackState::TypeCharStart;
                }
                Command::Unknown => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Unknown command skipped");
                    self.state = PlaybackState::TypeCharStart;
                }
            }
            return Some(self.typing_delay);
        }

        self.prepare_char(text, codec);
        Some(NO_WAIT)
    }

    fn handle_type_literal_char<C: Codec>(&mut self, text: &str, codec: &C) -> Option<Duration> {
        let end = self.literal_end.unwrap_or(0);
        if self.cursor >= end {
            self.cursor = end + LITERAL_CLOSE_LEN;
            self.literal_end = None;
            self.state = PlaybackState::TypeCharStart;
            return Some(NO_WAIT);
        }
        self.prepare_char(text, codec);
        Some(NO_WAIT)
    }

    /// Resolve the character at the cursor and move to the press step
    fn prepare_char<C: Codec>(&mut self, text: &str, codec: &C) {
        let ch = text.get(self.cursor..).and_then(|rest| rest.chars().next());
        self.pending_len = ch.map_or(1, char::len_utf8);
        self.pending = ch.and_then(|c| codec.char_to_keycode(c));
        #[cfg(feature = "defmt")]
        if self.pending.is_none() {
            defmt::debug!("Skipping unmappable character at {}", self.cursor);
        }
        self.state = PlaybackState::TypeCharKeyPress;
    }

    fn handle_type_char_key_press<O: KeyOutput>(&mut self, out: &mut O) -> Option<Duration> {
        if let Some((key, needs_shift)) = self.pending {
            if needs_shift && !self.shift_active {
                self.press_modifier(out, keys::LEFT_SHIFT)?;
                self.shift_active = true;
            } else if !needs_shift && self.shift_active {
                self.clear_shift(out);
            }
            self.press(out, key)?;
        }
        self.state = PlaybackState::TypeCharKeyRelease;
        Some(self.half_delay())
    }

    fn handle_type_char_key_release<O: KeyOutput>(&mut self, out: &mut O) -> Option<Duration> {
        self.release_in_flight(out);
        self.cursor += self.pending_len;
        self.pending = None;
        self.state = if self.literal_end.is_some() {
            PlaybackState::TypeLiteralChar
        } else {
            PlaybackState::TypeCharStart
        };
        Some(self.half_delay())
    }

    fn handle_finish<O: KeyOutput>(&mut self, out: &mut O) -> Option<Duration> {
        #[cfg(feature = "defmt")]
        defmt::info!("Expansion finished successfully");
        self.clear_shift(out);
        if self.replay_key.is_some() {
            self.state = PlaybackState::ReplayKeyPress;
            Some(self.half_delay())
        } else {
            self.state = PlaybackState::Idle;
            None
        }
    }

    fn handle_replay_key_press<O: KeyOutput>(&mut self, out: &mut O) -> Option<Duration> {
        if let Some(key) = self.replay_key {
            self.press(out, key)?;
        }
        self.state = PlaybackState::ReplayKeyRelease;
        Some(self.half_delay())
    }

    fn handle_replay_key_release<O: KeyOutput>(&mut self, out: &mut O) -> Option<Duration> {
        self.release_in_flight(out);
        self.state = PlaybackState::Idle;
        None
    }

    fn handle_unicode<O: KeyOutput>(&mut self, out: &mut O) -> Option<Duration> {
        let mode = self.unicode_mode;
        match self.state {
            PlaybackState::UnicodeStart => {
                self.clear_shift(out);
                self.digits.clear();
                let _ = match mode {
                    UnicodeMode::Windows => write!(self.digits, "{}", self.codepoint),
                    UnicodeMode::MacOs => write!(self.digits, "{:04x}", self.codepoint),
                    UnicodeMode::Linux => write!(self.digits, "{:x}", self.codepoint),
                };
                self.digit_cursor = 0;
                #[cfg(feature = "defmt")]
                defmt::debug!("Typing U+{:X} as {}", self.codepoint, self.digits.as_str());
                self.state = PlaybackState::UnicodePressMods;
                Some(NO_WAIT)
            }
            PlaybackState::UnicodePressMods => {
                let mods: &[KeyCode] = match mode {
                    UnicodeMode::Windows | UnicodeMode::MacOs => &[keys::LEFT_ALT],
                    UnicodeMode::Linux => &[keys::LEFT_CTRL, keys::LEFT_SHIFT],
                };
                for &modifier in mods {
                    self.press_modifier(out, modifier)?;
                    let _ = self.held_mods.push(modifier);
                }
                self.state = if mode == UnicodeMode::Linux {
                    PlaybackState::UnicodePressKey
                } else {
                    PlaybackState::UnicodeTypeHex
                };
                Some(self.typing_delay)
            }
            PlaybackState::UnicodePressKey => {
                self.press(out, keys::U)?;
                self.state = PlaybackState::UnicodeReleaseKey;
                Some(self.typing_delay)
            }
            PlaybackState::UnicodeReleaseKey => {
                self.release_in_flight(out);
                self.state = PlaybackState::UnicodeTypeHex;
                Some(self.typing_delay)
            }
            PlaybackState::UnicodeTypeHex => {
                if self.in_flight.is_some() {
                    self.release_in_flight(out);
                    self.digit_cursor += 1;
                }
                let digit = self.digits.as_bytes().get(self.digit_cursor).map(|&b| b as char);
                match digit {
                    None => {
                        self.state = PlaybackState::UnicodeReleaseMods;
                        Some(self.typing_delay)
                    }
                    Some(digit) => {
                        let key = match mode {
                            UnicodeMode::Windows => numpad_key(digit),
                            UnicodeMode::MacOs | UnicodeMode::Linux => hex_digit_key(digit),
                        };
                        match key {
                            Some(key) => self.press(out, key)?,
                            None => self.digit_cursor += 1,
                        }
                        Some(self.half_delay())
                    }
                }
            }
            PlaybackState::UnicodeReleaseMods => {
                self.release_mods(out);
                if mode == UnicodeMode::Linux {
                    self.state = PlaybackState::UnicodePressTerminator;
                } else {
                    self.state = PlaybackState::TypeCharStart;
                }
                Some(self.typing_delay)
            }
            PlaybackState::UnicodePressTerminator => {
                self.press(out, keys::ENTER)?;
                self.state = PlaybackState::UnicodeReleaseTerminator;
                Some(self.typing_delay)
            }
            PlaybackState::UnicodeReleaseTerminator => {
                self.release_in_flight(out);
                self.state = PlaybackState::TypeCharStart;
                Some(self.typing_delay)
            }
            _ => Some(NO_WAIT),
        }
    }

    /// Press `key` and track it as in flight; aborts playback on failure
    fn press<O: KeyOutput>(&mut self, out: &mut O, key: KeyCode) -> Option<()> {
        if out.send_key(key, true).is_err() {
            self.abort(out, key);
            return None;
        }
        self.in_flight = Some(key);
        Some(())
    }

    fn press_modifier<O: KeyOutput>(&mut self, out: &mut O, key: KeyCode) -> Option<()> {
        if out.send_key(key, true).is_err() {
            self.abort(out, key);
            return None;
        }
        Some(())
    }

    fn release<O: KeyOutput>(out: &mut O, key: KeyCode) {
        if out.send_key(key, false).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Failed to release key {}", key);
        }
    }

    fn release_in_flight<O: KeyOutput>(&mut self, out: &mut O) {
        if let Some(key) = self.in_flight.take() {
            Self::release(out, key);
        }
    }

    fn release_mods<O: KeyOutput>(&mut self, out: &mut O) {
        while let Some(modifier) = self.held_mods.pop() {
            Self::release(out, modifier);
        }
    }

    fn clear_shift<O: KeyOutput>(&mut self, out: &mut O) {
        if self.shift_active {
            #[cfg(feature = "defmt")]
            defmt::debug!("Clearing active shift modifier");
            Self::release(out, keys::LEFT_SHIFT);
            self.shift_active = false;
        }
    }

    fn release_all<O: KeyOutput>(&mut self, out: &mut O) {
        self.release_in_flight(out);
        self.release_mods(out);
        self.clear_shift(out);
        self.pending = None;
    }

    fn abort<O: KeyOutput>(&mut self, out: &mut O, _key: KeyCode) {
        #[cfg(feature = "defmt")]
        defmt::error!("Failed to send key {}, aborting expansion", _key);
        self.error = Some(ExpanderError::KeySendFailure);
        self.release_all(out);
        self.state = PlaybackState::Idle;
    }
}
