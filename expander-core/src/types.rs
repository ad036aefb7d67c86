//! Core data types for the text expander

use heapless::Vec;

use crate::hal::Duration;

/// Maximum number of keys in a configured reset or auto-expand key set
pub const MAX_KEY_SET: usize = 8;

/// HID keyboard usage code
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyCode(pub u16);

impl KeyCode {
    /// Returns true for the eight HID modifier usages (Left Control .. Right GUI)
    pub const fn is_modifier(&self) -> bool {
        self.0 >= 0xE0 && self.0 <= 0xE7
    }
}

/// A key transition observed on the keyboard
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    pub keycode: KeyCode,
    pub pressed: bool,
}

impl KeyEvent {
    pub const fn press(keycode: KeyCode) -> Self {
        Self { keycode, pressed: true }
    }

    pub const fn release(keycode: KeyCode) -> Self {
        Self { keycode, pressed: false }
    }
}

/// Host operating system convention used to enter Unicode code points
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UnicodeMode {
    /// Alt held, decimal code point on the numpad
    Windows,
    /// Option held, hex code point (Unicode Hex Input layout)
    MacOs,
    /// Ctrl+Shift+U, hex code point, Enter
    Linux,
}

impl UnicodeMode {
    /// Parse the argument of a `{{cmd:...}}` directive
    pub fn from_command(name: &str) -> Option<Self> {
        match name {
            "win" => Some(UnicodeMode::Windows),
            "mac" => Some(UnicodeMode::MacOs),
            "linux" => Some(UnicodeMode::Linux),
            _ => None,
        }
    }
}

/// Errors reported by the dictionary and the playback engine
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExpanderError {
    /// Malformed short code or expansion text, rejected before any mutation
    InvalidArgument,
    /// Node pool, text arena or entry limit exhausted
    OutOfMemory,
    /// The output layer refused a key transition
    KeySendFailure,
}

#[cfg(feature = "std")]
impl core::fmt::Display for ExpanderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExpanderError::InvalidArgument => write!(f, "Invalid short code or expansion text"),
            ExpanderError::OutOfMemory => write!(f, "Dictionary storage exhausted"),
            ExpanderError::KeySendFailure => write!(f, "Key transition could not be sent"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ExpanderError {}

/// Outcome of a manual expansion trigger
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ExpandResult {
    /// Playback started; the first step is due after the given delay
    Started(Duration),
    /// The buffer held a code with no dictionary entry; the buffer was cleared
    NoMatch,
    /// The buffer was empty, nothing was attempted
    Idle,
}

/// Expander configuration parameters
#[derive(Clone, Debug)]
pub struct ExpanderConfig {
    /// Inter-character delay; every press/release pair is split at half of it
    pub typing_delay: Duration,
    /// Longest short code accepted by the dictionary and the buffer
    pub max_code_len: usize,
    /// Longest expansion text accepted by the dictionary (bytes)
    pub max_expansion_len: usize,
    /// Maximum number of dictionary entries
    pub max_entries: usize,
    /// Key events held back while playback is active
    pub event_queue_depth: usize,
    /// Keys that always clear the candidate buffer
    pub reset_keys: Vec<KeyCode, MAX_KEY_SET>,
    /// Keys that trigger an exact lookup of the buffer
    pub auto_expand_keys: Vec<KeyCode, MAX_KEY_SET>,
    /// Key that reverts the expansion typed just before it
    pub undo_key: Option<KeyCode>,
    /// Replay the auto-expand key after every expansion, not only flagged entries
    pub preserve_trigger: bool,
    /// Abandon the buffer as soon as it stops being a dictionary prefix
    pub aggressive_reset: bool,
    /// Reseed a reset or overflowed buffer with the character that caused it
    pub restart_with_trigger_char: bool,
    /// Enter clears the buffer
    pub reset_on_enter: bool,
    /// Tab clears the buffer
    pub reset_on_tab: bool,
    /// Initial Unicode entry convention
    pub unicode_mode: UnicodeMode,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        let mut reset_keys = Vec::new();
        // Capacity is MAX_KEY_SET, one push cannot fail
        let _ = reset_keys.push(crate::codec::keys::SPACE);
        Self {
            typing_delay: Duration::from_millis(10),
            max_code_len: 16,
            max_expansion_len: 256,
            max_entries: 64,
            event_queue_depth: 16,
            reset_keys,
            auto_expand_keys: Vec::new(),
            undo_key: None,
            preserve_trigger: false,
            aggressive_reset: false,
            restart_with_trigger_char: false,
            reset_on_enter: true,
            reset_on_tab: true,
            unicode_mode: UnicodeMode::Linux,
        }
    }
}

impl ExpanderConfig {
    /// Create a new configuration with validation
    pub fn new(
        typing_delay_ms: u64,
        max_code_len: usize,
        max_expansion_len: usize,
        max_entries: usize,
        event_queue_depth: usize,
    ) -> Result<Self, &'static str> {
        let config = Self {
            typing_delay: Duration::from_millis(typing_delay_ms),
            max_code_len,
            max_expansion_len,
            max_entries,
            event_queue_depth,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the numeric limits
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.typing_delay.as_millis() > 1000 {
            return Err("Typing delay must be <= 1000ms");
        }
        if self.max_code_len == 0 || self.max_code_len > 64 {
            return Err("Max short code length must be between 1 and 64");
        }
        if self.max_expansion_len == 0 || self.max_expansion_len > u16::MAX as usize {
            return Err("Max expansion length must be between 1 and 65535");
        }
        if self.max_entries == 0 {
            return Err("Max entry count must be at least 1");
        }
        if self.event_queue_depth == 0 || self.event_queue_depth > 256 {
            return Err("Event queue depth must be between 1 and 256");
        }
        Ok(())
    }

    pub fn is_reset_key(&self, key: KeyCode) -> bool {
        self.reset_keys.contains(&key)
    }

    pub fn is_auto_expand_key(&self, key: KeyCode) -> bool {
        self.auto_expand_keys.contains(&key)
    }
}
