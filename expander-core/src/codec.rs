//! Character <-> keycode translation
//!
//! The expander only talks to the [`Codec`] trait. [`UsLayout`] is the
//! reference implementation for a US ANSI host layout.

use crate::types::KeyCode;

/// HID keyboard usage codes used by the expander
pub mod keys {
    use crate::types::KeyCode;

    pub const A: KeyCode = KeyCode(0x04);
    pub const B: KeyCode = KeyCode(0x05);
    pub const C: KeyCode = KeyCode(0x06);
    pub const D: KeyCode = KeyCode(0x07);
    pub const E: KeyCode = KeyCode(0x08);
    pub const F: KeyCode = KeyCode(0x09);
    pub const G: KeyCode = KeyCode(0x0A);
    pub const H: KeyCode = KeyCode(0x0B);
    pub const I: KeyCode = KeyCode(0x0C);
    pub const J: KeyCode = KeyCode(0x0D);
    pub const K: KeyCode = KeyCode(0x0E);
    pub const L: KeyCode = KeyCode(0x0F);
    pub const M: KeyCode = KeyCode(0x10);
    pub const N: KeyCode = KeyCode(0x11);
    pub const O: KeyCode = KeyCode(0x12);
    pub const P: KeyCode = KeyCode(0x13);
    pub const Q: KeyCode = KeyCode(0x14);
    pub const R: KeyCode = KeyCode(0x15);
    pub const S: KeyCode = KeyCode(0x16);
    pub const T: KeyCode = KeyCode(0x17);
    pub const U: KeyCode = KeyCode(0x18);
    pub const V: KeyCode = KeyCode(0x19);
    pub const W: KeyCode = KeyCode(0x1A);
    pub const X: KeyCode = KeyCode(0x1B);
    pub const Y: KeyCode = KeyCode(0x1C);
    pub const Z: KeyCode = KeyCode(0x1D);

    pub const N1: KeyCode = KeyCode(0x1E);
    pub const N2: KeyCode = KeyCode(0x1F);
    pub const N3: KeyCode = KeyCode(0x20);
    pub const N4: KeyCode = KeyCode(0x21);
    pub const N5: KeyCode = KeyCode(0x22);
    pub const N6: KeyCode = KeyCode(0x23);
    pub const N7: KeyCode = KeyCode(0x24);
    pub const N8: KeyCode = KeyCode(0x25);
    pub const N9: KeyCode = KeyCode(0x26);
    pub const N0: KeyCode = KeyCode(0x27);

    pub const ENTER: KeyCode = KeyCode(0x28);
    pub const ESCAPE: KeyCode = KeyCode(0x29);
    pub const BACKSPACE: KeyCode = KeyCode(0x2A);
    pub const TAB: KeyCode = KeyCode(0x2B);
    pub const SPACE: KeyCode = KeyCode(0x2C);
    pub const MINUS: KeyCode = KeyCode(0x2D);
    pub const EQUAL: KeyCode = KeyCode(0x2E);
    pub const LEFT_BRACKET: KeyCode = KeyCode(0x2F);
    pub const RIGHT_BRACKET: KeyCode = KeyCode(0x30);
    pub const BACKSLASH: KeyCode = KeyCode(0x31);
    pub const SEMICOLON: KeyCode = KeyCode(0x33);
    pub const QUOTE: KeyCode = KeyCode(0x34);
    pub const GRAVE: KeyCode = KeyCode(0x35);
    pub const COMMA: KeyCode = KeyCode(0x36);
    pub const DOT: KeyCode = KeyCode(0x37);
    pub const SLASH: KeyCode = KeyCode(0x38);

    pub const KP1: KeyCode = KeyCode(0x59);
    pub const KP2: KeyCode = KeyCode(0x5A);
    pub const KP3: KeyCode = KeyCode(0x5B);
    pub const KP4: KeyCode = KeyCode(0x5C);
    pub const KP5: KeyCode = KeyCode(0x5D);
    pub const KP6: KeyCode = KeyCode(0x5E);
    pub const KP7: KeyCode = KeyCode(0x5F);
    pub const KP8: KeyCode = KeyCode(0x60);
    pub const KP9: KeyCode = KeyCode(0x61);
    pub const KP0: KeyCode = KeyCode(0x62);

    pub const LEFT_CTRL: KeyCode = KeyCode(0xE0);
    pub const LEFT_SHIFT: KeyCode = KeyCode(0xE1);
    pub const LEFT_ALT: KeyCode = KeyCode(0xE2);
    pub const LEFT_GUI: KeyCode = KeyCode(0xE3);
    pub const RIGHT_CTRL: KeyCode = KeyCode(0xE4);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(0xE5);
    pub const RIGHT_ALT: KeyCode = KeyCode(0xE6);
    pub const RIGHT_GUI: KeyCode = KeyCode(0xE7);
}

/// Translation between characters and keycodes for the host layout
pub trait Codec {
    /// Keycode producing `ch` and whether shift must be held for it
    fn char_to_keycode(&self, ch: char) -> Option<(KeyCode, bool)>;

    /// Unshifted character produced by `key`, if any
    fn keycode_to_char(&self, key: KeyCode) -> Option<char>;
}

/// US ANSI layout
#[derive(Copy, Clone, Debug, Default)]
pub struct UsLayout;

// Sorted by character; searched with binary search.
const SYMBOLS: &[(char, KeyCode, bool)] = &[
    ('\u{8}', keys::BACKSPACE, false),
    ('\t', keys::TAB, false),
    ('\n', keys::ENTER, false),
    (' ', keys::SPACE, false),
    ('!', keys::N1, true),
    ('"', keys::QUOTE, true),
    ('#', keys::N3, true),
    ('$', keys::N4, true),
    ('%', keys::N5, true),
    ('&', keys::N7, true),
    ('\'', keys::QUOTE, false),
    ('(', keys::N9, true),
    (')', keys::N0, true),
    ('*', keys::N8, true),
    ('+', keys::EQUAL, true),
    (',', keys::COMMA, false),
    ('-', keys::MINUS, false),
    ('.', keys::DOT, false),
    ('/', keys::SLASH, false),
    (':', keys::SEMICOLON, true),
    (';', keys::SEMICOLON, false),
    ('<', keys::COMMA, true),
    ('=', keys::EQUAL, false),
    ('>', keys::DOT, true),
    ('?', keys::SLASH, true),
    ('@', keys::N2, true),
    ('[', keys::LEFT_BRACKET, false),
    ('\\', keys::BACKSLASH, false),
    (']', keys::RIGHT_BRACKET, false),
    ('^', keys::N6, true),
    ('_', keys::MINUS, true),
    ('`', keys::GRAVE, false),
    ('{', keys::LEFT_BRACKET, true),
    ('|', keys::BACKSLASH, true),
    ('}', keys::RIGHT_BRACKET, true),
    ('~', keys::GRAVE, true),
];

impl Codec for UsLayout {
    fn char_to_keycode(&self, ch: char) -> Option<(KeyCode, bool)> {
        match ch {
            'a'..='z' => Some((letter_key(ch as u8 - b'a'), false)),
            'A'..='Z' => Some((letter_key(ch as u8 - b'A'), true)),
            '0'..='9' => digit_key(ch).map(|key| (key, false)),
            _ => SYMBOLS
                .binary_search_by_key(&ch, |&(c, _, _)| c)
                .ok()
                .map(|i| (SYMBOLS[i].1, SYMBOLS[i].2)),
        }
    }

    fn keycode_to_char(&self, key: KeyCode) -> Option<char> {
        match key.0 {
            0x04..=0x1D => Some((b'a' + (key.0 - 0x04) as u8) as char),
            0x1E..=0x26 => Some((b'1' + (key.0 - 0x1E) as u8) as char),
            0x27 => Some('0'),
            _ => SYMBOLS
                .iter()
                .find(|&&(_, k, shift)| k == key && !shift)
                .map(|&(c, _, _)| c),
        }
    }
}

const fn letter_key(index: u8) -> KeyCode {
    KeyCode(keys::A.0 + index as u16)
}

/// Top-row keycode for a decimal digit
pub fn digit_key(digit: char) -> Option<KeyCode> {
    match digit {
        '0' => Some(keys::N0),
        '1'..='9' => Some(KeyCode(keys::N1.0 + (digit as u8 - b'1') as u16)),
        _ => None,
    }
}

/// Keypad keycode for a decimal digit
pub fn numpad_key(digit: char) -> Option<KeyCode> {
    match digit {
        '0' => Some(keys::KP0),
        '1'..='9' => Some(KeyCode(keys::KP1.0 + (digit as u8 - b'1') as u16)),
        _ => None,
    }
}

/// Keycode typing a hex digit (either case) without shift
pub fn hex_digit_key(digit: char) -> Option<KeyCode> {
    match digit.to_ascii_lowercase() {
        d @ '0'..='9' => digit_key(d),
        d @ 'a'..='f' => Some(letter_key(d as u8 - b'a')),
        _ => None,
    }
}
