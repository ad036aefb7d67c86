//! Inline mini-syntax of expansion texts
//!
//! - `{{{...}}}` is a literal block: everything up to the first `}}}` is typed
//!   verbatim, including brace runs.
//! - `{{...}}` is a command block: `u:<hex>` types a Unicode code point,
//!   `cmd:win|mac|linux` switches the Unicode entry convention. Unknown
//!   commands are skipped.
//! - An opener without a matching closer is plain text.

use crate::codec::{keys, Codec};
use crate::types::UnicodeMode;

const LITERAL_OPEN: &str = "{{{";
const LITERAL_CLOSE: &str = "}}}";
const COMMAND_OPEN: &str = "{{";
const COMMAND_CLOSE: &str = "}}";

/// Longest command body that is interpreted; longer bodies are ignored
pub const MAX_COMMAND_LEN: usize = 15;

/// A parsed command block
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// `{{u:<hex>}}`
    Unicode(u32),
    /// `{{cmd:<os>}}`
    SetMode(UnicodeMode),
    /// Anything else, skipped without output
    Unknown,
}

/// Width of the literal closer, skipped once the literal body is typed
pub const LITERAL_CLOSE_LEN: usize = LITERAL_CLOSE.len();

/// Literal block starting at `pos`: returns (body start, closer offset)
pub fn literal_at(text: &str, pos: usize) -> Option<(usize, usize)> {
    let rest = text.get(pos..)?;
    if !rest.starts_with(LITERAL_OPEN) {
        return None;
    }
    let body_start = pos + LITERAL_OPEN.len();
    let close = text[body_start..].find(LITERAL_CLOSE)?;
    Some((body_start, body_start + close))
}

/// Command block starting at `pos`: returns the command and the offset after the block
pub fn command_at(text: &str, pos: usize) -> Option<(Command, usize)> {
    let rest = text.get(pos..)?;
    if !rest.starts_with(COMMAND_OPEN) {
        return None;
    }
    let body_start = pos + COMMAND_OPEN.len();
    let body_len = text[body_start..].find(COMMAND_CLOSE)?;
    let body = &text[body_start..body_start + body_len];
    let next = body_start + body_len + COMMAND_CLOSE.len();

    if body.len() > MAX_COMMAND_LEN {
        return Some((Command::Unknown, next));
    }
    Some((parse_command(body), next))
}

/// Interpret the body of a command block
pub fn parse_command(body: &str) -> Command {
    if let Some(hex) = body.strip_prefix("u:") {
        return match u32::from_str_radix(hex, 16) {
            Ok(cp) if !hex.is_empty() && char::from_u32(cp).is_some() => Command::Unicode(cp),
            _ => Command::Unknown,
        };
    }
    if let Some(os) = body.strip_prefix("cmd:") {
        return UnicodeMode::from_command(os)
            .map(Command::SetMode)
            .unwrap_or(Command::Unknown);
    }
    Command::Unknown
}

/// Number of characters playback of `text` leaves on screen
pub fn rendered_len<C: Codec>(text: &str, codec: &C) -> usize {
    let mut count = 0;
    let mut pos = 0;
    while pos < text.len() {
        if let Some((body_start, close)) = literal_at(text, pos) {
            count = text[body_start..close]
                .chars()
                .fold(count, |n, ch| render_char(n, ch, codec));
            pos = close + LITERAL_CLOSE_LEN;
            continue;
        }
        if let Some((command, next)) = command_at(text, pos) {
            if let Command::Unicode(_) = command {
                count += 1;
            }
            pos = next;
            continue;
        }
        let Some(ch) = text[pos..].chars().next() else {
            break;
        };
        count = render_char(count, ch, codec);
        pos += ch.len_utf8();
    }
    count
}

/// Screen length after typing `ch`; a backspace character removes one
fn render_char<C: Codec>(count: usize, ch: char, codec: &C) -> usize {
    match codec.char_to_keycode(ch) {
        Some((key, _)) if key == keys::BACKSPACE => count.saturating_sub(1),
        Some(_) => count + 1,
        None => count,
    }
}
