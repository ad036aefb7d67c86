//! Short-code dictionary
//!
//! Two interchangeable backends implement [`Dictionary`]:
//!
//! - [`PoolTrie`]: radix trie in fixed-capacity pools, filled at startup
//!   through [`MutableDictionary::insert`].
//! - [`CompiledTrie`]: read-only trie linked from a build-time image, children
//!   found through per-node hash tables.
//!
//! The backend is a type parameter of the expander and never changes at
//! runtime. Both walk the code one symbol at a time from a unique root; only
//! lowercase ASCII letters and digits label edges and lookups fold ASCII case
//! first.

pub mod compiled;
pub mod pool;

pub use compiled::{CompiledTrie, ImageError};
pub use pool::PoolTrie;

use crate::types::{ExpanderConfig, ExpanderError};

/// Index of a node inside a dictionary's node table
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(pub u16);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Handle to a string held in a dictionary's string storage
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TextRef {
    pub offset: u16,
    pub len: u16,
}

impl TextRef {
    pub const fn new(offset: u16, len: u16) -> Self {
        Self { offset, len }
    }

    /// The same string without its first `skip` bytes
    pub fn skip(self, skip: usize) -> Self {
        let skip = skip.min(self.len as usize) as u16;
        Self {
            offset: self.offset + skip,
            len: self.len - skip,
        }
    }

    /// The first `len` bytes of the string
    pub fn take(self, len: usize) -> Self {
        Self {
            offset: self.offset,
            len: len.min(self.len as usize) as u16,
        }
    }

    pub const fn range(&self) -> core::ops::Range<usize> {
        self.offset as usize..self.offset as usize + self.len as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Result of an exact lookup
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Expansion {
    pub text: TextRef,
    /// Replay the auto-expand key once playback finishes
    pub preserve_trigger: bool,
}

/// Whether an insert created an entry or replaced one
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InsertOutcome {
    Inserted,
    Updated,
}

/// Read access shared by every backend
pub trait Dictionary {
    /// Expansion stored for exactly `code`
    fn lookup_exact(&self, code: &str) -> Option<Expansion>;

    /// Node reached by walking `code`; succeeds for every prefix of a stored code
    fn lookup_prefix_node(&self, code: &str) -> Option<NodeId>;

    /// String behind a handle returned by this dictionary; empty if the handle is foreign
    fn resolve(&self, text: TextRef) -> &str;

    /// Number of stored codes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convenience: resolved expansion text for `code`
    fn expansion_text(&self, code: &str) -> Option<&str> {
        self.lookup_exact(code).map(|e| self.resolve(e.text))
    }
}

/// Backends that can be filled at runtime
pub trait MutableDictionary: Dictionary {
    /// Store `text` under `code` with explicit per-entry flags
    fn insert_with_flags(
        &mut self,
        code: &str,
        text: &str,
        preserve_trigger: bool,
    ) -> Result<InsertOutcome, ExpanderError>;

    /// Store `text` under `code`, replacing any previous expansion
    fn insert(&mut self, code: &str, text: &str) -> Result<InsertOutcome, ExpanderError> {
        self.insert_with_flags(code, text, false)
    }
}

/// Limits enforced on every insert
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DictionaryLimits {
    pub max_code_len: usize,
    pub max_expansion_len: usize,
    pub max_entries: usize,
}

impl Default for DictionaryLimits {
    fn default() -> Self {
        Self::from(&ExpanderConfig::default())
    }
}

impl From<&ExpanderConfig> for DictionaryLimits {
    fn from(config: &ExpanderConfig) -> Self {
        Self {
            max_code_len: config.max_code_len,
            max_expansion_len: config.max_expansion_len,
            max_entries: config.max_entries,
        }
    }
}

/// Fold one byte of a code to the edge alphabet
pub fn fold_symbol(byte: u8) -> Option<u8> {
    let folded = byte.to_ascii_lowercase();
    match folded {
        b'a'..=b'z' | b'0'..=b'9' => Some(folded),
        _ => None,
    }
}

/// Returns true for characters that may appear in a short code
pub fn is_code_char(ch: char) -> bool {
    matches!(ch, 'a'..='z' | '0'..='9')
}

/// Check a code and its expansion against the insert contract
pub fn validate_entry(
    code: &str,
    text: &str,
    limits: &DictionaryLimits,
) -> Result<(), ExpanderError> {
    if code.is_empty() || code.len() > limits.max_code_len {
        return Err(ExpanderError::InvalidArgument);
    }
    if !code.chars().all(is_code_char) {
        return Err(ExpanderError::InvalidArgument);
    }
    if text.is_empty() || text.len() > limits.max_expansion_len {
        return Err(ExpanderError::InvalidArgument);
    }
    Ok(())
}

/// One configured (short code, expansion) pair
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Entry<'a> {
    pub code: &'a str,
    pub text: &'a str,
    pub preserve_trigger: bool,
}

impl<'a> Entry<'a> {
    pub const fn new(code: &'a str, text: &'a str) -> Self {
        Self {
            code,
            text,
            preserve_trigger: false,
        }
    }

    pub const fn preserving_trigger(mut self) -> Self {
        self.preserve_trigger = true;
        self
    }
}

/// Entry installed when a configuration yields no usable expansion
pub const DEFAULT_ENTRY: Entry<'static> = Entry::new("exp", "expanded");

/// Tally of a bulk load
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoadReport {
    pub loaded: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Insert every entry, continuing past per-entry failures.
///
/// When nothing could be stored and the dictionary is still empty,
/// [`DEFAULT_ENTRY`] is installed so the expander has something to expand.
pub fn load_entries<D: MutableDictionary>(dict: &mut D, entries: &[Entry<'_>]) -> LoadReport {
    let mut report = LoadReport::default();

    for entry in entries {
        match dict.insert_with_flags(entry.code, entry.text, entry.preserve_trigger) {
            Ok(InsertOutcome::Inserted) => report.loaded += 1,
            Ok(InsertOutcome::Updated) => report.updated += 1,
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Skipping expansion '{}': {}", entry.code, _e);
                report.failed += 1;
            }
        }
    }

    if report.loaded == 0 && dict.is_empty() {
        #[cfg(feature = "defmt")]
        defmt::info!("No expansions loaded, adding default '{}'", DEFAULT_ENTRY.code);
        if dict.insert(DEFAULT_ENTRY.code, DEFAULT_ENTRY.text).is_ok() {
            report.loaded += 1;
        }
    }

    #[cfg(feature = "defmt")]
    defmt::info!(
        "Loaded {} expansions ({} updated, {} failed)",
        report.loaded,
        report.updated,
        report.failed
    );
    report
}
