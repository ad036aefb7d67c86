//! Read-only trie linked from a build-time image
//!
//! Layout (little-endian):
//!
//! ```text
//! header   magic "TXEX" | version u16 | nodes u16 | tables u16 | buckets u16
//!          | entries u16 | reserved u16 | string pool length u32
//! nodes    table u16 (0xFFFF none) | text offset u16 | flags u8 | reserved u8
//! tables   first bucket u16 | bucket count u16
//! buckets  entry u16 (0xFFFF empty)
//! entries  key u8 | reserved u8 | child node u16 | next entry u16 (0xFFFF end)
//! strings  NUL-terminated UTF-8
//! ```
//!
//! The child of a node for symbol `c` lives in bucket `c % bucket_count` of
//! the node's table, found by walking that bucket's chain.

use super::{fold_symbol, Dictionary, Expansion, NodeId, TextRef};

pub const IMAGE_MAGIC: [u8; 4] = *b"TXEX";
pub const IMAGE_VERSION: u16 = 1;

pub const HEADER_LEN: usize = 20;
pub const NODE_LEN: usize = 6;
pub const TABLE_LEN: usize = 4;
pub const BUCKET_LEN: usize = 2;
pub const ENTRY_LEN: usize = 6;

/// Sentinel for "no table", "no text", "empty bucket" and "end of chain"
pub const NONE: u16 = 0xFFFF;

pub const FLAG_TERMINAL: u8 = 0x01;
pub const FLAG_PRESERVE_TRIGGER: u8 = 0x02;

/// Reasons an image is rejected
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImageError {
    BadMagic,
    UnsupportedVersion(u16),
    /// Shorter than its header says
    Truncated,
    /// A node, table, bucket or entry points outside its section
    IndexOutOfRange,
    InvalidUtf8,
    /// An edge key outside `[a-z0-9]`
    InvalidKey,
}

#[cfg(feature = "std")]
impl core::fmt::Display for ImageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ImageError::BadMagic => write!(f, "Not a dictionary image"),
            ImageError::UnsupportedVersion(v) => write!(f, "Unsupported image version {}", v),
            ImageError::Truncated => write!(f, "Image is truncated"),
            ImageError::IndexOutOfRange => write!(f, "Image index out of range"),
            ImageError::InvalidUtf8 => write!(f, "String pool is not valid UTF-8"),
            ImageError::InvalidKey => write!(f, "Invalid edge key in image"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ImageError {}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Splits `len` bytes off the front of `rest`
fn take_section<'a>(rest: &mut &'a [u8], len: usize) -> Result<&'a [u8], ImageError> {
    if rest.len() < len {
        return Err(ImageError::Truncated);
    }
    let (section, tail) = rest.split_at(len);
    *rest = tail;
    Ok(section)
}

/// Zero-copy view over a validated image
#[derive(Copy, Clone, Debug)]
pub struct CompiledTrie<'a> {
    nodes: &'a [u8],
    tables: &'a [u8],
    buckets: &'a [u8],
    entries: &'a [u8],
    strings: &'a str,
    entry_count: u16,
    terminal_count: usize,
}

impl<'a> CompiledTrie<'a> {
    /// Dictionary with no codes
    pub const fn empty() -> Self {
        Self {
            nodes: &[],
            tables: &[],
            buckets: &[],
            entries: &[],
            strings: "",
            entry_count: 0,
            terminal_count: 0,
        }
    }

    /// Validate `bytes` and borrow it as a dictionary.
    ///
    /// Every index in the image is range-checked here so lookups never fail
    /// on a malformed image. Bytes past the string pool are ignored.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, ImageError> {
        if bytes.len() < HEADER_LEN {
            return Err(ImageError::Truncated);
        }
        if bytes[0..4] != IMAGE_MAGIC {
            return Err(ImageError::BadMagic);
        }
        let version = read_u16(bytes, 4);
        if version != IMAGE_VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }

        let node_count = read_u16(bytes, 6) as usize;
        let table_count = read_u16(bytes, 8) as usize;
        let bucket_count = read_u16(bytes, 10) as usize;
        let entry_count = read_u16(bytes, 12) as usize;
        let string_len = read_u32(bytes, 16) as usize;

        let mut rest = &bytes[HEADER_LEN..];
        let nodes = take_section(&mut rest, node_count * NODE_LEN)?;
        let tables = take_section(&mut rest, table_count * TABLE_LEN)?;
        let buckets = take_section(&mut rest, bucket_count * BUCKET_LEN)?;
        let entries = take_section(&mut rest, entry_count * ENTRY_LEN)?;
        let strings = take_section(&mut rest, string_len)?;
        let strings = core::str::from_utf8(strings).map_err(|_| ImageError::InvalidUtf8)?;

        let in_range = |index: u16, count: usize| index == NONE || (index as usize) < count;

        let mut terminal_count = 0;
        for node in nodes.chunks_exact(NODE_LEN) {
            if !in_range(read_u16(node, 0), table_count) {
                return Err(ImageError::IndexOutOfRange);
            }
            if node[4] & FLAG_TERMINAL != 0 {
                text_len_at(strings, read_u16(node, 2)).ok_or(ImageError::IndexOutOfRange)?;
                terminal_count += 1;
            }
        }
        for table in tables.chunks_exact(TABLE_LEN) {
            let start = read_u16(table, 0) as usize;
            let count = read_u16(table, 2) as usize;
            if start + count > bucket_count {
                return Err(ImageError::IndexOutOfRange);
            }
        }
        for bucket in buckets.chunks_exact(BUCKET_LEN) {
            if !in_range(read_u16(bucket, 0), entry_count) {
                return Err(ImageError::IndexOutOfRange);
            }
        }
        for entry in entries.chunks_exact(ENTRY_LEN) {
            if fold_symbol(entry[0]) != Some(entry[0]) {
                return Err(ImageError::InvalidKey);
            }
            let child = read_u16(entry, 2);
            if child == NONE || child as usize >= node_count {
                return Err(ImageError::IndexOutOfRange);
            }
            if !in_range(read_u16(entry, 4), entry_count) {
                return Err(ImageError::IndexOutOfRange);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Dictionary image: {} nodes, {} codes, {} string bytes",
            node_count,
            terminal_count,
            string_len
        );

        Ok(Self {
            nodes,
            tables,
            buckets,
            entries,
            strings,
            entry_count: entry_count as u16,
            terminal_count,
        })
    }

    fn node(&self, id: NodeId) -> &'a [u8] {
        let at = id.index() * NODE_LEN;
        &self.nodes[at..at + NODE_LEN]
    }

    fn child(&self, id: NodeId, symbol: u8) -> Option<NodeId> {
        let table = read_u16(self.node(id), 0);
        if table == NONE {
            return None;
        }
        let at = table as usize * TABLE_LEN;
        let start = read_u16(self.tables, at) as usize;
        let count = read_u16(self.tables, at + 2) as usize;
        if count == 0 {
            return None;
        }

        let mut entry = read_u16(self.buckets, (start + symbol as usize % count) * BUCKET_LEN);
        // A malformed chain may loop; no chain is longer than the entry table.
        for _ in 0..self.entry_count {
            if entry == NONE {
                return None;
            }
            let at = entry as usize * ENTRY_LEN;
            if self.entries[at] == symbol {
                return Some(NodeId(read_u16(self.entries, at + 2)));
            }
            entry = read_u16(self.entries, at + 4);
        }
        None
    }

    fn walk(&self, code: &str) -> Option<NodeId> {
        if self.nodes.is_empty() {
            return None;
        }
        code.bytes().try_fold(NodeId::ROOT, |node, byte| {
            self.child(node, fold_symbol(byte)?)
        })
    }
}

impl Default for CompiledTrie<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Length of the NUL-terminated string at `offset`, if it is well formed
fn text_len_at(strings: &str, offset: u16) -> Option<u16> {
    if offset == NONE || !strings.is_char_boundary(offset as usize) {
        return None;
    }
    let tail = strings.get(offset as usize..)?;
    let len = tail.find('\0')?;
    u16::try_from(len).ok()
}

impl Dictionary for CompiledTrie<'_> {
    fn lookup_exact(&self, code: &str) -> Option<Expansion> {
        if code.is_empty() {
            return None;
        }
        let node = self.node(self.walk(code)?);
        let flags = node[4];
        if flags & FLAG_TERMINAL == 0 {
            return None;
        }
        let offset = read_u16(node, 2);
        let len = text_len_at(self.strings, offset)?;
        Some(Expansion {
            text: TextRef::new(offset, len),
            preserve_trigger: flags & FLAG_PRESERVE_TRIGGER != 0,
        })
    }

    fn lookup_prefix_node(&self, code: &str) -> Option<NodeId> {
        self.walk(code)
    }

    fn resolve(&self, text: TextRef) -> &str {
        self.strings.get(text.range()).unwrap_or("")
    }

    fn len(&self) -> usize {
        self.terminal_count
    }
}
