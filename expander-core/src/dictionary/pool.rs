//! Runtime-built radix trie in fixed-capacity pools
//!
//! Nodes live in a `heapless::Vec` and refer to each other by index. Each
//! node's incoming edge is labelled with a fragment of one or more symbols;
//! fragments and expansion texts share one append-only string arena. Children
//! of a node form a singly linked list through `next_sibling`.

use heapless::{String, Vec};

use super::{
    fold_symbol, validate_entry, Dictionary, DictionaryLimits, Expansion, InsertOutcome,
    MutableDictionary, NodeId, TextRef,
};
use crate::types::ExpanderError;

#[derive(Copy, Clone, Debug, Default)]
struct PoolNode {
    fragment: TextRef,
    first_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
    text: Option<TextRef>,
    preserve_trigger: bool,
}

/// Where an insert lands, computed before anything is mutated
enum InsertPlan {
    /// The code ends exactly on an existing node
    Existing(NodeId),
    /// No child continues the code; hang a new leaf holding `code[rest..]`
    NewLeaf { parent: NodeId, rest: usize },
    /// The code diverges (or ends) `common` bytes into `child`'s fragment
    Split {
        parent: NodeId,
        child: NodeId,
        common: usize,
        rest: usize,
    },
}

/// Mutable radix trie with `NODES` node slots and an `ARENA`-byte string arena
pub struct PoolTrie<const NODES: usize, const ARENA: usize> {
    nodes: Vec<PoolNode, NODES>,
    arena: String<ARENA>,
    entries: usize,
    limits: DictionaryLimits,
}

impl<const NODES: usize, const ARENA: usize> PoolTrie<NODES, ARENA> {
    const CAPACITY_OK: () = assert!(
        NODES > 0 && NODES < u16::MAX as usize && ARENA <= u16::MAX as usize,
        "PoolTrie needs 1..65535 nodes and at most 65535 arena bytes"
    );

    /// Create an empty trie holding only the root
    pub fn new(limits: DictionaryLimits) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;

        let mut nodes = Vec::new();
        // NODES > 0 is checked at compile time
        let _ = nodes.push(PoolNode::default());
        Self {
            nodes,
            arena: String::new(),
            entries: 0,
            limits,
        }
    }

    /// Node slots in use, root included
    pub fn nodes_used(&self) -> usize {
        self.nodes.len()
    }

    /// Arena bytes in use
    pub fn arena_used(&self) -> usize {
        self.arena.len()
    }

    fn node(&self, id: NodeId) -> &PoolNode {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut PoolNode {
        &mut self.nodes[id.index()]
    }

    fn fragment(&self, id: NodeId) -> &[u8] {
        &self.arena.as_bytes()[self.node(id).fragment.range()]
    }

    fn children(&self, id: NodeId) -> Siblings<'_, NODES, ARENA> {
        Siblings {
            trie: self,
            next: self.node(id).first_child,
        }
    }

    /// Child of `id` whose fragment starts with `symbol`
    fn find_child(&self, id: NodeId, symbol: u8) -> Option<NodeId> {
        self.children(id)
            .find(|&child| self.fragment(child).first() == Some(&symbol))
    }

    /// Walk `code` from the root.
    ///
    /// Returns the last node touched and whether the code ended on its
    /// boundary (`true`) or part-way through its fragment (`false`).
    fn walk(&self, code: &str) -> Option<(NodeId, bool)> {
        let key = code.as_bytes();
        let mut node = NodeId::ROOT;
        let mut i = 0;

        while i < key.len() {
            let symbol = fold_symbol(key[i])?;
            let child = self.find_child(node, symbol)?;
            let fragment = self.fragment(child);
            let n = fragment.len().min(key.len() - i);
            for j in 0..n {
                if fold_symbol(key[i + j])? != fragment[j] {
                    return None;
                }
            }
            i += n;
            node = child;
            if n < fragment.len() {
                return Some((node, false));
            }
        }
        Some((node, true))
    }

    fn plan_insert(&self, key: &[u8]) -> InsertPlan {
        let mut node = NodeId::ROOT;
        let mut i = 0;

        while i < key.len() {
            let Some(child) = self.find_child(node, key[i]) else {
                return InsertPlan::NewLeaf { parent: node, rest: i };
            };
            let fragment = self.fragment(child);
            let common = fragment
                .iter()
                .zip(&key[i..])
                .take_while(|(a, b)| a == b)
                .count();

            if common < fragment.len() {
                return InsertPlan::Split {
                    parent: node,
                    child,
                    common,
                    rest: i + common,
                };
            }
            i += common;
            node = child;
        }
        InsertPlan::Existing(node)
    }

    fn alloc_str(&mut self, s: &str) -> Result<TextRef, ExpanderError> {
        let offset = self.arena.len();
        self.arena
            .push_str(s)
            .map_err(|_| ExpanderError::OutOfMemory)?;
        Ok(TextRef::new(offset as u16, s.len() as u16))
    }

    fn alloc_node(&mut self, node: PoolNode) -> Result<NodeId, ExpanderError> {
        let id = NodeId(self.nodes.len() as u16);
        self.nodes
            .push(node)
            .map_err(|_| ExpanderError::OutOfMemory)?;
        Ok(id)
    }

    /// Point the link that currently leads from `parent` to `old` at `new`
    fn relink_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        if self.node(parent).first_child == Some(old) {
            self.node_mut(parent).first_child = Some(new);
            return;
        }
        let mut cursor = self.node(parent).first_child;
        while let Some(id) = cursor {
            if self.node(id).next_sibling == Some(old) {
                self.node_mut(id).next_sibling = Some(new);
                return;
            }
            cursor = self.node(id).next_sibling;
        }
    }

    fn set_text(&mut self, id: NodeId, text: TextRef, preserve_trigger: bool) {
        let node = self.node_mut(id);
        node.text = Some(text);
        node.preserve_trigger = preserve_trigger;
    }
}

impl<const NODES: usize, const ARENA: usize> Default for PoolTrie<NODES, ARENA> {
    fn default() -> Self {
        Self::new(DictionaryLimits::default())
    }
}

struct Siblings<'a, const NODES: usize, const ARENA: usize> {
    trie: &'a PoolTrie<NODES, ARENA>,
    next: Option<NodeId>,
}

impl<const NODES: usize, const ARENA: usize> Iterator for Siblings<'_, NODES, ARENA> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.trie.node(id).next_sibling;
        Some(id)
    }
}

impl<const NODES: usize, const ARENA: usize> Dictionary for PoolTrie<NODES, ARENA> {
    fn lookup_exact(&self, code: &str) -> Option<Expansion> {
        if code.is_empty() {
            return None;
        }
        match self.walk(code)? {
            (node, true) => {
                let node = self.node(node);
                node.text.map(|text| Expansion {
                    text,
                    preserve_trigger: node.preserve_trigger,
                })
            }
            (_, false) => None,
        }
    }

    fn lookup_prefix_node(&self, code: &str) -> Option<NodeId> {
        self.walk(code).map(|(node, _)| node)
    }

    fn resolve(&self, text: TextRef) -> &str {
        self.arena.get(text.range()).unwrap_or("")
    }

    fn len(&self) -> usize {
        self.entries
    }
}

impl<const NODES: usize, const ARENA: usize> MutableDictionary for PoolTrie<NODES, ARENA> {
    fn insert_with_flags(
        &mut self,
        code: &str,
        text: &str,
        preserve_trigger: bool,
    ) -> Result<InsertOutcome, ExpanderError> {
        validate_entry(code, text, &self.limits)?;

        let key = code.as_bytes();
        let plan = self.plan_insert(key);

        // Work out what the insert needs so a failure leaves the trie untouched.
        let (nodes_needed, key_bytes, existing) = match plan {
            InsertPlan::Existing(node) => (0, 0, self.node(node).text),
            InsertPlan::NewLeaf { rest, .. } => (1, key.len() - rest, None),
            InsertPlan::Split { rest, .. } if rest == key.len() => (1, 0, None),
            InsertPlan::Split { rest, .. } => (2, key.len() - rest, None),
        };
        let is_update = existing.is_some();
        let same_text = existing.is_some_and(|old| self.resolve(old) == text);
        let text_bytes = if same_text { 0 } else { text.len() };

        if !is_update && self.entries >= self.limits.max_entries {
            #[cfg(feature = "defmt")]
            defmt::error!("Entry limit reached, cannot add '{}'", code);
            return Err(ExpanderError::OutOfMemory);
        }
        if self.nodes.len() + nodes_needed > NODES {
            #[cfg(feature = "defmt")]
            defmt::error!("Trie node pool is full");
            return Err(ExpanderError::OutOfMemory);
        }
        if self.arena.len() + key_bytes + text_bytes > ARENA {
            #[cfg(feature = "defmt")]
            defmt::error!("Text pool is full");
            return Err(ExpanderError::OutOfMemory);
        }

        match plan {
            InsertPlan::Existing(node) => {
                let stored = match existing {
                    Some(old) if same_text => old,
                    _ => self.alloc_str(text)?,
                };
                self.set_text(node, stored, preserve_trigger);
            }
            InsertPlan::NewLeaf { parent, rest } => {
                let fragment = self.alloc_str(&code[rest..])?;
                let stored = self.alloc_str(text)?;
                let next_sibling = self.node(parent).first_child;
                let leaf = self.alloc_node(PoolNode {
                    fragment,
                    first_child: None,
                    next_sibling,
                    text: Some(stored),
                    preserve_trigger,
                })?;
                self.node_mut(parent).first_child = Some(leaf);
            }
            InsertPlan::Split {
                parent,
                child,
                common,
                rest,
            } => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Splitting edge {} bytes into its fragment", common);
                let old_fragment = self.node(child).fragment;
                let next_sibling = self.node(child).next_sibling;
                let split = self.alloc_node(PoolNode {
                    fragment: old_fragment.take(common),
                    first_child: Some(child),
                    next_sibling,
                    text: None,
                    preserve_trigger: false,
                })?;
                self.relink_child(parent, child, split);
                {
                    let child_node = self.node_mut(child);
                    child_node.fragment = old_fragment.skip(common);
                    child_node.next_sibling = None;
                }

                let stored = self.alloc_str(text)?;
                if rest == key.len() {
                    self.set_text(split, stored, preserve_trigger);
                } else {
                    let fragment = self.alloc_str(&code[rest..])?;
                    let leaf = self.alloc_node(PoolNode {
                        fragment,
                        first_child: None,
                        next_sibling: Some(child),
                        text: Some(stored),
                        preserve_trigger,
                    })?;
                    self.node_mut(split).first_child = Some(leaf);
                }
            }
        }

        if is_update {
            #[cfg(feature = "defmt")]
            defmt::info!("Updated existing expansion for '{}'", code);
            Ok(InsertOutcome::Updated)
        } else {
            self.entries += 1;
            #[cfg(feature = "defmt")]
            defmt::info!("Loaded new expansion, count: {}", self.entries);
            Ok(InsertOutcome::Inserted)
        }
    }
}
