//! Test utilities for the expander core

pub use crate::hal::mock::RecordingOutput;

pub mod image {
    //! Writer for compiled dictionary images
    //!
    //! Produces the same layout as the offline compiler: nodes in breadth-first
    //! order, one hash table per inner node sized to the next power of two of
    //! its child count, chains built by prepending.

    use std::collections::{BTreeMap, VecDeque};
    use std::string::String;
    use std::vec::Vec;

    use crate::dictionary::compiled::{
        FLAG_PRESERVE_TRIGGER, FLAG_TERMINAL, IMAGE_MAGIC, IMAGE_VERSION, NONE,
    };
    use crate::dictionary::Entry;

    #[derive(Default)]
    struct TreeNode {
        children: BTreeMap<u8, usize>,
        text: Option<(String, bool)>,
    }

    fn put_u16(out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    /// Serialize `entries`; later entries replace earlier ones with the same code
    pub fn build_image(entries: &[Entry<'_>]) -> Vec<u8> {
        let mut tree = vec![TreeNode::default()];
        for entry in entries {
            let mut node = 0;
            for byte in entry.code.bytes() {
                node = match tree[node].children.get(&byte) {
                    Some(&child) => child,
                    None => {
                        tree.push(TreeNode::default());
                        let child = tree.len() - 1;
                        tree[node].children.insert(byte, child);
                        child
                    }
                };
            }
            tree[node].text = Some((entry.text.to_string(), entry.preserve_trigger));
        }

        // Breadth-first numbering
        let mut order = Vec::new();
        let mut ids = vec![0u16; tree.len()];
        let mut queue = VecDeque::from([0usize]);
        while let Some(node) = queue.pop_front() {
            ids[node] = order.len() as u16;
            order.push(node);
            queue.extend(tree[node].children.values().copied());
        }

        let mut nodes = Vec::new();
        let mut tables = Vec::new();
        let mut buckets: Vec<u16> = Vec::new();
        let mut chain: Vec<(u8, u16, u16)> = Vec::new();
        let mut strings = Vec::new();

        for &node in &order {
            let tree_node = &tree[node];

            let table = if tree_node.children.is_empty() {
                NONE
            } else {
                let count = tree_node.children.len().next_power_of_two();
                let start = buckets.len();
                buckets.resize(start + count, NONE);
                for (&key, &child) in &tree_node.children {
                    let slot = start + key as usize % count;
                    chain.push((key, ids[child], buckets[slot]));
                    buckets[slot] = (chain.len() - 1) as u16;
                }
                tables.push((start as u16, count as u16));
                (tables.len() - 1) as u16
            };

            let (offset, flags) = match &tree_node.text {
                Some((text, preserve)) => {
                    let offset = strings.len() as u16;
                    strings.extend_from_slice(text.as_bytes());
                    strings.push(0);
                    let flags = if *preserve {
                        FLAG_TERMINAL | FLAG_PRESERVE_TRIGGER
                    } else {
                        FLAG_TERMINAL
                    };
                    (offset, flags)
                }
                None => (NONE, 0),
            };

            put_u16(&mut nodes, table);
            put_u16(&mut nodes, offset);
            nodes.push(flags);
            nodes.push(0);
        }

        let mut image = Vec::new();
        image.extend_from_slice(&IMAGE_MAGIC);
        put_u16(&mut image, IMAGE_VERSION);
        put_u16(&mut image, order.len() as u16);
        put_u16(&mut image, tables.len() as u16);
        put_u16(&mut image, buckets.len() as u16);
        put_u16(&mut image, chain.len() as u16);
        put_u16(&mut image, 0);
        image.extend_from_slice(&(strings.len() as u32).to_le_bytes());

        image.extend_from_slice(&nodes);
        for (start, count) in tables {
            put_u16(&mut image, start);
            put_u16(&mut image, count);
        }
        for bucket in buckets {
            put_u16(&mut image, bucket);
        }
        for (key, child, next) in chain {
            image.push(key);
            image.push(0);
            put_u16(&mut image, child);
            put_u16(&mut image, next);
        }
        image.extend_from_slice(&strings);
        image
    }
}

pub mod driver {
    //! Helpers that drive an expander without a timer

    use crate::codec::Codec;
    use crate::dictionary::Dictionary;
    use crate::expander::TextExpander;
    use crate::hal::{Duration, KeyOutput};
    use crate::types::{KeyCode, KeyEvent};

    /// Press and release each key in turn; returns the delay of the last
    /// expansion started, if any
    pub fn tap_keys<D, C, O, const CODE: usize, const QUEUE: usize>(
        expander: &mut TextExpander<D, C, CODE, QUEUE>,
        keys: &[KeyCode],
        out: &mut O,
    ) -> Option<Duration>
    where
        D: Dictionary,
        C: Codec,
        O: KeyOutput,
    {
        let mut started = None;
        for &key in keys {
            if let Some(delay) = expander.handle_key_event(KeyEvent::press(key), out) {
                started = Some(delay);
            }
            expander.handle_key_event(KeyEvent::release(key), out);
        }
        started
    }

    /// Step until the expander is idle with an empty queue.
    ///
    /// `first` is the delay returned when playback started. Returns the total
    /// simulated time spent.
    pub fn run_to_idle<D, C, O, const CODE: usize, const QUEUE: usize>(
        expander: &mut TextExpander<D, C, CODE, QUEUE>,
        first: Option<Duration>,
        out: &mut O,
    ) -> Duration
    where
        D: Dictionary,
        C: Codec,
        O: KeyOutput,
    {
        let mut elapsed = Duration::from_millis(0);
        let mut next = first;
        let mut steps = 0;
        while let Some(delay) = next {
            elapsed = elapsed + delay;
            next = expander.on_timer(out);
            steps += 1;
            assert!(steps < 100_000, "playback did not finish");
        }
        elapsed
    }
}

pub use driver::{run_to_idle, tap_keys};
pub use image::build_image;
