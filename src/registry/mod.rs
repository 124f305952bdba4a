//! Sprite registry: the global sprite name <-> index mapping.
//!
//! Indices are allocated from a single cursor shared by every sheet, in the
//! order sprites are registered. Index 0 is the built-in null sprite and is
//! never handed out by [`SpriteRegistry::register`].
//!
//! # Example
//!
//! ```ignore
//! use tilecompose::registry::{Registration, SpriteRegistry};
//! use tilecompose::discovery::SheetClass;
//!
//! let mut registry = SpriteRegistry::new();
//! let first = registry.next_index();
//! assert_eq!(registry.register("grass", SheetClass::Main), Registration::Added(first));
//! assert_eq!(registry.resolve("grass"), first);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::discovery::SheetClass;

/// Index of the built-in transparent sprite.
pub const NULL_INDEX: u64 = 0;

/// Sprite name that is never registered and never reported as missing.
pub const NO_ENTRY: &str = "no_entry";

/// Outcome of registering a sprite name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new index was allocated.
    Added(u64),
    /// A filler sprite shadowed by an earlier sprite; the existing index stands.
    Shadowed(u64),
    /// A main sprite whose name is already taken; nothing was allocated.
    Duplicate(u64),
    /// A reserved name that is never registered.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpriteInfo {
    index: u64,
    class: SheetClass,
}

/// Name <-> index bijection plus the unreferenced-sprite sets.
#[derive(Debug, Clone, Default)]
pub struct SpriteRegistry {
    by_name: HashMap<String, SpriteInfo>,
    by_index: BTreeMap<u64, String>,

    /// Last index handed out or reserved (0 = the null sprite).
    cursor: u64,

    unreferenced_main: BTreeSet<u64>,
    unreferenced_filler: BTreeSet<u64>,
}

impl SpriteRegistry {
    /// Create an empty registry; only the null sprite exists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sprite root name for a sheet of the given class.
    pub fn register(&mut self, name: &str, class: SheetClass) -> Registration {
        if name.is_empty() || name == NO_ENTRY {
            return Registration::Skipped;
        }

        if let Some(existing) = self.by_name.get(name) {
            return match class {
                SheetClass::Main => Registration::Duplicate(existing.index),
                _ => Registration::Shadowed(existing.index),
            };
        }

        self.cursor += 1;
        let index = self.cursor;
        self.by_name
            .insert(name.to_string(), SpriteInfo { index, class });
        self.by_index.insert(index, name.to_string());
        if let Some(set) = self.unreferenced_set(class) {
            set.insert(index);
        }

        Registration::Added(index)
    }

    /// Index of a sprite name, or [`NULL_INDEX`] when unknown.
    pub fn resolve(&self, name: &str) -> u64 {
        self.by_name
            .get(name)
            .map(|info| info.index)
            .unwrap_or(NULL_INDEX)
    }

    /// Sprite name registered at an index.
    pub fn name_of(&self, index: u64) -> Option<&str> {
        self.by_index.get(&index).map(|s| s.as_str())
    }

    /// Note that a tile entry referenced this sprite. Idempotent.
    pub fn mark_referenced(&mut self, name: &str) {
        if let Some(info) = self.by_name.get(name).copied() {
            if let Some(set) = self.unreferenced_set(info.class) {
                set.remove(&info.index);
            }
        }
    }

    /// Like [`mark_referenced`](Self::mark_referenced), by index.
    pub fn mark_referenced_index(&mut self, index: u64) {
        if let Some(name) = self.by_index.get(&index).cloned() {
            self.mark_referenced(&name);
        }
    }

    /// Sprites of a class never referenced so far, in index order.
    pub fn unreferenced(&self, class: SheetClass) -> Vec<(u64, String)> {
        let set = match class {
            SheetClass::Main => &self.unreferenced_main,
            SheetClass::Filler => &self.unreferenced_filler,
            SheetClass::Fallback => return Vec::new(),
        };
        set.iter()
            .filter_map(|i| self.by_index.get(i).map(|n| (*i, n.clone())))
            .collect()
    }

    /// The index the next sheet would start at.
    pub fn next_index(&self) -> u64 {
        self.cursor + 1
    }

    /// The last index handed out or reserved.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Whether an index lies inside a sheet range handed out so far.
    ///
    /// Grid padding counts: reserved cells render as transparent sprites.
    pub fn is_allocated(&self, index: u64) -> bool {
        index != NULL_INDEX && index <= self.cursor
    }

    /// Reserve every index up to and including `max_index` (grid padding).
    pub fn reserve_through(&mut self, max_index: u64) {
        self.cursor = self.cursor.max(max_index);
    }

    /// Number of registered sprites (excluding the null sprite).
    pub fn count(&self) -> usize {
        self.by_name.len()
    }

    /// Check if no sprite has been registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn unreferenced_set(&mut self, class: SheetClass) -> Option<&mut BTreeSet<u64>> {
        match class {
            SheetClass::Main => Some(&mut self.unreferenced_main),
            SheetClass::Filler => Some(&mut self.unreferenced_filler),
            SheetClass::Fallback => None,
        }
    }
}
