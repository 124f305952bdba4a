//! Tile-entry data model.
//!
//! Entries are generic over the sprite reference type: fragments on disk
//! are read as [`InputEntry`] (sprite names, or indices when re-reading an
//! output), and the rewriter produces [`OutputEntry`] (indices only).

mod rewrite;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{ComposeError, Result};
use crate::registry::NO_ENTRY;

pub use rewrite::{ProcessedIds, TileEntryRewriter};

/// A sprite reference in an input fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpriteRef {
    Index(u64),
    Name(String),
}

impl SpriteRef {
    /// Whether the reference means "no sprite" rather than a missing one.
    pub fn is_blank(&self) -> bool {
        match self {
            SpriteRef::Index(i) => *i == 0,
            SpriteRef::Name(name) => name.is_empty() || name == NO_ENTRY,
        }
    }
}

impl From<&str> for SpriteRef {
    fn from(name: &str) -> Self {
        SpriteRef::Name(name.to_string())
    }
}

/// The `sprite` field of a weighted variant: one sprite or rotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpriteSet<S> {
    Many(Vec<S>),
    One(S),
}

/// A `{ "weight": n, "sprite": ... }` random-choice variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedVariant<S> {
    pub weight: Number,
    pub sprite: SpriteSet<S>,
}

/// One element of a layer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerItem<S> {
    Sprite(S),
    Weighted(WeightedVariant<S>),
}

/// An `fg` or `bg` value.
///
/// `Many` is tried first so a list of plain indices is never mistaken for a
/// weighted variant written in sequence form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Layer<S> {
    Many(Vec<LayerItem<S>>),
    One(LayerItem<S>),
}

impl<S> Layer<S> {
    /// Flatten into a list of items.
    pub fn into_items(self) -> Vec<LayerItem<S>> {
        match self {
            Layer::Many(items) => items,
            Layer::One(item) => vec![item],
        }
    }

    /// Build a layer from items, collapsing a single item to a scalar.
    /// Returns `None` for an empty list.
    pub fn from_items(mut items: Vec<LayerItem<S>>) -> Option<Self> {
        match items.len() {
            0 => None,
            1 => items.pop().map(Layer::One),
            _ => Some(Layer::Many(items)),
        }
    }
}

impl Layer<SpriteRef> {
    /// A layer with nothing to resolve: an empty list or a blank name.
    pub fn is_blank(&self) -> bool {
        match self {
            Layer::Many(items) => items.is_empty(),
            Layer::One(LayerItem::Sprite(r)) => r.is_blank(),
            Layer::One(LayerItem::Weighted(_)) => false,
        }
    }
}

/// The `id` of a tile entry: a single id or a list of ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TileIds {
    Many(Vec<String>),
    One(String),
}

impl Default for TileIds {
    fn default() -> Self {
        TileIds::Many(Vec::new())
    }
}

impl TileIds {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TileIds::Many(ids) => ids,
            TileIds::One(id) => vec![id],
        }
    }

    /// Build from a list, collapsing a single id to a string.
    pub fn from_vec(mut ids: Vec<String>) -> Self {
        if ids.len() == 1 {
            if let Some(id) = ids.pop() {
                return TileIds::One(id);
            }
        }
        TileIds::Many(ids)
    }

    /// Ids as a list of borrowed strings.
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            TileIds::Many(ids) => ids.iter().map(|s| s.as_str()).collect(),
            TileIds::One(id) => vec![id.as_str()],
        }
    }
}

impl From<&str> for TileIds {
    fn from(id: &str) -> Self {
        TileIds::One(id.to_string())
    }
}

/// A tile entry binding game ids to sprites.
///
/// Keys other than the ones modelled here are kept in `extra` and written
/// back unchanged after the known keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "S: Deserialize<'de>"))]
pub struct TileEntry<S> {
    #[serde(default)]
    pub id: TileIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg: Option<Layer<S>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg: Option<Layer<S>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotates: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multitile: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_tiles: Vec<TileEntry<S>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<S> TileEntry<S> {
    /// An entry with the given ids and nothing else.
    pub fn new(id: impl Into<TileIds>) -> Self {
        Self {
            id: id.into(),
            fg: None,
            bg: None,
            rotates: None,
            multitile: None,
            additional_tiles: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Set a single-sprite foreground.
    pub fn with_fg(mut self, sprite: S) -> Self {
        self.fg = Some(Layer::One(LayerItem::Sprite(sprite)));
        self
    }

    /// Set a single-sprite background.
    pub fn with_bg(mut self, sprite: S) -> Self {
        self.bg = Some(Layer::One(LayerItem::Sprite(sprite)));
        self
    }
}

/// A tile entry as read from a fragment.
pub type InputEntry = TileEntry<SpriteRef>;

/// A tile entry as written to the output configuration.
pub type OutputEntry = TileEntry<u64>;

/// Parse a fragment: a single entry object or a list of entries.
pub fn parse_fragment(content: &str, path: &Path) -> Result<Vec<InputEntry>> {
    let failed = |message: String| ComposeError::FragmentParseFailed {
        path: path.to_path_buf(),
        message,
    };

    let value: Value = serde_json::from_str(content).map_err(|e| failed(e.to_string()))?;
    let values = match value {
        Value::Array(values) => values,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(failed(format!(
                "expected an object or a list of objects, found {}",
                json_type_name(&other)
            )))
        }
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| serde_json::from_value(v).map_err(|e| failed(format!("entry {}: {}", i, e))))
        .collect()
}

/// Read and parse a fragment file.
pub fn load_fragment(path: &Path) -> Result<Vec<InputEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| ComposeError::FragmentParseFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_fragment(&content, path)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
