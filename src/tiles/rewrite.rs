//! Tile-entry rewriting: sprite names to indices, id uniqueness.
//!
//! Rewriting an entry resolves every `fg`/`bg` reference through the sprite
//! registry, recurses into `additional_tiles` with the parent's first id as a
//! namespace prefix, and then drops ids that were already emitted. Main
//! sheets report such duplicates as errors; filler sheets drop them silently
//! unless obsolete-filler reporting is on.

use std::collections::HashSet;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::discovery::SheetClass;
use crate::error::Result;
use crate::registry::SpriteRegistry;

use super::{
    InputEntry, Layer, LayerItem, OutputEntry, SpriteRef, SpriteSet, TileEntry, TileIds,
    WeightedVariant,
};

/// Fully-qualified ids already emitted.
///
/// Insertions are journaled so a dropped parent entry can take back the ids
/// its `additional_tiles` claimed.
#[derive(Debug, Clone, Default)]
pub struct ProcessedIds {
    ids: HashSet<String>,
    journal: Vec<String>,
}

impl ProcessedIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an id; returns false when it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.ids.contains(&id) {
            return false;
        }
        self.journal.push(id.clone());
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Position to [`rollback`](Self::rollback) to.
    pub fn checkpoint(&self) -> usize {
        self.journal.len()
    }

    /// Forget every id inserted since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: usize) {
        if checkpoint >= self.journal.len() {
            return;
        }
        for id in self.journal.drain(checkpoint..) {
            self.ids.remove(&id);
        }
    }
}

/// Converts input tile entries of one sheet to output form.
pub struct TileEntryRewriter<'a> {
    registry: &'a mut SpriteRegistry,
    processed: &'a mut ProcessedIds,
    sink: &'a mut DiagnosticSink,
    class: SheetClass,
    report_obsolete: bool,
    sheet: &'a str,
}

impl<'a> TileEntryRewriter<'a> {
    pub fn new(
        registry: &'a mut SpriteRegistry,
        processed: &'a mut ProcessedIds,
        sink: &'a mut DiagnosticSink,
        class: SheetClass,
        sheet: &'a str,
    ) -> Self {
        Self {
            registry,
            processed,
            sink,
            class,
            report_obsolete: false,
            sheet,
        }
    }

    /// Report `ObsoleteFiller` when a filler id or sprite is shadowed.
    pub fn report_obsolete(mut self, enabled: bool) -> Self {
        self.report_obsolete = enabled;
        self
    }

    /// Rewrite one top-level entry. `Ok(None)` means nothing is emitted.
    pub fn rewrite(&mut self, entry: InputEntry) -> Result<Option<OutputEntry>> {
        self.rewrite_prefixed(entry, "")
    }

    fn rewrite_prefixed(&mut self, entry: InputEntry, prefix: &str) -> Result<Option<OutputEntry>> {
        let TileEntry {
            id,
            fg,
            bg,
            rotates,
            multitile,
            additional_tiles,
            extra,
        } = entry;

        let ids = id.into_vec();
        let blank = |layer: &Option<Layer<SpriteRef>>| layer.as_ref().map_or(true, Layer::is_blank);
        if ids.is_empty() || (blank(&fg) && blank(&bg)) {
            let what = ids
                .first()
                .map(|id| format!("tile '{}{}'", prefix, id))
                .unwrap_or_else(|| "tile entry without id".to_string());
            self.sink.report_kind(
                DiagnosticKind::SkipEmptyEntry,
                format!("{} in {} has no sprites; skipped", what, self.sheet),
            )?;
            return Ok(None);
        }

        let qualified = format!("{}{}", prefix, ids[0]);
        let fg = match fg {
            Some(layer) => self.rewrite_layer(layer, &qualified)?,
            None => None,
        };
        let bg = match bg {
            Some(layer) => self.rewrite_layer(layer, &qualified)?,
            None => None,
        };

        if fg.is_none() && bg.is_none() {
            self.sink.report_kind(
                DiagnosticKind::SkipEmptyEntry,
                format!(
                    "tile '{}' in {} has no resolvable sprites; skipped",
                    qualified, self.sheet
                ),
            )?;
            return Ok(None);
        }

        let checkpoint = self.processed.checkpoint();
        let child_prefix = format!("{}_", qualified);
        let mut children = Vec::with_capacity(additional_tiles.len());
        for child in additional_tiles {
            if let Some(child) = self.rewrite_prefixed(child, &child_prefix)? {
                children.push(child);
            }
        }

        let mut kept = Vec::with_capacity(ids.len());
        for id in ids {
            let full_id = format!("{}{}", prefix, id);
            if self.processed.insert(full_id.clone()) {
                kept.push(id);
                continue;
            }

            match self.class {
                SheetClass::Filler => {
                    if self.report_obsolete {
                        self.sink.report(Diagnostic::new(
                            DiagnosticKind::ObsoleteFiller,
                            format!("skipping filler for {} in {}", full_id, self.sheet),
                        ))?;
                    }
                }
                SheetClass::Main | SheetClass::Fallback => {
                    self.sink.report(
                        Diagnostic::new(
                            DiagnosticKind::DuplicateId,
                            format!("{} encountered more than once (in {})", full_id, self.sheet),
                        )
                        .with_help("Each tile id may be defined by only one main-sheet entry"),
                    )?;
                }
            }
        }

        if kept.is_empty() {
            // The children are dropped with their parent.
            self.processed.rollback(checkpoint);
            return Ok(None);
        }

        Ok(Some(TileEntry {
            id: TileIds::from_vec(kept),
            fg,
            bg,
            rotates,
            multitile,
            additional_tiles: children,
            extra,
        }))
    }

    fn rewrite_layer(&mut self, layer: Layer<SpriteRef>, tile: &str) -> Result<Option<Layer<u64>>> {
        let mut items = Vec::new();

        for item in layer.into_items() {
            match item {
                LayerItem::Sprite(sprite) => {
                    if let Some(index) = self.resolve(&sprite, tile)? {
                        items.push(LayerItem::Sprite(index));
                    }
                }
                LayerItem::Weighted(WeightedVariant { weight, sprite }) => {
                    let sprite = match sprite {
                        SpriteSet::One(s) => self.resolve(&s, tile)?.map(SpriteSet::One),
                        SpriteSet::Many(list) => {
                            let mut resolved = Vec::with_capacity(list.len());
                            for s in &list {
                                if let Some(index) = self.resolve(s, tile)? {
                                    resolved.push(index);
                                }
                            }
                            (!resolved.is_empty()).then_some(SpriteSet::Many(resolved))
                        }
                    };
                    if let Some(sprite) = sprite {
                        items.push(LayerItem::Weighted(WeightedVariant { weight, sprite }));
                    }
                }
            }
        }

        Ok(Layer::from_items(items))
    }

    fn resolve(&mut self, sprite: &SpriteRef, tile: &str) -> Result<Option<u64>> {
        if sprite.is_blank() {
            return Ok(None);
        }

        match sprite {
            SpriteRef::Index(index) => {
                if !self.registry.is_allocated(*index) {
                    self.sink.report(
                        Diagnostic::new(
                            DiagnosticKind::MissingSprite,
                            format!(
                                "sprite index {} in tile '{}' ({}) is outside every sheet",
                                index, tile, self.sheet
                            ),
                        )
                        .with_help("The reference is left out of the output"),
                    )?;
                    return Ok(None);
                }
                self.registry.mark_referenced_index(*index);
                Ok(Some(*index))
            }
            SpriteRef::Name(name) => {
                let index = self.registry.resolve(name);
                if index == crate::registry::NULL_INDEX {
                    self.sink.report(
                        Diagnostic::new(
                            DiagnosticKind::MissingSprite,
                            format!(
                                "sprite id '{}' in tile '{}' ({}) has no matching PNG file",
                                name, tile, self.sheet
                            ),
                        )
                        .with_help("The reference is left out of the output"),
                    )?;
                    return Ok(None);
                }
                self.registry.mark_referenced(name);
                Ok(Some(index))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::parse_fragment;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::path::Path;

    struct Fixture {
        registry: SpriteRegistry,
        processed: ProcessedIds,
        sink: DiagnosticSink,
    }

    impl Fixture {
        fn with_sprites(names: &[&str]) -> Self {
            let mut registry = SpriteRegistry::new();
            for name in names {
                registry.register(name, SheetClass::Main);
            }
            Self {
                registry,
                processed: ProcessedIds::new(),
                sink: DiagnosticSink::new(),
            }
        }

        fn rewrite_as(&mut self, class: SheetClass, json: &str) -> Vec<Value> {
            let entries = parse_fragment(json, Path::new("test.json")).unwrap();
            let mut rewriter = TileEntryRewriter::new(
                &mut self.registry,
                &mut self.processed,
                &mut self.sink,
                class,
                "tiles.png",
            );
            entries
                .into_iter()
                .filter_map(|e| rewriter.rewrite(e).unwrap())
                .map(|e| serde_json::to_value(e).unwrap())
                .collect()
        }

        fn rewrite(&mut self, json: &str) -> Vec<Value> {
            self.rewrite_as(SheetClass::Main, json)
        }
    }

    #[test]
    fn test_bare_names() {
        let mut fx = Fixture::with_sprites(&["p", "q"]);
        let out = fx.rewrite(r#"[{ "id": "x", "fg": "p" }, { "id": "y", "fg": "q", "bg": "p" }]"#);
        assert_eq!(
            out,
            vec![json!({ "id": "x", "fg": 1 }), json!({ "id": "y", "fg": 2, "bg": 1 })]
        );
        assert!(fx.registry.unreferenced(SheetClass::Main).is_empty());
        assert_eq!(fx.sink.watermark(), None);
    }

    #[test]
    fn test_rotation_list() {
        let mut fx = Fixture::with_sprites(&["n", "e", "s", "w"]);
        let out = fx.rewrite(r#"{ "id": "t", "fg": ["n", "e", "s", "w"], "rotates": true }"#);
        assert_eq!(out, vec![json!({ "id": "t", "fg": [1, 2, 3, 4], "rotates": true })]);
    }

    #[test]
    fn test_single_item_list_collapses() {
        let mut fx = Fixture::with_sprites(&["p"]);
        let out = fx.rewrite(r#"{ "id": "t", "fg": ["p", "missing"] }"#);
        assert_eq!(out, vec![json!({ "id": "t", "fg": 1 })]);
        assert_eq!(fx.sink.count_kind(DiagnosticKind::MissingSprite), 1);
    }

    #[test]
    fn test_weighted_variants() {
        let mut fx = Fixture::with_sprites(&["g1", "g2a", "g2b"]);
        let out = fx.rewrite(
            r#"{ "id": "gravel", "fg": [ { "weight": 3, "sprite": "g1" },
                                         { "weight": 1, "sprite": ["g2a", "g2b"] } ] }"#,
        );
        assert_eq!(
            out,
            vec![json!({
                "id": "gravel",
                "fg": [ { "weight": 3, "sprite": 1 }, { "weight": 1, "sprite": [2, 3] } ]
            })]
        );
    }

    #[test]
    fn test_weighted_variant_without_sprites_dropped() {
        let mut fx = Fixture::with_sprites(&["g1", "g2"]);
        let out = fx.rewrite(
            r#"{ "id": "gravel", "fg": [ { "weight": 3, "sprite": "g1" },
                                         { "weight": 2, "sprite": "nope" },
                                         { "weight": 1, "sprite": "g2" } ] }"#,
        );
        assert_eq!(
            out,
            vec![json!({
                "id": "gravel",
                "fg": [ { "weight": 3, "sprite": 1 }, { "weight": 1, "sprite": 2 } ]
            })]
        );
    }

    #[test]
    fn test_missing_sprite_drops_entry() {
        let mut fx = Fixture::with_sprites(&[]);
        let out = fx.rewrite(r#"{ "id": "z", "fg": "missing" }"#);
        assert!(out.is_empty());
        assert_eq!(fx.sink.count_kind(DiagnosticKind::MissingSprite), 1);
        assert!(fx.sink.has_errors());
        assert!(!fx.processed.contains("z"));
    }

    #[test]
    fn test_empty_entry_skipped() {
        let mut fx = Fixture::with_sprites(&["p"]);
        let out = fx.rewrite(r#"[{ "id": "nothing" }, { "fg": "p" }, { "id": [], "fg": "p" }]"#);
        assert!(out.is_empty());
        assert_eq!(fx.sink.count_kind(DiagnosticKind::SkipEmptyEntry), 3);
        assert!(!fx.sink.has_errors());
    }

    #[test]
    fn test_no_entry_is_not_missing() {
        let mut fx = Fixture::with_sprites(&["p"]);
        let out = fx.rewrite(r#"{ "id": "t", "fg": "p", "bg": "no_entry" }"#);
        assert_eq!(out, vec![json!({ "id": "t", "fg": 1 })]);
        assert_eq!(fx.sink.watermark(), None);
    }

    #[test]
    fn test_additional_tiles_prefixed() {
        let mut fx = Fixture::with_sprites(&["w", "wc"]);
        let out = fx.rewrite(
            r#"{ "id": "wall", "fg": "w", "multitile": true,
                 "additional_tiles": [ { "id": "center", "fg": "wc" } ] }"#,
        );
        assert_eq!(
            out,
            vec![json!({
                "id": "wall", "fg": 1, "multitile": true,
                "additional_tiles": [ { "id": "center", "fg": 2 } ]
            })]
        );
        assert!(fx.processed.contains("wall"));
        assert!(fx.processed.contains("wall_center"));
        assert!(!fx.processed.contains("center"));
    }

    #[test]
    fn test_same_child_id_under_different_parents() {
        let mut fx = Fixture::with_sprites(&["a", "b", "c"]);
        let out = fx.rewrite(
            r#"[{ "id": "wall", "fg": "a", "additional_tiles": [ { "id": "center", "fg": "c" } ] },
                { "id": "fence", "fg": "b", "additional_tiles": [ { "id": "center", "fg": "c" } ] }]"#,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(fx.sink.count_kind(DiagnosticKind::DuplicateId), 0);
    }

    #[test]
    fn test_main_duplicate_id_is_error() {
        let mut fx = Fixture::with_sprites(&["p", "q"]);
        let out = fx.rewrite(r#"[{ "id": "x", "fg": "p" }, { "id": "x", "fg": "q" }]"#);
        assert_eq!(out, vec![json!({ "id": "x", "fg": 1 })]);
        assert_eq!(fx.sink.count_kind(DiagnosticKind::DuplicateId), 1);
        assert!(fx.sink.has_errors());
    }

    #[test]
    fn test_partial_duplicate_keeps_new_ids() {
        let mut fx = Fixture::with_sprites(&["p", "q"]);
        let out = fx.rewrite(r#"[{ "id": "a", "fg": "p" }, { "id": ["a", "b"], "fg": "q" }]"#);
        assert_eq!(
            out,
            vec![json!({ "id": "a", "fg": 1 }), json!({ "id": "b", "fg": 2 })]
        );
    }

    #[test]
    fn test_filler_duplicate_is_silent() {
        let mut fx = Fixture::with_sprites(&["p"]);
        fx.rewrite(r#"{ "id": "x", "fg": "p" }"#);
        let out = fx.rewrite_as(SheetClass::Filler, r#"{ "id": "x", "fg": "p" }"#);
        assert!(out.is_empty());
        assert_eq!(fx.sink.watermark(), None);
    }

    #[test]
    fn test_filler_duplicate_reported_when_enabled() {
        let mut fx = Fixture::with_sprites(&["p"]);
        fx.rewrite(r#"{ "id": "x", "fg": "p" }"#);

        let entries = parse_fragment(r#"{ "id": "x", "fg": "p" }"#, Path::new("f.json")).unwrap();
        let mut rewriter = TileEntryRewriter::new(
            &mut fx.registry,
            &mut fx.processed,
            &mut fx.sink,
            SheetClass::Filler,
            "filler.png",
        )
        .report_obsolete(true);
        for entry in entries {
            assert!(rewriter.rewrite(entry).unwrap().is_none());
        }
        assert_eq!(fx.sink.count_kind(DiagnosticKind::ObsoleteFiller), 1);
        assert!(!fx.sink.has_errors());
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut fx = Fixture::with_sprites(&["w", "wc", "g1", "g2"]);
        let first = fx.rewrite(
            r#"{ "id": "wall", "fg": [ { "weight": 2, "sprite": ["g1", "g2"] }, { "weight": 1, "sprite": "w" } ],
                 "bg": "wc", "additional_tiles": [ { "id": "center", "fg": "wc" } ] }"#,
        );

        let mut again = Fixture::with_sprites(&["w", "wc", "g1", "g2"]);
        let second = again.rewrite(&serde_json::to_string(&first).unwrap());
        assert_eq!(first, second);
        assert!(again.registry.unreferenced(SheetClass::Main).is_empty());
    }

    #[test]
    fn test_extra_keys_survive_rewrite() {
        let mut fx = Fixture::with_sprites(&["fire"]);
        let out = fx.rewrite(r#"{ "id": "fd_fire", "fg": "fire", "animated": true }"#);
        assert_eq!(out, vec![json!({ "id": "fd_fire", "fg": 1, "animated": true })]);
    }

    #[test]
    fn test_unknown_index_is_missing() {
        let mut fx = Fixture::with_sprites(&["p"]);
        let out = fx.rewrite(r#"[{ "id": "x", "fg": 999 }, { "id": "y", "fg": [1, 999] }]"#);
        assert_eq!(out, vec![json!({ "id": "y", "fg": 1 })]);
        assert_eq!(fx.sink.count_kind(DiagnosticKind::MissingSprite), 2);
        assert!(!fx.processed.contains("x"));
    }

    #[test]
    fn test_reserved_padding_index_is_accepted() {
        let mut fx = Fixture::with_sprites(&["p"]);
        fx.registry.reserve_through(4);
        let out = fx.rewrite(r#"{ "id": "pad", "fg": 4 }"#);
        assert_eq!(out, vec![json!({ "id": "pad", "fg": 4 })]);
        assert_eq!(fx.sink.watermark(), None);
    }

    #[test]
    fn test_dropped_parent_releases_child_ids() {
        let mut fx = Fixture::with_sprites(&["p"]);
        fx.rewrite(r#"{ "id": "x", "fg": "p" }"#);
        let out = fx.rewrite_as(
            SheetClass::Filler,
            r#"{ "id": "x", "fg": "p", "additional_tiles": [ { "id": "c", "fg": "p" } ] }"#,
        );
        assert!(out.is_empty());
        assert!(!fx.processed.contains("x_c"));

        // A later main entry may still define the child id.
        let out = fx.rewrite(r#"{ "id": "x_c", "fg": "p" }"#);
        assert_eq!(out, vec![json!({ "id": "x_c", "fg": 1 })]);
        assert_eq!(fx.sink.count_kind(DiagnosticKind::DuplicateId), 0);
    }

    #[test]
    fn test_processed_rollback() {
        let mut processed = ProcessedIds::new();
        processed.insert("a");
        let checkpoint = processed.checkpoint();
        assert!(processed.insert("b"));
        assert!(!processed.insert("a"));
        processed.rollback(checkpoint);
        assert!(processed.contains("a"));
        assert!(!processed.contains("b"));
        assert!(processed.insert("b"));
    }

    #[test]
    fn test_fail_fast_propagates() {
        let mut fx = Fixture::with_sprites(&[]);
        fx.sink = DiagnosticSink::fail_fast();
        let entries = parse_fragment(r#"{ "id": "z", "fg": "missing" }"#, Path::new("t.json")).unwrap();
        let mut rewriter = TileEntryRewriter::new(
            &mut fx.registry,
            &mut fx.processed,
            &mut fx.sink,
            SheetClass::Main,
            "tiles.png",
        );
        let result = rewriter.rewrite(entries.into_iter().next().unwrap());
        assert!(result.is_err());
    }
}
