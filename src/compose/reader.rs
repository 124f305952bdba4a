//! Reading one sheet directory: sprites into the registry, fragments into a
//! list of raw tile entries.

use std::path::Path;

use image::RgbaImage;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::discovery::{scan_sheet_dir, SheetFile, SheetSpec};
use crate::error::Result;
use crate::output::{display_path, Printer};
use crate::registry::{Registration, SpriteRegistry};
use crate::render::ImageBackend;
use crate::tiles::{load_fragment, InputEntry};

/// Everything read from one sheet directory.
#[derive(Debug)]
pub struct SheetContents {
    /// Index the sheet's first sprite received (or would have received).
    pub first_index: u64,
    /// Newly registered sprites, in index order.
    pub sprites: Vec<RgbaImage>,
    /// Raw tile entries, in discovery order.
    pub entries: Vec<InputEntry>,
}

/// Reads sheet directories through an image backend.
pub struct SheetReader<'a> {
    backend: &'a dyn ImageBackend,
    printer: Printer,
    report_obsolete: bool,
}

impl<'a> SheetReader<'a> {
    pub fn new(backend: &'a dyn ImageBackend, printer: Printer) -> Self {
        Self {
            backend,
            printer,
            report_obsolete: false,
        }
    }

    /// Report filler sprites shadowed by an earlier sprite.
    pub fn report_obsolete(mut self, enabled: bool) -> Self {
        self.report_obsolete = enabled;
        self
    }

    /// Traverse `dir` for `sheet`, registering its sprites.
    pub fn read(
        &self,
        sheet: &SheetSpec,
        dir: &Path,
        registry: &mut SpriteRegistry,
        sink: &mut DiagnosticSink,
    ) -> Result<SheetContents> {
        let files = scan_sheet_dir(dir, &sheet.exclude)?;
        let mut contents = SheetContents {
            first_index: registry.next_index(),
            sprites: Vec::new(),
            entries: Vec::new(),
        };

        for file in files {
            match file {
                SheetFile::Sprite(path) => {
                    if let Some(sprite) = self.read_sprite(sheet, &path, registry, sink)? {
                        contents.sprites.push(sprite);
                    }
                }
                SheetFile::Fragment(path) => {
                    self.printer.detail("Reading", &display_path(&path));
                    let entries = load_fragment(&path)?;
                    tracing::trace!(path = %path.display(), count = entries.len(), "fragment");
                    contents.entries.extend(entries);
                }
            }
        }

        tracing::debug!(
            sheet = %sheet.name,
            sprites = contents.sprites.len(),
            entries = contents.entries.len(),
            "read sheet"
        );
        Ok(contents)
    }

    fn read_sprite(
        &self,
        sheet: &SheetSpec,
        path: &Path,
        registry: &mut SpriteRegistry,
        sink: &mut DiagnosticSink,
    ) -> Result<Option<RgbaImage>> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match registry.register(&name, sheet.class) {
            Registration::Added(index) => {
                self.printer
                    .detail("Reading", &format!("{} {}", display_path(path), index));
            }
            Registration::Duplicate(existing) => {
                sink.report(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateSpriteName,
                        format!(
                            "{} duplicates sprite '{}' (index {}) in {}",
                            display_path(path),
                            name,
                            existing,
                            sheet.name
                        ),
                    )
                    .with_help("Sprite file names must be unique across all main sheets"),
                )?;
                return Ok(None);
            }
            Registration::Shadowed(existing) => {
                if self.report_obsolete {
                    sink.report_kind(
                        DiagnosticKind::ObsoleteFiller,
                        format!(
                            "filler sprite {} is shadowed by index {}",
                            display_path(path),
                            existing
                        ),
                    )?;
                }
                return Ok(None);
            }
            Registration::Skipped => {
                tracing::debug!(path = %path.display(), "skipping reserved sprite name");
                return Ok(None);
            }
        }

        let decoded = self.backend.decode(path)?;
        if !decoded.had_alpha {
            tracing::debug!(path = %path.display(), "added alpha channel");
        }
        if decoded.converted {
            tracing::debug!(path = %path.display(), "converted to sRGB from embedded ICC profile");
        }

        let (w, h) = decoded.image.dimensions();
        if (w, h) != (sheet.sprite_width, sheet.sprite_height) {
            sink.report(
                Diagnostic::new(
                    DiagnosticKind::WrongSpriteDimensions,
                    format!(
                        "{} is {}x{}, sheet sprites are {}x{}",
                        display_path(path),
                        w,
                        h,
                        sheet.sprite_width,
                        sheet.sprite_height
                    ),
                )
                .with_help(format!(
                    "All sprites in {} should have the same dimensions",
                    sheet.dir_name()
                )),
            )?;
        }

        Ok(Some(decoded.image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Manifest;
    use crate::render::MemoryBackend;
    use std::fs;
    use tempfile::tempdir;

    fn sheets() -> Manifest {
        Manifest::parse(
            r#"[ { "width": 4, "height": 4 },
                 { "tiles.png": { "exclude": ["old"] } },
                 { "filler.png": { "filler": true } } ]"#,
            Path::new("tile_info.json"),
        )
        .unwrap()
    }

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_read_registers_in_sorted_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b/q.png"), "");
        touch(&root.join("a/p.png"), "");
        touch(&root.join("a/p.json"), r#"{ "id": "x", "fg": "p" }"#);
        touch(&root.join("b/q.json"), r#"[{ "id": "y", "fg": "q" }, { "id": "z", "fg": "q" }]"#);
        touch(&root.join("old/r.png"), "");
        touch(&root.join("no_entry.png"), "");

        let manifest = sheets();
        let backend = MemoryBackend::new(4, 4);
        let mut registry = SpriteRegistry::new();
        let mut sink = DiagnosticSink::new();
        let contents = SheetReader::new(&backend, Printer::with_feedback(Default::default()))
            .read(&manifest.sheets[0], root, &mut registry, &mut sink)
            .unwrap();

        assert_eq!(contents.first_index, 1);
        assert_eq!(contents.sprites.len(), 2);
        assert_eq!(contents.entries.len(), 3);
        assert_eq!(registry.resolve("p"), 1);
        assert_eq!(registry.resolve("q"), 2);
        assert_eq!(registry.resolve("r"), 0);
        assert_eq!(registry.resolve("no_entry"), 0);
        assert_eq!(sink.watermark(), None);
    }

    #[test]
    fn test_wrong_dimensions_still_registered() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("big.png"), "");

        let manifest = sheets();
        let backend = MemoryBackend::new(8, 8);
        let mut registry = SpriteRegistry::new();
        let mut sink = DiagnosticSink::new();
        let contents = SheetReader::new(&backend, Printer::new())
            .read(&manifest.sheets[0], dir.path(), &mut registry, &mut sink)
            .unwrap();

        assert_eq!(contents.sprites.len(), 1);
        assert_eq!(registry.resolve("big"), 1);
        assert_eq!(sink.count_kind(DiagnosticKind::WrongSpriteDimensions), 1);
        assert!(sink.has_errors());
    }

    #[test]
    fn test_duplicates_and_shadowed_fillers() {
        let main_dir = tempdir().unwrap();
        let filler_dir = tempdir().unwrap();
        touch(&main_dir.path().join("a/p.png"), "");
        touch(&main_dir.path().join("b/p.png"), "");
        touch(&filler_dir.path().join("p.png"), "");
        touch(&filler_dir.path().join("f.png"), "");

        let manifest = sheets();
        let backend = MemoryBackend::new(4, 4);
        let mut registry = SpriteRegistry::new();
        let mut sink = DiagnosticSink::new();
        let reader = SheetReader::new(&backend, Printer::new()).report_obsolete(true);

        let main = reader
            .read(&manifest.sheets[0], main_dir.path(), &mut registry, &mut sink)
            .unwrap();
        assert_eq!(main.sprites.len(), 1);
        assert_eq!(sink.count_kind(DiagnosticKind::DuplicateSpriteName), 1);

        registry.reserve_through(16);
        let filler = reader
            .read(&manifest.sheets[1], filler_dir.path(), &mut registry, &mut sink)
            .unwrap();
        assert_eq!(filler.first_index, 17);
        assert_eq!(filler.sprites.len(), 1);
        assert_eq!(registry.resolve("f"), 17);
        assert_eq!(registry.resolve("p"), 1);
        assert_eq!(sink.count_kind(DiagnosticKind::ObsoleteFiller), 1);
    }

    #[test]
    fn test_bad_fragment_is_fatal() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("broken.json"), "{ not json");

        let manifest = sheets();
        let backend = MemoryBackend::new(4, 4);
        let mut registry = SpriteRegistry::new();
        let mut sink = DiagnosticSink::new();
        let err = SheetReader::new(&backend, Printer::new())
            .read(&manifest.sheets[0], dir.path(), &mut registry, &mut sink)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ComposeError::FragmentParseFailed { .. }
        ));
    }
}
