//! `tileset.txt` parsing.
//!
//! A plain `KEY: VALUE` file; `#` comments and blank lines are ignored.
//! The `JSON` key names the output configuration file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ComposeError, Result};

/// Key holding the output JSON file name.
pub const JSON_KEY: &str = "JSON";

/// Parsed `tileset.txt` contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TilesetTxt {
    entries: BTreeMap<String, String>,
}

impl TilesetTxt {
    /// Parse `KEY: VALUE` lines. Lines without a colon are ignored.
    pub fn parse(content: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                entries.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self { entries }
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    /// The output JSON file name, if present and non-empty.
    pub fn json_name(&self) -> Option<&str> {
        self.get(JSON_KEY).filter(|v| !v.is_empty())
    }
}

/// Find the output JSON name, searching each directory's `tileset.txt` in
/// order. The first file that defines `JSON` wins.
pub fn find_output_name(dirs: &[&Path]) -> Result<String> {
    let mut searched: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        let path = dir.join(super::TILESET_TXT_FILENAME);
        if searched.contains(&path) {
            continue;
        }
        if path.is_file() {
            let content = std::fs::read_to_string(&path).map_err(|e| ComposeError::Io {
                path: path.clone(),
                message: format!("Failed to read tileset.txt: {}", e),
            })?;
            if let Some(name) = TilesetTxt::parse(&content).json_name() {
                return Ok(name.to_string());
            }
        }
        searched.push(path);
    }

    Err(ComposeError::MissingOutputName {
        searched: searched
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_key_values() {
        let txt = TilesetTxt::parse(
            "# comment\nNAME: UltimateCataclysm\n\nVIEW: Ultica\nJSON: tile_config.json\nTILESET: tiles.png\n",
        );
        assert_eq!(txt.get("NAME"), Some("UltimateCataclysm"));
        assert_eq!(txt.json_name(), Some("tile_config.json"));
        assert_eq!(txt.get("TILESET"), Some("tiles.png"));
        assert_eq!(txt.get("# comment"), None);
    }

    #[test]
    fn test_parse_value_with_colon() {
        let txt = TilesetTxt::parse("JSON: out:config.json");
        assert_eq!(txt.json_name(), Some("out:config.json"));
    }

    #[test]
    fn test_empty_json_value() {
        let txt = TilesetTxt::parse("JSON:   ");
        assert_eq!(txt.json_name(), None);
    }

    #[test]
    fn test_find_output_name_source_first() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::write(src.path().join("tileset.txt"), "JSON: from_source.json").unwrap();
        fs::write(out.path().join("tileset.txt"), "JSON: from_output.json").unwrap();

        let name = find_output_name(&[src.path(), out.path()]).unwrap();
        assert_eq!(name, "from_source.json");
    }

    #[test]
    fn test_find_output_name_falls_back_to_output() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::write(src.path().join("tileset.txt"), "NAME: x").unwrap();
        fs::write(out.path().join("tileset.txt"), "JSON: tile_config.json").unwrap();

        let name = find_output_name(&[src.path(), out.path()]).unwrap();
        assert_eq!(name, "tile_config.json");
    }

    #[test]
    fn test_find_output_name_missing() {
        let src = tempdir().unwrap();
        let err = find_output_name(&[src.path()]).unwrap_err();
        assert!(matches!(err, ComposeError::MissingOutputName { .. }));
    }
}
