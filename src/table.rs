// WHY: the base converter is a capability handed to the pipeline as a plain
// function value. ScriptConverter is one way to build it: explicit
// construction and loading of OpenCC-style tables, no process-wide state.

use crate::error::{ConvertError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Opaque script conversion function
pub type BaseConvert = dyn Fn(&str) -> String + Send + Sync;

/// Base converter that returns its input unchanged
pub fn identity() -> Arc<BaseConvert> {
    Arc::new(|text: &str| text.to_string())
}

/// Forward-maximum-matching converter over a merged phrase/character table
#[derive(Debug, Clone, Default)]
pub struct ScriptConverter {
    entries: HashMap<String, String>,
    /// Longest key, in characters
    max_key_chars: usize,
}

impl ScriptConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a converter from every table in `paths`; later tables override earlier ones
    pub async fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut converter = Self::new();
        for path in paths {
            let path = path.as_ref();
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConvertError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            let added = converter
                .add_table(&text)
                .map_err(|reason| ConvertError::Table {
                    path: path.to_path_buf(),
                    reason,
                })?;
            debug!("Loaded {} entries from {}", added, path.display());
        }
        info!(
            entries = converter.len(),
            tables = paths.len(),
            "Conversion tables ready"
        );
        Ok(converter)
    }

    /// Merge one table in OpenCC text format: `key<TAB>value [alternatives...]`.
    /// Blank lines and `#` comments are skipped; the first value wins.
    pub fn add_table(&mut self, text: &str) -> std::result::Result<usize, String> {
        let mut added = 0;
        for (i, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, values) = line
                .split_once('\t')
                .ok_or_else(|| format!("line {}: expected key<TAB>value", i + 1))?;
            let value = values
                .split_whitespace()
                .next()
                .ok_or_else(|| format!("line {}: missing value for {key}", i + 1))?;
            if key.is_empty() {
                return Err(format!("line {}: empty key", i + 1));
            }
            self.insert(key, value);
            added += 1;
        }
        Ok(added)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.max_key_chars = self.max_key_chars.max(key.chars().count());
        self.entries.insert(key, value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert `text`, preferring the longest table key at each position
    pub fn convert(&self, text: &str) -> String {
        if self.entries.is_empty() {
            return text.to_string();
        }

        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let mut output = String::with_capacity(text.len());
        let mut pos = 0;
        while pos < char_count {
            let longest = self.max_key_chars.min(char_count - pos);
            let matched = (1..=longest).rev().find_map(|len| {
                let slice = &text[boundaries[pos]..boundaries[pos + len]];
                self.entries.get(slice).map(|value| (len, value))
            });
            match matched {
                Some((len, value)) => {
                    output.push_str(value);
                    pos += len;
                }
                None => {
                    output.push_str(&text[boundaries[pos]..boundaries[pos + 1]]);
                    pos += 1;
                }
            }
        }
        output
    }

    /// Hand the converter to the pipeline as a shared function value
    pub fn into_base_convert(self) -> Arc<BaseConvert> {
        let converter = Arc::new(self);
        Arc::new(move |text: &str| converter.convert(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ScriptConverter {
        let mut converter = ScriptConverter::new();
        converter
            .add_table("# characters\n简\t簡\n体\t體\n发\t發 髮\n")
            .unwrap();
        converter.add_table("头发\t頭髮\n").unwrap();
        converter
    }

    #[test]
    fn test_character_mapping() {
        assert_eq!(sample().convert("简体 ok"), "簡體 ok");
    }

    #[test]
    fn test_phrase_beats_characters() {
        let converter = sample();
        assert_eq!(converter.convert("头发"), "頭髮");
        assert_eq!(converter.convert("发"), "發");
    }

    #[test]
    fn test_empty_table_is_identity() {
        assert_eq!(ScriptConverter::new().convert("简体"), "简体");
        assert_eq!(identity()("简体"), "简体");
    }

    #[test]
    fn test_rejects_line_without_tab() {
        let mut converter = ScriptConverter::new();
        let err = converter.add_table("简 簡\n").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[tokio::test]
    async fn test_load_merges_tables() {
        let temp_dir = TempDir::new().unwrap();
        let chars = temp_dir.path().join("STCharacters.txt");
        let phrases = temp_dir.path().join("STPhrases.txt");
        tokio::fs::write(&chars, "中\t中\n文\t文\n简\t簡\n").await.unwrap();
        tokio::fs::write(&phrases, "简体中文\t簡體中文\n").await.unwrap();

        let converter = ScriptConverter::load(&[&chars, &phrases]).await.unwrap();
        assert_eq!(converter.len(), 4);
        let base = converter.into_base_convert();
        assert_eq!(base("简体中文，简"), "簡體中文，簡");
    }

    #[tokio::test]
    async fn test_load_missing_table() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");
        let result = ScriptConverter::load(&[&missing]).await;
        assert!(matches!(result, Err(ConvertError::Io { .. })));
    }
}
