//! Compressed namespace manifests.
//!
//! A manifest is a gzip stream of newline-terminated records, sorted and
//! unique. Records are opaque: merges take unions of whole lines and never
//! edit a line.

use std::collections::BTreeSet;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::GzBuilder;
use flate2::read::MultiGzDecoder;

use crate::error::Result;

/// A sorted, deduplicated set of namespace records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceSet(BTreeSet<String>);

impl NamespaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a manifest from gzip bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut text = String::new();
        MultiGzDecoder::new(bytes).read_to_string(&mut text)?;
        Ok(text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Encode as gzip bytes.
    ///
    /// The gzip header carries no file name or timestamp, so equal sets
    /// always produce equal bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut encoder = GzBuilder::new()
            .mtime(0)
            .write(Vec::new(), Compression::default());
        for record in &self.0 {
            encoder.write_all(record.as_bytes())?;
            encoder.write_all(b"\n")?;
        }
        Ok(encoder.finish()?)
    }

    /// Read a manifest file.
    pub fn read(path: &Path) -> Result<Self> {
        Self::decode(&fs::read(path)?)
    }

    /// Read a manifest file, treating a missing file as empty.
    pub fn read_or_empty(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::read(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write the manifest file.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.encode()?)?;
        Ok(())
    }

    /// Add every record of `other`.
    pub fn extend(&mut self, other: NamespaceSet) {
        self.0.extend(other.0);
    }

    pub fn insert(&mut self, record: impl Into<String>) -> bool {
        self.0.insert(record.into())
    }

    pub fn contains(&self, record: &str) -> bool {
        self.0.contains(record)
    }

    /// Records in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for NamespaceSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_sorted_and_unique() {
        let set: NamespaceSet = ["b", "a", "b", "c"].into_iter().collect();
        let decoded = NamespaceSet::decode(&set.encode().unwrap()).unwrap();

        assert_eq!(decoded.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let first: NamespaceSet = ["x", "y"].into_iter().collect();
        let second: NamespaceSet = ["y", "x"].into_iter().collect();

        assert_eq!(first.encode().unwrap(), second.encode().unwrap());
    }

    #[test]
    fn test_decode_ignores_blank_lines() {
        // Same shape as `echo | gzip`: a single empty line.
        let mut encoder = GzBuilder::new().write(Vec::new(), Compression::default());
        encoder.write_all(b"\n").unwrap();
        let bytes = encoder.finish().unwrap();

        assert!(NamespaceSet::decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_read_or_empty_missing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let set = NamespaceSet::read_or_empty(&temp.path().join("missing.gz")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_write_and_read_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("ijavascript.edn.gz");

        let set: NamespaceSet = ["{:provides [\"app.core\"]}"].into_iter().collect();
        set.write(&path).unwrap();

        assert_eq!(NamespaceSet::read(&path).unwrap(), set);
    }
}
