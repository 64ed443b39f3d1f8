//! Per-entry metadata record
//!
//! A single line `<final_path>,<mime type>`. The MIME type never contains a
//! comma, so the line is split on the last one.

use crate::cache::content_type::ContentType;
use crate::error::{KamajiError, KamajiResult};
use std::path::Path;

/// Parsed metadata record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Path the dependency is addressed by at use time
    pub final_path: String,

    /// Detected type of the raw blob
    pub content_type: ContentType,
}

impl Metadata {
    pub fn new(final_path: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            final_path: final_path.into(),
            content_type,
        }
    }

    /// Render the on-disk line
    pub fn render(&self) -> String {
        format!("{},{}", self.final_path, self.content_type.mime())
    }

    /// Parse an on-disk line
    pub fn parse(line: &str) -> Option<Self> {
        let (final_path, mime) = line.trim_end_matches(['\r', '\n']).rsplit_once(',')?;
        if final_path.is_empty() || mime.is_empty() {
            return None;
        }
        Some(Self::new(final_path, ContentType::from_mime(mime)))
    }

    /// Read and parse a metadata file
    pub fn read(path: &Path) -> KamajiResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KamajiError::io(format!("reading metadata {}", path.display()), e))?;
        Self::parse(&content).ok_or_else(|| KamajiError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: format!("malformed metadata record '{}'", content.trim()),
        })
    }

    /// Write the metadata file
    pub fn write(&self, path: &Path) -> KamajiResult<()> {
        std::fs::write(path, self.render())
            .map_err(|e| KamajiError::io(format!("writing metadata {}", path.display()), e))
    }
}
