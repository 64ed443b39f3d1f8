//! Content type detection by magic bytes
//!
//! Only the formats the archive normalizer knows how to handle are
//! recognized; everything else is `application/octet-stream`.

use crate::error::{KamajiError, KamajiResult};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes inspected when sniffing
pub const SNIFF_LEN: usize = 261;

const MACH_O_MAGICS: [[u8; 4]; 5] = [
    [0xfe, 0xed, 0xfa, 0xce], // 32-bit
    [0xfe, 0xed, 0xfa, 0xcf], // 64-bit
    [0xce, 0xfa, 0xed, 0xfe], // 32-bit, little endian
    [0xcf, 0xfa, 0xed, 0xfe], // 64-bit, little endian
    [0xca, 0xfe, 0xba, 0xbe], // universal
];

/// Detected type of a cached blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    /// `application/zip`
    Zip,
    /// `application/gzip` (expected to wrap a tar stream)
    Gzip,
    /// `application/x-mach-binary`
    MachBinary,
    /// `application/x-executable` (ELF)
    Executable,
    /// Anything else, keeping the recorded MIME string
    Other(String),
}

impl ContentType {
    /// MIME string recorded in the metadata file
    pub fn mime(&self) -> &str {
        match self {
            Self::Zip => "application/zip",
            Self::Gzip => "application/gzip",
            Self::MachBinary => "application/x-mach-binary",
            Self::Executable => "application/x-executable",
            Self::Other(mime) => mime,
        }
    }

    /// Parse a recorded MIME string
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim() {
            "application/zip" => Self::Zip,
            "application/gzip" => Self::Gzip,
            "application/x-mach-binary" => Self::MachBinary,
            "application/x-executable" => Self::Executable,
            other => Self::Other(other.to_string()),
        }
    }

    /// Classify a blob by its leading bytes
    pub fn sniff(head: &[u8]) -> Self {
        if head.starts_with(b"PK\x03\x04") {
            Self::Zip
        } else if head.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if head.starts_with(b"\x7fELF") {
            Self::Executable
        } else if head.len() >= 4 && MACH_O_MAGICS.iter().any(|m| head[..4] == m[..]) {
            Self::MachBinary
        } else {
            Self::Other("application/octet-stream".to_string())
        }
    }

    /// Read the first [`SNIFF_LEN`] bytes of `path` and classify them
    pub fn sniff_file(path: &Path) -> KamajiResult<Self> {
        let file = File::open(path)
            .map_err(|e| KamajiError::io(format!("opening {}", path.display()), e))?;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        file.take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .map_err(|e| KamajiError::io(format!("reading {}", path.display()), e))?;
        Ok(Self::sniff(&head))
    }

    /// Whether this type is a container that is extracted eagerly on download
    pub fn is_eager(&self) -> bool {
        matches!(self, Self::Zip)
    }

    /// Mach-O or ELF, copied rather than unpacked
    pub fn is_raw_executable(&self) -> bool {
        matches!(self, Self::MachBinary | Self::Executable)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime())
    }
}
