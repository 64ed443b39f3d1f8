//! SHA-256 hashing of cached blobs

use crate::error::{KamajiError, KamajiResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Hash a file's contents, returning the lowercase hex digest
pub fn sha256_file(path: &Path) -> KamajiResult<String> {
    let mut file = File::open(path)
        .map_err(|e| KamajiError::io(format!("opening {}", path.display()), e))?;
    sha256_reader(&mut file)
        .map_err(|e| KamajiError::io(format!("hashing {}", path.display()), e))
}

/// Hash everything `reader` yields
pub fn sha256_reader(reader: &mut impl Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compare two hex digests ignoring case and surrounding whitespace
pub fn digests_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
