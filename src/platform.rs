//! Platform identification
//!
//! Third-party descriptors key their URLs and digests by a `<os>_<arch>`
//! identifier such as `darwin_arm64` or `linux_amd64`.

use std::fmt;

/// Operating system / architecture pair a dependency is downloaded for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Create a platform from explicit identifiers
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detect the platform this binary was compiled for
    pub fn current() -> Self {
        Self::from_rust_consts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust's `std::env::consts` names to the identifiers used in manifests
    pub fn from_rust_consts(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => "darwin",
            other => other,
        };
        let arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self::new(os, arch)
    }

    /// Manifest key, e.g. `darwin_arm64`
    pub fn key(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
