//! Content-addressed download cache
//!
//! Each third-party artifact is stored under a directory named by its
//! expected SHA-256 digest:
//!
//! ```text
//! <cache_root>/<digest>/
//!     file        raw downloaded blob
//!     metadata    "<final_path>,<mime type>"
//!     __TMP__/    normalized output, rebuilt once per invocation
//! ```
//!
//! # Integrity
//!
//! - The blob is rehashed on every cache hit; a mismatch is reported as
//!   corruption and never re-downloaded silently.
//! - Downloads are hashed while streaming and only renamed into place when
//!   the digest matches.
//! - There is no locking. Two processes downloading the same digest for the
//!   first time race on the same paths; content addressing makes the
//!   results identical.

pub mod content_type;
pub mod digest;
pub mod fetch;
pub mod metadata;
pub mod store;

pub use content_type::ContentType;
pub use digest::sha256_file;
pub use fetch::{Fetcher, HttpFetcher};
pub use metadata::Metadata;
pub use store::{CacheEntry, CacheStore};
