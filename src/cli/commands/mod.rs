//! CLI command implementations

pub mod cleanup;
pub mod run;

pub use cleanup::execute as cleanup;
pub use run::execute as run;
