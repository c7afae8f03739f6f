//! Versioned snapshot handling for category directories.

pub mod committer;

pub use committer::commit_category;
