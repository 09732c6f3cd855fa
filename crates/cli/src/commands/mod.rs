//! Command handlers for the campus CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod build;
pub mod inspect;
pub mod query;
pub mod stats;

// Re-export command types for convenience
pub use build::BuildCommand;
pub use inspect::{ChunksCommand, SectionsCommand};
pub use query::{ContextCommand, QueryCommand};
pub use stats::{DeleteCommand, ListCommand, StatsCommand};
