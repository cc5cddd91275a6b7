//! Error types for corpus discovery and index construction

use skillpack_types::SkillId;
use std::path::PathBuf;
use thiserror::Error;

/// Index construction errors
#[derive(Debug, Error)]
pub enum IndexError {
    /// Two skill units share an identifier; the corpus must be fixed
    #[error("Duplicate skill identifier '{id}' (build positions {first} and {second})")]
    DuplicateIdentifier {
        /// Identifier seen twice
        id: SkillId,
        /// Build position of the first occurrence
        first: usize,
        /// Build position of the second occurrence
        second: usize,
    },

    /// Frontmatter could not be parsed
    #[error("Invalid frontmatter in {path:?}: {reason}")]
    InvalidFrontmatter {
        /// Document path
        path: PathBuf,
        /// Failure reason
        reason: String,
    },

    /// Directory name cannot be used as a skill identifier
    #[error("Invalid skill identifier at {path:?}: {source}")]
    InvalidIdentifier {
        /// Skill directory
        path: PathBuf,
        /// Validation failure
        #[source]
        source: skillpack_types::IdError,
    },

    /// Document pattern failed to compile
    #[error("Failed to compile document pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Filesystem error while reading the corpus
    #[error("I/O error at {path:?}: {source}")]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, IndexError>;
