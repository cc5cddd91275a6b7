//! Skillpack Index
//!
//! Read-only catalog of skill units built from an on-disk corpus.
//!
//! ## Features
//!
//! - Progressive disclosure: core bodies are indexed, sub-documents stay on
//!   disk behind lazy content handles until explicitly expanded
//! - YAML frontmatter support for skill metadata (name, description, tags, references)
//! - Multiple corpus roots (personal, project, configured)
//! - Markdown relative links recorded as advisory cross-references
//! - Duplicate identifiers fail construction; dangling references are reported
//!
//! ## Corpus layout
//!
//! ```text
//! skills/
//! ├── react/
//! │   ├── SKILL.md              -> react
//! │   ├── hooks.md              -> react#hooks
//! │   └── animation/
//! │       ├── SKILL.md          -> react/animation
//! │       └── examples/fade.md  -> react/animation#examples/fade
//! └── review/SKILL.md           -> review
//! ```

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod corpus;
pub mod error;
pub mod index;

pub use corpus::{Corpus, SkillFrontmatter, SKILL_FILE};
pub use error::{IndexError, Result};
pub use index::SkillIndex;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Corpus, IndexError, SkillIndex};
}
