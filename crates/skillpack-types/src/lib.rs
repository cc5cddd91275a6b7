//! Skillpack Types - Core types shared by the skillpack crates
//!
//! This module defines the data model consumed by the index and the loader:
//! identifiers, skill units with their lazy sub-documents, cross-references,
//! load requests and the outcome of a load pass.

pub mod id;
pub mod outcome;
pub mod request;
pub mod unit;

pub use id::{DocId, IdError, SkillId};
pub use outcome::{ContentBlock, ExpandableDoc, LoadOutcome, LoadStatus, LoadWarning};
pub use request::LoadRequest;
pub use unit::{estimate_tokens, ContentHandle, CrossReference, SkillUnit, SubDocument};

/// Approximate number of UTF-8 bytes per budget unit (token)
pub const BYTES_PER_TOKEN: u64 = 4;
