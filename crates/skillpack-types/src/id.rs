//! Stable, path-like identifiers for skill units and their sub-documents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between a skill identifier and a sub-document name
pub const SUB_DOCUMENT_SEPARATOR: char = '#';

/// Identifier parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Skill identifier is empty or has a malformed segment
    #[error("Invalid skill identifier '{id}': {reason}")]
    InvalidSkillId {
        /// Offending identifier
        id: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Sub-document part of a document identifier is malformed
    #[error("Invalid document identifier '{id}': {reason}")]
    InvalidDocId {
        /// Offending identifier
        id: String,
        /// Why it was rejected
        reason: &'static str,
    },
}

/// Identifier of a skill unit, e.g. `react/animation`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SkillId(String);

impl SkillId {
    /// Parse and validate a skill identifier
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        validate_path(&id).map_err(|reason| IdError::InvalidSkillId {
            id: id.clone(),
            reason,
        })?;
        Ok(Self(id))
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used as a fallback display name
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SkillId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SkillId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SkillId> for String {
    fn from(id: SkillId) -> Self {
        id.0
    }
}

/// Identifier of a deliverable document: a skill's core body or one of its
/// sub-documents (`react/animation#examples/fade-in`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocId {
    skill: SkillId,
    sub: Option<String>,
}

impl DocId {
    /// Identifier of a skill's core body
    pub fn core(skill: SkillId) -> Self {
        Self { skill, sub: None }
    }

    /// Identifier of a named sub-document
    pub fn sub_document(skill: SkillId, name: impl Into<String>) -> Result<Self, IdError> {
        let name = name.into();
        validate_path(&name).map_err(|reason| IdError::InvalidDocId {
            id: format!("{skill}{SUB_DOCUMENT_SEPARATOR}{name}"),
            reason,
        })?;
        Ok(Self {
            skill,
            sub: Some(name),
        })
    }

    /// Owning skill identifier
    pub fn skill(&self) -> &SkillId {
        &self.skill
    }

    /// Sub-document name, `None` for a core body
    pub fn sub(&self) -> Option<&str> {
        self.sub.as_deref()
    }

    /// Whether this identifies a core body
    pub fn is_core(&self) -> bool {
        self.sub.is_none()
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub {
            Some(sub) => write!(f, "{}{}{}", self.skill, SUB_DOCUMENT_SEPARATOR, sub),
            None => write!(f, "{}", self.skill),
        }
    }
}

impl FromStr for DocId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(SUB_DOCUMENT_SEPARATOR) {
            Some((skill, sub)) => Self::sub_document(SkillId::new(skill)?, sub),
            None => Ok(Self::core(SkillId::new(s)?)),
        }
    }
}

impl TryFrom<String> for DocId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DocId> for String {
    fn from(id: DocId) -> Self {
        id.to_string()
    }
}

impl From<SkillId> for DocId {
    fn from(skill: SkillId) -> Self {
        Self::core(skill)
    }
}

fn validate_path(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("identifier cannot be empty");
    }
    if id.contains(SUB_DOCUMENT_SEPARATOR) {
        return Err("identifier cannot contain '#'");
    }
    if id.chars().any(char::is_whitespace) {
        return Err("identifier cannot contain whitespace");
    }
    for segment in id.split('/') {
        match segment {
            "" => return Err("identifier has an empty path segment"),
            "." | ".." => return Err("identifier cannot contain relative segments"),
            _ => {}
        }
    }
    Ok(())
}
