//! Skill units: a mandatory core body plus lazily resolved sub-documents

use crate::{DocId, SkillId, BYTES_PER_TOKEN};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Estimate the budget cost of a text (rough approximation: 1 token ≈ 4 bytes)
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64 / BYTES_PER_TOKEN).max(1)
}

/// Where the content of a sub-document lives until it is requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentHandle {
    /// Content already held in memory
    Inline(String),
    /// Content stored in a local file, read on demand
    File(PathBuf),
}

/// Optional, separately costed detail document attached to a skill unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubDocument {
    pub name: String,
    pub handle: ContentHandle,
    pub cost: u64,
}

impl SubDocument {
    /// Sub-document held in memory; cost is estimated from the text
    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            cost: estimate_tokens(&content),
            handle: ContentHandle::Inline(content),
        }
    }

    /// Sub-document backed by a file whose cost was measured at index time
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>, cost: u64) -> Self {
        Self {
            name: name.into(),
            handle: ContentHandle::File(path.into()),
            cost,
        }
    }

    /// Override the estimated cost
    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }
}

/// Advisory "see also" link between two documents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrossReference {
    pub from: DocId,
    pub to: DocId,
}

/// A named knowledge node
#[derive(Debug, Clone)]
pub struct SkillUnit {
    pub id: SkillId,
    /// Display name (frontmatter `name`, or the last identifier segment)
    pub name: String,
    /// One-line summary used for catalogs and matching
    pub description: String,
    /// Always-loaded, self-sufficient guidance
    pub core: String,
    pub core_cost: u64,
    pub tags: Vec<String>,
    pub sub_documents: BTreeMap<String, SubDocument>,
    pub references: Vec<CrossReference>,
}

impl SkillUnit {
    pub fn new(id: SkillId, core: impl Into<String>) -> Self {
        let core = core.into();
        Self {
            name: id.leaf().to_string(),
            description: String::new(),
            core_cost: estimate_tokens(&core),
            core,
            id,
            tags: Vec::new(),
            sub_documents: BTreeMap::new(),
            references: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Override the estimated core body cost
    pub fn with_core_cost(mut self, cost: u64) -> Self {
        self.core_cost = cost;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_sub_document(mut self, sub: SubDocument) -> Self {
        self.sub_documents.insert(sub.name.clone(), sub);
        self
    }

    /// Add a reference from this unit's core body
    pub fn with_reference(mut self, to: DocId) -> Self {
        self.references.push(CrossReference {
            from: DocId::core(self.id.clone()),
            to,
        });
        self
    }

    /// Identifier of the core body
    pub fn core_id(&self) -> DocId {
        DocId::core(self.id.clone())
    }

    pub fn sub_document(&self, name: &str) -> Option<&SubDocument> {
        self.sub_documents.get(name)
    }

    /// References originating from the given document of this unit
    pub fn references_from<'a>(&'a self, from: &DocId) -> Vec<&'a CrossReference> {
        self.references.iter().filter(|r| &r.from == from).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimation() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }

    #[test]
    fn test_unit_builder() {
        let id = SkillId::new("react/animation").unwrap();
        let unit = SkillUnit::new(id.clone(), "Use springs for motion.")
            .with_tags(["react", "motion"])
            .with_sub_document(SubDocument::inline("examples/fade", "fade example body"))
            .with_reference("react/hooks".parse().unwrap());

        assert_eq!(unit.name, "animation");
        assert_eq!(unit.tags.len(), 2);
        assert_eq!(unit.sub_document("examples/fade").unwrap().cost, 4);
        assert_eq!(unit.references_from(&unit.core_id()).len(), 1);
        let fade = DocId::sub_document(id.clone(), "examples/fade").unwrap();
        assert!(unit.references_from(&fade).is_empty());
        assert_eq!(unit.references[0].from, DocId::core(id));
    }
}
