//! Read-only, queryable catalog of skill units
//!
//! Built once from a corpus and never mutated afterwards, so lookups from
//! concurrent load requests need no locking.

use std::collections::{HashMap, HashSet};

use skillpack_types::{CrossReference, DocId, SkillId, SkillUnit};
use tracing::{info, warn};

use crate::error::{IndexError, Result};

/// Immutable skill catalog in corpus build order
#[derive(Debug, Default)]
pub struct SkillIndex {
    /// Units in build order
    units: Vec<SkillUnit>,
    /// Identifier to build position
    by_id: HashMap<SkillId, usize>,
    /// Lowercased tag to build positions
    by_tag: HashMap<String, Vec<usize>>,
    /// References whose target does not exist
    dangling: Vec<CrossReference>,
}

impl SkillIndex {
    /// Build the index, normalizing tags and flagging dangling references
    ///
    /// Fails with [`IndexError::DuplicateIdentifier`] if two units share an
    /// identifier.
    pub fn build(units: Vec<SkillUnit>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(units.len());
        let mut normalized = Vec::with_capacity(units.len());

        for (position, mut unit) in units.into_iter().enumerate() {
            if let Some(&first) = by_id.get(&unit.id) {
                return Err(IndexError::DuplicateIdentifier {
                    id: unit.id,
                    first,
                    second: position,
                });
            }
            by_id.insert(unit.id.clone(), position);
            unit.tags = normalize_tags(&unit.tags);
            dedup_references(&mut unit.references);
            normalized.push(unit);
        }

        let mut by_tag: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, unit) in normalized.iter().enumerate() {
            for tag in &unit.tags {
                by_tag.entry(tag.clone()).or_default().push(position);
            }
        }

        let mut index = Self {
            units: normalized,
            by_id,
            by_tag,
            dangling: Vec::new(),
        };

        let dangling: Vec<CrossReference> = index
            .units
            .iter()
            .flat_map(|u| u.references.iter())
            .filter(|r| !index.contains(&r.to))
            .cloned()
            .collect();

        for reference in &dangling {
            warn!(
                "Dangling reference from '{}' to '{}'",
                reference.from, reference.to
            );
        }
        index.dangling = dangling;

        info!(
            "Skill index built: {} units, {} tags, {} dangling references",
            index.units.len(),
            index.by_tag.len(),
            index.dangling.len()
        );
        Ok(index)
    }

    /// Exact-key retrieval
    pub fn lookup(&self, id: &SkillId) -> Option<&SkillUnit> {
        self.by_id.get(id).map(|&i| &self.units[i])
    }

    /// Build position of a unit, used as the ranking tie-break
    pub fn position(&self, id: &SkillId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Whether a core body or sub-document exists
    pub fn contains(&self, doc: &DocId) -> bool {
        match (self.lookup(doc.skill()), doc.sub()) {
            (Some(_), None) => true,
            (Some(unit), Some(sub)) => unit.sub_document(sub).is_some(),
            (None, _) => false,
        }
    }

    /// Units carrying a tag (case-insensitive)
    pub fn list_by_tag(&self, tag: &str) -> Vec<&SkillUnit> {
        self.by_tag
            .get(&tag.trim().to_lowercase())
            .map(|positions| positions.iter().map(|&i| &self.units[i]).collect())
            .unwrap_or_default()
    }

    /// All units in corpus build order
    pub fn all_units(&self) -> &[SkillUnit] {
        &self.units
    }

    /// References originating from a document
    pub fn references_from<'a>(&'a self, doc: &DocId) -> Vec<&'a CrossReference> {
        self.lookup(doc.skill())
            .map(|unit| unit.references_from(doc))
            .unwrap_or_default()
    }

    /// References whose target does not exist
    pub fn dangling_references(&self) -> &[CrossReference] {
        &self.dangling
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Generate the skills catalog for an agent system prompt
    /// Format:
    /// Available skills (load on demand):
    /// - react/animation: Spring-based motion patterns [react, motion]
    pub fn catalog_summary(&self) -> String {
        if self.units.is_empty() {
            return String::new();
        }

        let mut summary = String::from("Available skills (load on demand):\n");
        for unit in &self.units {
            summary.push_str(&format!("- {}: {}", unit.id, unit.description));
            if !unit.tags.is_empty() {
                summary.push_str(&format!(" [{}]", unit.tags.join(", ")));
            }
            summary.push('\n');
        }
        summary
    }
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

fn dedup_references(references: &mut Vec<CrossReference>) {
    let mut seen = HashSet::new();
    references.retain(|r| seen.insert(r.clone()));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use skillpack_types::SubDocument;

    fn unit(id: &str) -> SkillUnit {
        SkillUnit::new(SkillId::new(id).unwrap(), format!("core body of {id}"))
    }

    #[test]
    fn test_index_new() {
        let index = SkillIndex::build(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert!(index.catalog_summary().is_empty());
    }

    #[test]
    fn test_duplicate_identifier_is_fatal() {
        let result = SkillIndex::build(vec![unit("a"), unit("b"), unit("a")]);
        match result {
            Err(IndexError::DuplicateIdentifier { id, first, second }) => {
                assert_eq!(id.as_str(), "a");
                assert_eq!(first, 0);
                assert_eq!(second, 2);
            }
            other => panic!("expected duplicate identifier, got {other:?}"),
        }
    }

    #[test]
    fn test_tags_are_case_insensitive_and_deduplicated() {
        let index = SkillIndex::build(vec![
            unit("a").with_tags(["React", "react ", "Motion"]),
            unit("b").with_tags(["react"]),
        ])
        .unwrap();

        assert_eq!(index.all_units()[0].tags, vec!["react", "motion"]);
        assert_eq!(index.list_by_tag("REACT").len(), 2);
        assert_eq!(index.list_by_tag("motion").len(), 1);
        assert!(index.list_by_tag("vue").is_empty());
    }

    #[test]
    fn test_build_order_is_preserved() {
        let index = SkillIndex::build(vec![unit("z"), unit("a"), unit("m")]).unwrap();
        let ids: Vec<&str> = index.all_units().iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
        assert_eq!(index.position(&SkillId::new("m").unwrap()), Some(2));
    }

    #[test]
    fn test_dangling_reference_reported_once() {
        let index = SkillIndex::build(vec![
            unit("a")
                .with_reference("missing".parse().unwrap())
                .with_reference("missing".parse().unwrap())
                .with_reference("b".parse().unwrap()),
            unit("b"),
        ])
        .unwrap();

        let dangling = index.dangling_references();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].to.to_string(), "missing");
    }

    #[test]
    fn test_sub_document_reference_resolution() {
        let index = SkillIndex::build(vec![
            unit("a")
                .with_reference("b#examples/one".parse().unwrap())
                .with_reference("b#examples/two".parse().unwrap()),
            unit("b").with_sub_document(SubDocument::inline("examples/one", "text")),
        ])
        .unwrap();

        assert!(index.contains(&"b#examples/one".parse().unwrap()));
        assert_eq!(index.dangling_references().len(), 1);
        assert_eq!(index.references_from(&"a".parse().unwrap()).len(), 2);
    }

    #[test]
    fn test_references_outlive_the_lookup_id() {
        let index = SkillIndex::build(vec![
            unit("a").with_reference("b".parse().unwrap()),
            unit("b"),
        ])
        .unwrap();

        let references = {
            let from: DocId = "a".parse().unwrap();
            index.references_from(&from)
        };
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].to.to_string(), "b");
    }

    #[test]
    fn test_catalog_summary() {
        let index = SkillIndex::build(vec![
            unit("react/animation")
                .with_description("Motion patterns")
                .with_tags(["react"]),
            unit("review").with_description("Review checklist"),
        ])
        .unwrap();

        let summary = index.catalog_summary();
        assert!(summary.starts_with("Available skills"));
        assert!(summary.contains("- react/animation: Motion patterns [react]\n"));
        assert!(summary.contains("- review: Review checklist\n"));
    }
}
