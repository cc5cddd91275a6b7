//! Lexical relevance ranking over an index snapshot
//!
//! Score = `tag_weight` × explicit tag matches
//!       + `query_tag_weight` × fraction of query terms naming a unit tag
//!       + `overlap_weight` × fraction of query terms found in the unit text.
//! Equal scores keep corpus build order.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skillpack_index::SkillIndex;
use skillpack_types::SkillUnit;
use tracing::debug;

/// Terms ignored when tokenizing queries and documents
const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "by", "do", "for", "from", "how", "in", "is", "it",
    "me", "my", "of", "on", "or", "that", "the", "this", "to", "use", "what", "when", "with",
];

/// Relevance weights and the minimum score a candidate must reach
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherWeights {
    pub tag_weight: f64,
    pub query_tag_weight: f64,
    pub overlap_weight: f64,
    pub min_score: f64,
}

impl Default for MatcherWeights {
    fn default() -> Self {
        Self {
            tag_weight: 3.0,
            query_tag_weight: 1.5,
            overlap_weight: 1.0,
            min_score: 0.25,
        }
    }
}

/// A ranked candidate
#[derive(Debug, Clone, Copy)]
pub struct ScoredUnit<'a> {
    pub unit: &'a SkillUnit,
    pub score: f64,
    /// Corpus build position
    pub position: usize,
}

#[derive(Debug)]
struct UnitTerms {
    words: HashSet<String>,
    tags: HashSet<String>,
    tag_words: HashSet<String>,
}

impl UnitTerms {
    fn from_unit(unit: &SkillUnit) -> Self {
        let mut words: HashSet<String> = tokenize(unit.id.as_str()).collect();
        words.extend(tokenize(&unit.name));
        words.extend(tokenize(&unit.description));
        words.extend(tokenize(&unit.core));

        let tags: HashSet<String> = unit.tags.iter().map(|t| t.to_lowercase()).collect();
        let mut tag_words: HashSet<String> = unit.tags.iter().flat_map(|t| tokenize(t)).collect();
        tag_words.extend(tags.iter().cloned());
        words.extend(tag_words.iter().cloned());

        Self {
            words,
            tags,
            tag_words,
        }
    }
}

/// Ranks index entries against a query; safe to share across tasks
#[derive(Debug)]
pub struct Matcher {
    index: Arc<SkillIndex>,
    weights: MatcherWeights,
    terms: Vec<UnitTerms>,
}

impl Matcher {
    /// Precompute term sets for every unit in the snapshot
    #[must_use]
    pub fn new(index: Arc<SkillIndex>, weights: MatcherWeights) -> Self {
        let terms = index.all_units().iter().map(UnitTerms::from_unit).collect();
        Self {
            index,
            weights,
            terms,
        }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<SkillIndex> {
        &self.index
    }

    #[must_use]
    pub fn weights(&self) -> MatcherWeights {
        self.weights
    }

    /// Candidates clearing the relevance floor, highest score first
    ///
    /// An empty result is the normal "no match" outcome.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rank(&self, query: &str, tags: &[String]) -> Vec<ScoredUnit<'_>> {
        let wanted_tags: HashSet<String> = tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let query_terms: BTreeSet<String> = tokenize(query).collect();

        if wanted_tags.is_empty() && query_terms.is_empty() {
            return Vec::new();
        }

        let query_len = query_terms.len() as f64;
        let mut ranked: Vec<ScoredUnit<'_>> = self
            .index
            .all_units()
            .iter()
            .zip(&self.terms)
            .enumerate()
            .filter_map(|(position, (unit, terms))| {
                let tag_hits = wanted_tags.iter().filter(|t| terms.tags.contains(*t)).count();
                let mut score = self.weights.tag_weight * tag_hits as f64;

                if !query_terms.is_empty() {
                    let named_tags = query_terms
                        .iter()
                        .filter(|w| terms.tag_words.contains(*w))
                        .count();
                    let overlap = query_terms
                        .iter()
                        .filter(|w| terms.words.contains(*w))
                        .count();
                    score += self.weights.query_tag_weight * named_tags as f64 / query_len;
                    score += self.weights.overlap_weight * overlap as f64 / query_len;
                }

                (score > 0.0 && score >= self.weights.min_score).then_some(ScoredUnit {
                    unit,
                    score,
                    position,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.position.cmp(&b.position))
        });

        debug!(
            "Ranked {} of {} units for query {:?} tags {:?}",
            ranked.len(),
            self.index.len(),
            query,
            tags
        );
        ranked
    }
}

/// Lowercased alphanumeric terms of at least two characters, minus stop words
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use skillpack_types::SkillId;

    fn unit(id: &str, core: &str) -> SkillUnit {
        SkillUnit::new(SkillId::new(id).unwrap(), core)
    }

    fn matcher(units: Vec<SkillUnit>) -> Matcher {
        Matcher::new(
            Arc::new(SkillIndex::build(units).unwrap()),
            MatcherWeights::default(),
        )
    }

    fn ids(ranked: &[ScoredUnit<'_>]) -> Vec<String> {
        ranked.iter().map(|s| s.unit.id.to_string()).collect()
    }

    #[test]
    fn test_tokenize() {
        let terms: Vec<String> = tokenize("How to use React-Native animations, a b").collect();
        assert_eq!(terms, vec!["react", "native", "animations"]);
    }

    #[test]
    fn test_explicit_tag_outranks_text_overlap() {
        let m = matcher(vec![
            unit("a", "spring animation timing curves"),
            unit("b", "unrelated body").with_tags(["animation"]),
        ]);
        let ranked = m.rank("spring timing", &["animation".to_string()]);
        assert_eq!(ids(&ranked), vec!["b", "a"]);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn test_ties_keep_build_order() {
        let m = matcher(vec![
            unit("zeta", "review checklist"),
            unit("alpha", "review checklist"),
        ]);
        let ranked = m.rank("review checklist", &[]);
        assert_eq!(ids(&ranked), vec!["zeta", "alpha"]);
        assert_eq!(ranked[0].position, 0);
    }

    #[test]
    fn test_deterministic_ranking() {
        let m = matcher(vec![
            unit("a", "react hooks effects"),
            unit("b", "react animation springs").with_tags(["react"]),
            unit("c", "vue templates"),
            unit("d", "react hooks"),
        ]);
        let first = ids(&m.rank("react hooks", &[]));
        let second = ids(&m.rank("react hooks", &[]));
        assert_eq!(first, second);
        assert_eq!(first, vec!["b", "a", "d"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let m = matcher(vec![unit("a", "react hooks")]);
        assert!(m.rank("database migrations", &[]).is_empty());
        assert!(m.rank("", &[]).is_empty());
        assert!(m.rank("how to use the", &[]).is_empty());
    }

    #[test]
    fn test_relevance_floor() {
        let units = vec![unit("a", "react")];
        let strict = Matcher::new(
            Arc::new(SkillIndex::build(units).unwrap()),
            MatcherWeights {
                min_score: 0.5,
                ..MatcherWeights::default()
            },
        );
        // One of four query terms overlaps: 0.25 < 0.5
        assert!(strict.rank("react kubernetes terraform ansible", &[]).is_empty());
        assert_eq!(strict.rank("react kubernetes", &[]).len(), 1);
    }

    #[test]
    fn test_tag_only_request() {
        let m = matcher(vec![
            unit("a", "x").with_tags(["Review"]),
            unit("b", "y"),
        ]);
        assert_eq!(ids(&m.rank("", &["review".to_string()])), vec!["a"]);
    }
}
