//! On-disk corpus discovery
//!
//! Each directory containing SKILL.md is a skill unit. Its identifier is the
//! directory path relative to the corpus root. Every other markdown file
//! under the unit directory (outside nested units) is a sub-document whose
//! content is left on disk until it is expanded.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use skillpack_types::{
    estimate_tokens, CrossReference, DocId, SkillId, SkillUnit, SubDocument,
};
use tracing::{debug, info, warn};

use crate::error::{IndexError, Result};
use crate::index::SkillIndex;

/// Core document file name
pub const SKILL_FILE: &str = "SKILL.md";

/// Maximum allowed name length
const MAX_NAME_LENGTH: usize = 64;
/// Maximum allowed description length
const MAX_DESCRIPTION_LENGTH: usize = 1024;

/// Skill metadata extracted from YAML frontmatter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillFrontmatter {
    /// Skill name (lowercase letters/numbers/hyphens only)
    #[serde(default)]
    pub name: Option<String>,
    /// What the skill covers and when to use it
    #[serde(default)]
    pub description: Option<String>,
    /// Topic tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Explicit "see also" identifiers (`skill/id` or `skill/id#sub`)
    #[serde(default)]
    pub references: Vec<String>,
}

/// Set of corpus roots scanned in order
#[derive(Debug, Default)]
pub struct Corpus {
    directories: Vec<PathBuf>,
}

impl Corpus {
    /// Create a corpus with no roots
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a corpus root
    pub fn add_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directories.push(dir.into());
        self
    }

    /// Add personal skills directory: ~/.skillpack/skills/
    pub fn with_personal_skills(self) -> Self {
        if let Some(home) = dirs::home_dir() {
            self.add_directory(home.join(".skillpack").join("skills"))
        } else {
            warn!("Could not find home directory for personal skills");
            self
        }
    }

    /// Add project skills directory: ./.skillpack/skills/
    pub fn with_project_skills(self) -> Self {
        self.add_directory(PathBuf::from(".skillpack/skills"))
    }

    /// Configured roots
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Scan all roots and parse every skill unit, in build order
    pub fn discover(&self) -> Result<Vec<SkillUnit>> {
        info!(
            "Starting corpus discovery in {} directories",
            self.directories.len()
        );

        let parser = DocumentParser::new()?;
        let mut units = Vec::new();

        for dir in &self.directories {
            if !dir.exists() {
                debug!("Corpus directory does not exist: {:?}", dir);
                continue;
            }

            if !dir.is_dir() {
                warn!("Corpus path is not a directory: {:?}", dir);
                continue;
            }

            units.extend(self.scan_root(dir, &parser)?);
        }

        info!("Discovered {} skills", units.len());
        Ok(units)
    }

    /// Discover and build the index in one step
    pub fn build_index(&self) -> Result<SkillIndex> {
        SkillIndex::build(self.discover()?)
    }

    fn scan_root(&self, root: &Path, parser: &DocumentParser) -> Result<Vec<SkillUnit>> {
        let mut unit_dirs = Vec::new();
        collect_unit_dirs(root, &mut unit_dirs)?;

        if unit_dirs.iter().any(|d| d == root) {
            warn!("Ignoring {} at corpus root {:?}", SKILL_FILE, root);
        }

        let mut known = BTreeSet::new();
        let mut located = Vec::new();
        for dir in unit_dirs.into_iter().filter(|d| d != root) {
            match skill_id_for(root, &dir) {
                Ok(id) => {
                    known.insert(id.as_str().to_string());
                    located.push((id, dir));
                }
                Err(e) => warn!("Skipping {:?}: {}", dir, e),
            }
        }

        let mut units = Vec::with_capacity(located.len());
        for (id, dir) in located {
            match self.load_unit(root, &dir, id, &known, parser) {
                Ok(unit) => {
                    debug!("Discovered skill: {} at {:?}", unit.id, dir);
                    units.push(unit);
                }
                Err(e @ IndexError::InvalidFrontmatter { .. }) => {
                    warn!("Skipping {:?}: {}", dir, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(units)
    }

    fn load_unit(
        &self,
        root: &Path,
        dir: &Path,
        id: SkillId,
        known: &BTreeSet<String>,
        parser: &DocumentParser,
    ) -> Result<SkillUnit> {
        let skill_file = dir.join(SKILL_FILE);
        let content = read_file(&skill_file)?;
        let (frontmatter, body) = parser.split_frontmatter(&content, &skill_file)?;
        validate_frontmatter(&frontmatter, &skill_file)?;

        let description = frontmatter
            .description
            .clone()
            .unwrap_or_else(|| first_paragraph_line(&body));
        let rel_dir = relative_path(root, dir);
        let core_links = parser.links(&body, &rel_dir, known);
        let mut unit = SkillUnit::new(id.clone(), body)
            .with_description(description)
            .with_tags(frontmatter.tags.iter().cloned());
        if let Some(name) = &frontmatter.name {
            unit = unit.with_name(name.clone());
        }

        let core_id = DocId::core(id.clone());
        for to in core_links {
            unit.references.push(CrossReference {
                from: core_id.clone(),
                to,
            });
        }
        for raw in &frontmatter.references {
            match raw.parse::<DocId>() {
                Ok(to) => unit.references.push(CrossReference {
                    from: core_id.clone(),
                    to,
                }),
                Err(e) => warn!("Ignoring reference in {:?}: {}", skill_file, e),
            }
        }

        let mut sub_files = Vec::new();
        collect_sub_documents(dir, &mut sub_files)?;
        for path in sub_files {
            let name = sub_document_name(dir, &path);
            let doc_id = match DocId::sub_document(id.clone(), name.clone()) {
                Ok(doc_id) => doc_id,
                Err(e) => {
                    warn!("Skipping sub-document {:?}: {}", path, e);
                    continue;
                }
            };
            let text = read_file(&path)?;
            let sub_rel_dir = path
                .parent()
                .map(|p| relative_path(root, p))
                .unwrap_or_else(|| rel_dir.clone());
            for to in parser.links(&text, &sub_rel_dir, known) {
                unit.references.push(CrossReference {
                    from: doc_id.clone(),
                    to,
                });
            }
            unit = unit.with_sub_document(SubDocument::file(name, path, estimate_tokens(&text)));
        }

        Ok(unit)
    }
}

/// Frontmatter splitting and link extraction, compiled once per discovery
struct DocumentParser {
    frontmatter: Regex,
    link: Regex,
}

impl DocumentParser {
    fn new() -> Result<Self> {
        Ok(Self {
            frontmatter: Regex::new(r"^---\s*\n([\s\S]*?)\n---\s*(?:\n([\s\S]*))?$")?,
            link: Regex::new(r#"\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)?,
        })
    }

    /// Split a document into frontmatter and body; frontmatter is optional
    fn split_frontmatter(&self, content: &str, path: &Path) -> Result<(SkillFrontmatter, String)> {
        let content = content.replace("\r\n", "\n");
        if !content.starts_with("---") {
            return Ok((SkillFrontmatter::default(), content));
        }

        let captures = self
            .frontmatter
            .captures(&content)
            .ok_or_else(|| IndexError::InvalidFrontmatter {
                path: path.to_path_buf(),
                reason: "unterminated frontmatter block".to_string(),
            })?;

        let yaml = captures.get(1).map_or("", |m| m.as_str());
        let body = captures.get(2).map_or("", |m| m.as_str());

        let frontmatter = if yaml.trim().is_empty() {
            SkillFrontmatter::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| IndexError::InvalidFrontmatter {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };

        Ok((frontmatter, body.trim_start_matches('\n').to_string()))
    }

    /// Relative markdown links of a document, resolved to document identifiers
    fn links(&self, text: &str, rel_dir: &str, known: &BTreeSet<String>) -> Vec<DocId> {
        let mut seen = HashSet::new();
        self.link
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .filter_map(|target| resolve_link(rel_dir, target, known))
            .filter(|doc| seen.insert(doc.clone()))
            .collect()
    }
}

/// Map a relative markdown link to the document it names
fn resolve_link(rel_dir: &str, target: &str, known: &BTreeSet<String>) -> Option<DocId> {
    if target.contains("://") || target.starts_with('#') || target.starts_with('/') {
        return None;
    }
    let target = target.split('#').next().unwrap_or(target);
    if !target.ends_with(".md") {
        return None;
    }

    let joined = normalize(&format!("{rel_dir}/{target}"))?;
    if let Some(skill_dir) = joined
        .strip_suffix(SKILL_FILE)
        .filter(|d| d.is_empty() || d.ends_with('/'))
    {
        let skill = skill_dir.trim_end_matches('/');
        return SkillId::new(skill).ok().map(DocId::core);
    }

    let stem = joined.strip_suffix(".md")?;
    let owner = known
        .iter()
        .filter(|unit| stem.starts_with(&format!("{unit}/")))
        .max_by_key(|unit| unit.len());

    match owner {
        Some(unit) => {
            let skill = SkillId::new(unit.as_str()).ok()?;
            DocId::sub_document(skill, &stem[unit.len() + 1..]).ok()
        }
        None => SkillId::new(stem).ok().map(DocId::core),
    }
}

/// Collapse `.` and `..` segments; `None` if the path escapes the root
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn collect_unit_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if dir.join(SKILL_FILE).is_file() {
        out.push(dir.to_path_buf());
    }
    for child in sorted_entries(dir)? {
        if child.is_dir() {
            collect_unit_dirs(&child, out)?;
        }
    }
    Ok(())
}

fn collect_sub_documents(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for child in sorted_entries(dir)? {
        if child.is_dir() {
            if !child.join(SKILL_FILE).is_file() {
                collect_sub_documents(&child, out)?;
            }
        } else if is_markdown(&child) && child.file_name().is_some_and(|n| n != SKILL_FILE) {
            out.push(child);
        }
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| IndexError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| IndexError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "md")
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Forward-slash path of `path` relative to `root`
fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn skill_id_for(root: &Path, dir: &Path) -> Result<SkillId> {
    SkillId::new(relative_path(root, dir)).map_err(|source| IndexError::InvalidIdentifier {
        path: dir.to_path_buf(),
        source,
    })
}

fn sub_document_name(unit_dir: &Path, path: &Path) -> String {
    let rel = relative_path(unit_dir, path);
    rel.strip_suffix(".md").map(str::to_string).unwrap_or(rel)
}

fn first_paragraph_line(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or_default()
        .to_string()
}

/// Validate frontmatter metadata
fn validate_frontmatter(frontmatter: &SkillFrontmatter, path: &Path) -> Result<()> {
    if let Some(name) = &frontmatter.name {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(IndexError::InvalidFrontmatter {
                path: path.to_path_buf(),
                reason: format!(
                    "skill name '{name}' must contain only lowercase letters, numbers, and hyphens"
                ),
            });
        }

        if name.len() > MAX_NAME_LENGTH {
            warn!(
                "Skill name '{}' exceeds {} characters (was {}), may be truncated",
                name,
                MAX_NAME_LENGTH,
                name.len()
            );
        }
    }

    if let Some(description) = &frontmatter.description {
        if description.len() > MAX_DESCRIPTION_LENGTH {
            warn!(
                "Skill {:?} description exceeds {} characters (was {}), may be truncated",
                path,
                MAX_DESCRIPTION_LENGTH,
                description.len()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn known(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_split_frontmatter() {
        let content = r#"---
name: code-reviewer
description: Reviews code for best practices and security.
tags: [review, security]
---

# Code Reviewer

This skill helps review code.
"#;

        let parser = DocumentParser::new().unwrap();
        let (frontmatter, body) = parser
            .split_frontmatter(content, Path::new("SKILL.md"))
            .unwrap();
        assert_eq!(frontmatter.name.as_deref(), Some("code-reviewer"));
        assert_eq!(frontmatter.tags, vec!["review", "security"]);
        assert!(body.starts_with("# Code Reviewer"));
    }

    #[test]
    fn test_frontmatter_is_optional() {
        let parser = DocumentParser::new().unwrap();
        let (frontmatter, body) = parser
            .split_frontmatter("# Title\n\nBody", Path::new("SKILL.md"))
            .unwrap();
        assert!(frontmatter.name.is_none());
        assert_eq!(body, "# Title\n\nBody");
    }

    #[test]
    fn test_unterminated_frontmatter() {
        let parser = DocumentParser::new().unwrap();
        let result = parser.split_frontmatter("---\nname: x\n# body", Path::new("SKILL.md"));
        assert!(matches!(result, Err(IndexError::InvalidFrontmatter { .. })));
    }

    #[test]
    fn test_validate_frontmatter() {
        let valid = SkillFrontmatter {
            name: Some("valid-skill-name".to_string()),
            ..SkillFrontmatter::default()
        };
        assert!(validate_frontmatter(&valid, Path::new("SKILL.md")).is_ok());

        let invalid = SkillFrontmatter {
            name: Some("Invalid_Name".to_string()),
            ..SkillFrontmatter::default()
        };
        assert!(validate_frontmatter(&invalid, Path::new("SKILL.md")).is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a/b/../c/./d.md").as_deref(), Some("a/c/d.md"));
        assert_eq!(normalize("a/../../x.md"), None);
    }

    #[test]
    fn test_resolve_link() {
        let units = known(&["react", "react/animation", "review"]);

        let core = resolve_link("react/animation", "../../review/SKILL.md", &units).unwrap();
        assert_eq!(core.to_string(), "review");

        let sub = resolve_link("react/animation", "examples/fade.md", &units).unwrap();
        assert_eq!(sub.to_string(), "react/animation#examples/fade");

        let parent_sub = resolve_link("react", "hooks.md#usage", &units).unwrap();
        assert_eq!(parent_sub.to_string(), "react#hooks");

        let missing = resolve_link("react", "../vue/SKILL.md", &units).unwrap();
        assert_eq!(missing.to_string(), "vue");

        assert!(resolve_link("react", "https://example.com/a.md", &units).is_none());
        assert!(resolve_link("react", "#section", &units).is_none());
        assert!(resolve_link("react", "diagram.png", &units).is_none());
    }

    #[test]
    fn test_links_are_deduplicated() {
        let parser = DocumentParser::new().unwrap();
        let text = "See [a](../review/SKILL.md) and [again](../review/SKILL.md \"title\").";
        let links = parser.links(text, "react", &known(&["react", "review"]));
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_first_paragraph_line() {
        assert_eq!(first_paragraph_line("# Title\n\nFirst line.\nSecond."), "First line.");
        assert_eq!(first_paragraph_line("# Only heading"), "");
    }
}
