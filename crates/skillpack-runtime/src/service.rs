use crate::config::{Config, LogFormat};
use anyhow::{Context, Result};
use skillpack_index::{Corpus, SkillIndex};
use skillpack_loader::{Loader, Session};
use skillpack_types::{LoadOutcome, LoadRequest, SkillId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Skill service - wires corpus, index and loader, and hands out sessions
#[derive(Debug)]
pub struct SkillService {
    config: Config,
    loader: Loader,
}

impl SkillService {
    /// Build the index from the configured corpus roots
    ///
    /// Fails if two units share an identifier; dangling references are logged
    /// and left for the loader to report.
    pub fn from_config(config: Config) -> Result<Self> {
        let mut corpus = Corpus::new();
        if config.corpus.project {
            corpus = corpus.with_project_skills();
        }
        if config.corpus.personal {
            corpus = corpus.with_personal_skills();
        }
        let corpus = config
            .corpus
            .expanded_directories()
            .into_iter()
            .fold(corpus, |corpus, dir| corpus.add_directory(dir));

        let index = corpus
            .build_index()
            .context("Failed to build skill index")?;
        info!(
            "Discovered {} skills in {} directories",
            index.len(),
            corpus.directories().len()
        );
        if !index.dangling_references().is_empty() {
            warn!(
                "{} cross-references point to missing documents",
                index.dangling_references().len()
            );
        }

        Ok(Self::with_index(config, index))
    }

    /// Wrap an index that was built elsewhere
    pub fn with_index(config: Config, index: SkillIndex) -> Self {
        let loader = Loader::new(Arc::new(index))
            .with_weights(config.matcher.weights())
            .with_max_candidates(config.matcher.max_candidates);
        Self { config, loader }
    }

    /// Install the configured tracing subscriber
    pub fn init_logging(&self) -> Result<()> {
        let level = &self.config.logging.level;
        match self.config.logging.format {
            LogFormat::Pretty => skillpack_logging::init_logging(level),
            LogFormat::Json => skillpack_logging::init_json_logging(level),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &SkillIndex {
        self.loader.index()
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Open a session with the configured budget capacity
    pub fn open_session(&self) -> Session {
        Session::new(self.config.budget.capacity)
    }

    /// Skills catalog for an agent system prompt
    pub fn catalog_summary(&self) -> String {
        self.index().catalog_summary()
    }

    pub async fn load(&self, session: &Session, request: &LoadRequest) -> LoadOutcome {
        self.loader.load(session, request).await
    }

    pub async fn load_with_cancellation(
        &self,
        session: &Session,
        request: &LoadRequest,
        cancel: &CancellationToken,
    ) -> LoadOutcome {
        self.loader
            .load_with_cancellation(session, request, cancel)
            .await
    }

    pub async fn expand(&self, session: &Session, skill: &SkillId, name: &str) -> LoadOutcome {
        self.loader.expand(session, skill, name).await
    }

    pub async fn expand_with_cancellation(
        &self,
        session: &Session,
        skill: &SkillId,
        name: &str,
        cancel: &CancellationToken,
    ) -> LoadOutcome {
        self.loader
            .expand_with_cancellation(session, skill, name, cancel)
            .await
    }
}
