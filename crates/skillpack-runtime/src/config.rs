use anyhow::Context;
use serde::Deserialize;
use skillpack_loader::{MatcherWeights, DEFAULT_MAX_CANDIDATES};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config template created when no config exists
const DEFAULT_CONFIG: &str = r#"
[corpus]
personal = true  # ~/.skillpack/skills
project = true  # ./.skillpack/skills
directories = []  # Extra roots; prepend one via SKILLPACK_SKILLS_DIR

[budget]
capacity = 32000  # Estimated tokens per session; set via SKILLPACK_BUDGET

[matcher]
tag_weight = 3.0
query_tag_weight = 1.5
overlap_weight = 1.0
min_score = 0.25
max_candidates = 5

[logging]
level = "info"  # trace, debug, info, warn, error
format = "pretty"  # or "json"
"#;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CorpusConfig {
    pub directories: Vec<String>,
    pub personal: bool,
    pub project: bool,
}

impl CorpusConfig {
    /// Configured roots with a leading `~` expanded to the home directory
    pub fn expanded_directories(&self) -> Vec<PathBuf> {
        self.directories.iter().map(|d| expand_home(d)).collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BudgetConfig {
    pub capacity: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self { capacity: 32_000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatcherConfig {
    pub tag_weight: f64,
    pub query_tag_weight: f64,
    pub overlap_weight: f64,
    pub min_score: f64,
    pub max_candidates: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        let weights = MatcherWeights::default();
        Self {
            tag_weight: weights.tag_weight,
            query_tag_weight: weights.query_tag_weight,
            overlap_weight: weights.overlap_weight,
            min_score: weights.min_score,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl MatcherConfig {
    pub fn weights(&self) -> MatcherWeights {
        MatcherWeights {
            tag_weight: self.tag_weight,
            query_tag_weight: self.query_tag_weight,
            overlap_weight: self.overlap_weight,
            min_score: self.min_score,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub budget: BudgetConfig,
    pub matcher: MatcherConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a config document directly, without layering
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Invalid skillpack config")
    }

    /// Get the global config path: ~/.skillpack/skillpack.toml
    pub fn global_config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".skillpack").join("skillpack.toml"))
    }

    /// Ensure a config file exists at `config_path`, writing the default template if needed
    pub fn ensure_config_at(config_path: &Path) -> anyhow::Result<()> {
        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir)?;
                eprintln!("Created config directory: {}", config_dir.display());
            }
        }

        if !config_path.exists() {
            fs::write(config_path, DEFAULT_CONFIG.trim())?;
            eprintln!("Created default config: {}", config_path.display());
        }

        Ok(())
    }

    /// Load configuration with layered approach:
    /// 1. Global config: ~/.skillpack/skillpack.toml (auto-created if missing)
    /// 2. Local override: ./skillpack.toml (workspace, optional)
    /// 3. Environment variables (highest priority)
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file from current directory
        dotenvy::dotenv().ok();

        let global_config_path = Self::global_config_path()?;
        Self::ensure_config_at(&global_config_path)?;
        Self::load_layered(&global_config_path)
    }

    /// Layered load on top of an explicit global config file
    pub fn load_layered(global_config_path: &Path) -> anyhow::Result<Self> {
        let mut config_builder = config::Config::builder()
            // Layer 1: Global config
            .add_source(config::File::from(global_config_path.to_path_buf()))
            // Layer 2: Local workspace config (optional override)
            .add_source(config::File::with_name("skillpack").required(false))
            // Layer 3: Environment variables with SKILLPACK__ prefix
            .add_source(
                config::Environment::with_prefix("SKILLPACK")
                    .prefix_separator("__")
                    .separator("__"),
            );

        // Layer 4: Convenience env var overrides
        if let Ok(capacity) = env::var("SKILLPACK_BUDGET") {
            config_builder = config_builder.set_override("budget.capacity", capacity)?;
        }

        let mut config: Self = config_builder.build()?.try_deserialize()?;

        if let Ok(dir) = env::var("SKILLPACK_SKILLS_DIR") {
            config.corpus.directories.insert(0, dir);
        }

        Ok(config)
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(dir: &str) -> PathBuf {
    match (dir.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches(['/', '\\'])),
        _ => PathBuf::from(dir),
    }
}
