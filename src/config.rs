use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Refresh interval in minutes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Maximum number of feeds fetched in parallel during a cycle
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Secondary sort key applied after view count
    #[serde(default)]
    pub sort_tiebreak: SortTiebreak,
    /// Shuffle the sorted article list before returning it from /news
    #[serde(default)]
    pub shuffle_results: bool,
    pub categories: Vec<CategoryConfig>,
}

fn default_refresh_interval() -> u64 {
    15
}

fn default_max_concurrency() -> usize {
    15
}

/// Tie-break applied to articles sharing a view count. The final order is
/// always made deterministic by row id regardless of this setting.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortTiebreak {
    #[default]
    None,
    PublishedAt,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    pub name: String,
    /// Sources listed directly under the category
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Nested sub-groups (e.g. per-language), each with its own sources
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupConfig {
    pub name: String,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
}

/// One flattened catalog entry: a single feed to fetch, tagged with the
/// category (and sub-category, for grouped sources) it was listed under.
#[derive(Debug, Clone)]
pub struct FeedDescriptor {
    pub source_name: String,
    pub url: String,
    pub category: String,
    pub sub_category: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Walk the catalog into a flat list of descriptors, in declaration
    /// order: a category's direct sources first, then its groups' sources.
    pub fn descriptors(&self) -> Vec<FeedDescriptor> {
        let mut descriptors = Vec::new();
        for category in &self.categories {
            for source in &category.sources {
                descriptors.push(FeedDescriptor {
                    source_name: source.name.clone(),
                    url: source.url.clone(),
                    category: category.name.clone(),
                    sub_category: None,
                });
            }
            for group in &category.groups {
                for source in &group.sources {
                    descriptors.push(FeedDescriptor {
                        source_name: source.name.clone(),
                        url: source.url.clone(),
                        category: category.name.clone(),
                        sub_category: Some(group.name.clone()),
                    });
                }
            }
        }
        descriptors
    }
}
