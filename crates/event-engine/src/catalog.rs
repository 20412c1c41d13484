//! Content catalog: loads, validates and caches event templates.
//!
//! Content is grouped into buckets keyed by (family, biome, season), where
//! a missing biome means `general` and a missing season means `any`. A
//! query merges the four buckets that apply to the current biome and
//! season. Each bucket is parsed once and cached; a bucket that fails to
//! load is logged and cached as empty.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clan_state::{Biome, EventFamily, Season};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::ContentError;
use crate::template::{parse_templates, EventTemplate};
use crate::text::Snippets;

/// Identifies one content bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub family: EventFamily,
    /// `None` is the `general` bucket
    pub biome: Option<Biome>,
    /// `None` is the `any` bucket
    pub season: Option<Season>,
}

impl BucketKey {
    pub fn new(family: EventFamily, biome: Option<Biome>, season: Option<Season>) -> Self {
        Self { family, biome, season }
    }

    /// Relative path of this bucket's file, e.g. `patrol/forest/greenleaf.json`.
    pub fn relative_path(&self) -> PathBuf {
        let biome = self.biome.map(|b| b.as_str()).unwrap_or("general");
        let season = self.season.map(|s| s.as_str()).unwrap_or("any");
        PathBuf::from(self.family.as_str())
            .join(biome)
            .join(format!("{}.json", season))
    }

    /// The four buckets that apply to a biome and season, most specific first.
    fn applicable(family: EventFamily, biome: Biome, season: Season) -> [BucketKey; 4] {
        [
            BucketKey::new(family, Some(biome), Some(season)),
            BucketKey::new(family, Some(biome), None),
            BucketKey::new(family, None, Some(season)),
            BucketKey::new(family, None, None),
        ]
    }

    /// Every bucket a family can have.
    fn all_for(family: EventFamily) -> Vec<BucketKey> {
        let biomes = std::iter::once(None).chain(Biome::all().iter().copied().map(Some));
        biomes
            .flat_map(|biome| {
                std::iter::once(None)
                    .chain(Season::all().iter().copied().map(Some))
                    .map(move |season| BucketKey::new(family, biome, season))
            })
            .collect()
    }
}

/// Supplies raw template records for a bucket.
pub trait TemplateSource {
    /// Raw template values for one bucket. A bucket with no content is
    /// `Ok` and empty.
    fn load_bucket(&self, key: &BucketKey) -> Result<Vec<serde_json::Value>, ContentError>;

    /// Snippet lists for `{SNIPPET/...}` placeholders.
    fn load_snippets(&self) -> Result<Snippets, ContentError> {
        Ok(Snippets::default())
    }
}

/// Reads buckets from `<root>/<family>/<biome|general>/<season|any>.json`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, ContentError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ContentError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| ContentError::Json {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl TemplateSource for DirectorySource {
    fn load_bucket(&self, key: &BucketKey) -> Result<Vec<serde_json::Value>, ContentError> {
        let path = self.root.join(key.relative_path());
        Ok(Self::read_json(&path)?.unwrap_or_default())
    }

    fn load_snippets(&self) -> Result<Snippets, ContentError> {
        Ok(Self::read_json(&self.root.join("snippets.json"))?.unwrap_or_default())
    }
}

/// Holds content in memory. Used by tests and by hosts that embed content.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    buckets: BTreeMap<BucketKey, Vec<serde_json::Value>>,
    snippets: Snippets,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds templates to a bucket.
    pub fn with_templates(mut self, key: BucketKey, templates: Vec<serde_json::Value>) -> Self {
        self.buckets.entry(key).or_default().extend(templates);
        self
    }

    pub fn with_snippets(mut self, snippets: Snippets) -> Self {
        self.snippets = snippets;
        self
    }
}

impl TemplateSource for MemorySource {
    fn load_bucket(&self, key: &BucketKey) -> Result<Vec<serde_json::Value>, ContentError> {
        Ok(self.buckets.get(key).cloned().unwrap_or_default())
    }

    fn load_snippets(&self) -> Result<Snippets, ContentError> {
        Ok(self.snippets.clone())
    }
}

/// Cached, validated templates.
pub struct Catalog<S: TemplateSource> {
    source: S,
    config: EngineConfig,
    cache: BTreeMap<BucketKey, Arc<[Arc<EventTemplate>]>>,
    snippets: Option<Arc<Snippets>>,
}

impl<S: TemplateSource> Catalog<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self {
            source,
            config,
            cache: BTreeMap::new(),
            snippets: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of buckets parsed so far.
    pub fn cached_buckets(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached bucket so the next query re-reads content.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.snippets = None;
    }

    /// Templates in one bucket, loading and validating it on first use.
    pub fn bucket(&mut self, key: BucketKey) -> Arc<[Arc<EventTemplate>]> {
        if let Some(cached) = self.cache.get(&key) {
            return Arc::clone(cached);
        }

        let templates: Arc<[Arc<EventTemplate>]> = match self.source.load_bucket(&key) {
            Ok(values) => {
                let (templates, errors) = parse_templates(values, key.family, &self.config);
                for error in errors {
                    warn!("Skipping template in {}: {}", key.relative_path().display(), error);
                }
                templates.into_iter().map(Arc::new).collect()
            }
            Err(e) => {
                warn!("Failed to load {}: {}", key.relative_path().display(), e);
                Arc::from(Vec::new())
            }
        };

        debug!(
            "Loaded {} templates from {}",
            templates.len(),
            key.relative_path().display()
        );
        self.cache.insert(key, Arc::clone(&templates));
        templates
    }

    /// Templates that apply to `family` in this biome and season.
    ///
    /// Ids repeated across buckets keep the most specific entry. With
    /// `ensure` set, the named template is pulled in from any bucket of the
    /// family if the applicable ones do not contain it.
    pub fn query(
        &mut self,
        family: EventFamily,
        biome: Biome,
        season: Season,
        ensure: Option<&str>,
    ) -> Vec<Arc<EventTemplate>> {
        let mut seen = BTreeSet::new();
        let mut result = Vec::new();

        for key in BucketKey::applicable(family, biome, season) {
            for template in self.bucket(key).iter() {
                if seen.insert(template.id.clone()) {
                    result.push(Arc::clone(template));
                }
            }
        }

        if let Some(id) = ensure {
            if !seen.contains(id) {
                match self.find(family, id) {
                    Some(template) => {
                        debug!("Debug override pulled {} into the {} pool", id, family);
                        result.push(template);
                    }
                    None => debug!("Debug override {} not found in {} content", id, family),
                }
            }
        }

        result
    }

    /// Looks a template up by id across every bucket of a family.
    pub fn find(&mut self, family: EventFamily, id: &str) -> Option<Arc<EventTemplate>> {
        BucketKey::all_for(family)
            .into_iter()
            .find_map(|key| self.bucket(key).iter().find(|t| t.id == id).cloned())
    }

    pub fn snippets(&mut self) -> Arc<Snippets> {
        if let Some(snippets) = &self.snippets {
            return Arc::clone(snippets);
        }
        let snippets = match self.source.load_snippets() {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!("Failed to load snippets: {}", e);
                Snippets::default()
            }
        };
        let snippets = Arc::new(snippets);
        self.snippets = Some(Arc::clone(&snippets));
        snippets
    }
}
