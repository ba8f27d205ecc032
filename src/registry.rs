//! Named datasets: logical name → URL plus an optional post-processor, and
//! a loader that memoises every load for the life of the process.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    census::{self, VariableDictionary},
    clean::{Cleaner, CleanerConfig},
    error::{Error, Result},
    fetch,
    io::{self, Format},
    memo::MemoCache,
    promote::PromoteConfig,
    table::{Dataset, GeoTable},
};

/// Label column added by [`Loader::load_census_slices`].
pub const SOURCE: &str = "Source";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base every entry path is joined onto; a local directory or a URL.
    /// Defaults to the working directory.
    pub base_url: Option<String>,
    pub entries: BTreeMap<String, EntryConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
    pub path: String,
    #[serde(default)]
    pub post: Option<String>,
}

/// Steps applied after a read and before caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostProcess {
    Clean,
    Promote,
    SplitName,
    CleanPromote,
}

impl PostProcess {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Promote => "promote",
            Self::SplitName => "split_name",
            Self::CleanPromote => "clean_promote",
        }
    }

    pub fn apply(&self, dataset: Dataset, cleaner: &Cleaner, promote: &PromoteConfig) -> Result<Dataset> {
        match self {
            Self::Clean => cleaner.clean_dataset(dataset),
            Self::Promote => Ok(promote.promote_dataset(dataset)?.dataset),
            Self::SplitName => Ok(match dataset {
                Dataset::Table(df) => Dataset::Table(census::split_name(&df)?),
                Dataset::Geo(geo) => {
                    let data = census::split_name(geo.data())?;
                    Dataset::Geo(geo.with_data(data)?)
                }
            }),
            Self::CleanPromote => Ok(promote.promote_dataset(cleaner.clean_dataset(dataset)?)?.dataset),
        }
    }
}

impl FromStr for PostProcess {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "clean" => Self::Clean,
            "promote" => Self::Promote,
            "split_name" => Self::SplitName,
            "clean_promote" => Self::CleanPromote,
            other => return Err(Error::Config(format!("unknown post-processor {other:?}"))),
        })
    }
}

impl fmt::Display for PostProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub post: Option<PostProcess>,
}

#[derive(Debug, Clone)]
pub struct Registry {
    base: Url,
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    pub fn new(base: Url) -> Self {
        Self { base, entries: BTreeMap::new() }
    }

    /// Build from configuration; unknown post-processor names are rejected here.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let mut base = fetch::resolve_location(config.base_url.as_deref().unwrap_or("./"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut registry = Self::new(base);
        for (name, entry) in &config.entries {
            let post = entry.post.as_deref().map(str::parse::<PostProcess>).transpose()?;
            registry.insert(name, &entry.path, post);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, name: &str, path: &str, post: Option<PostProcess>) {
        self.entries.insert(name.to_string(), Entry { path: path.to_string(), post });
    }

    #[inline] pub fn base(&self) -> &Url { &self.base }

    #[inline] pub fn len(&self) -> usize { self.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn names(&self) -> impl Iterator<Item = &str> { self.entries.keys().map(String::as_str) }

    pub fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries.get(name).ok_or_else(|| Error::RegistryMiss(name.to_string()))
    }

    /// Entry path joined onto the base URL.
    pub fn url(&self, name: &str) -> Result<Url> {
        let entry = self.entry(name)?;
        self.base.join(&entry.path)
            .map_err(|e| Error::Config(format!("cannot join {:?} onto {}: {e}", entry.path, self.base)))
    }
}

/// Loads registry entries through a memoisation cache.
#[derive(Debug)]
pub struct Loader {
    registry: Registry,
    cache: Arc<MemoCache>,
    cleaner: Cleaner,
    promote: PromoteConfig,
}

impl Loader {
    /// Loader over the process-wide cache with default cleaning rules.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            cache: MemoCache::global(),
            cleaner: Cleaner::new(CleanerConfig::default()),
            promote: PromoteConfig::default(),
        }
    }

    pub fn from_config(config: &crate::Config) -> Result<Self> {
        Ok(Self::new(Registry::from_config(&config.registry)?)
            .with_rules(config.cleaner.clone(), config.promote.clone()))
    }

    pub fn with_cache(mut self, cache: Arc<MemoCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_rules(mut self, cleaner: CleanerConfig, promote: PromoteConfig) -> Self {
        self.cleaner = Cleaner::new(cleaner);
        self.promote = promote;
        self
    }

    #[inline] pub fn registry(&self) -> &Registry { &self.registry }

    #[inline] pub fn cache(&self) -> &Arc<MemoCache> { &self.cache }

    /// Load a registered dataset.
    pub fn load(&self, name: &str) -> Result<Arc<Dataset>> {
        let url = self.registry.url(name)?;
        let post = self.registry.entry(name)?.post;
        log::info!("[registry] loading {name} from {url}");
        self.load_url(&url, post)
    }

    /// Read `url`, apply `post`, and memoise the result by URL, post-processor
    /// and the cleaning and promotion rules it runs with.
    pub fn load_url(&self, url: &Url, post: Option<PostProcess>) -> Result<Arc<Dataset>> {
        let key = match post {
            Some(post) => {
                let rules = serde_json::to_string(&(self.cleaner.config(), &self.promote))
                    .map_err(|err| Error::Config(format!("cannot digest loader rules: {err}")))?;
                format!("{url}\n{}\n{rules}", post.name())
            }
            None => format!("{url}\n"),
        };
        self.cache.get_or_try_insert("registry::load", key.as_bytes(), || {
            let dataset = read_url(url)?;
            match post {
                Some(post) => post.apply(dataset, &self.cleaner, &self.promote),
                None => Ok(dataset),
            }
        })
    }

    /// Load several Census slices, tidy each, tag rows with the entry name in
    /// a `Source` column, and concatenate them.
    pub fn load_census_slices(&self, names: &[&str], dict: &VariableDictionary) -> Result<Dataset> {
        let mut combined: Option<Dataset> = None;
        for &name in names {
            let loaded = self.load(name)?;
            let tidy = census::tidy_dataset(&loaded, dict)?;
            let tagged = tag_source(tidy, name)?;
            combined = Some(match (combined, tagged) {
                (None, tagged) => tagged,
                (Some(Dataset::Table(acc)), Dataset::Table(df)) => Dataset::Table(acc.vstack(&df)?),
                (Some(Dataset::Geo(acc)), Dataset::Geo(geo)) => Dataset::Geo(acc.vstack(&geo)?),
                _ => return Err(Error::Config(format!(
                    "census slice {name} mixes geospatial and plain tables"
                ))),
            });
        }
        combined.ok_or_else(|| Error::Config("no census slices requested".to_string()))
    }
}

fn tag_source(dataset: Dataset, source: &str) -> Result<Dataset> {
    let tag = |df: &DataFrame| -> Result<DataFrame> {
        let mut df = df.clone();
        df.with_column(Column::new(SOURCE.into(), vec![source; df.height()]))?;
        Ok(df)
    };
    Ok(match dataset {
        Dataset::Table(df) => Dataset::Table(tag(&df)?),
        Dataset::Geo(geo) => {
            let data = tag(geo.data())?;
            Dataset::Geo(GeoTable::with_data(geo, data)?)
        }
    })
}

/// Fetch and parse by URL extension; loose shapefiles fetch their sidecars.
fn read_url(url: &Url) -> Result<Dataset> {
    let name = url.as_str();
    let format = Format::from_name(url.path())?;
    if format != Format::Shapefile {
        return io::read_bytes(&fetch::fetch_bytes(url)?, format, name);
    }

    let shp = fetch::fetch_bytes(url)?;
    let dbf = fetch::fetch_bytes(&sidecar(url, "dbf"))?;
    let prj = fetch::fetch_optional(&sidecar(url, "prj"))?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    io::read_shapefile_parts(&shp, &dbf, prj.as_deref(), name)
}

/// Same URL with the extension swapped; an upper-case `.SHP` gives `.DBF`.
fn sidecar(url: &Url, ext: &str) -> Url {
    let mut sidecar = url.clone();
    if let Some((stem, current)) = url.path().rsplit_once('.') {
        let ext = if current.chars().any(|c| c.is_ascii_uppercase()) { ext.to_ascii_uppercase() } else { ext.to_string() };
        sidecar.set_path(&format!("{stem}.{ext}"));
    }
    sidecar
}
