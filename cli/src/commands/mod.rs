pub mod choropleth;
pub mod dictionary;
pub mod enrich;
pub mod inspect;
pub mod load;

use std::path::Path;

use anyhow::{bail, Result};
use vtlivability::{Cleaner, Config, Dataset, GeoTable};

/// Configuration from `--config`, or defaults.
pub(crate) fn config(cli: &crate::cli::Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Ok(Config::from_path(path)?),
        None => Ok(Config::default()),
    }
}

/// Read, clean and promote a file; single-axis warnings go to stderr.
pub(crate) fn prepare(path: &Path, config: &Config) -> Result<Dataset> {
    let dataset = vtlivability::read_path(path)?;
    let cleaned = Cleaner::new(config.cleaner.clone()).clean_dataset(dataset)?;
    let promotion = config.promote.promote_dataset(cleaned)?;
    if let Some(warning) = &promotion.warning {
        eprintln!("warning: {warning}");
    }
    Ok(promotion.dataset)
}

pub(crate) fn geospatial(path: &Path, config: &Config) -> Result<GeoTable> {
    match prepare(path, config)? {
        Dataset::Geo(geo) => Ok(geo),
        Dataset::Table(_) => bail!("{} has no geometry or coordinate columns", path.display()),
    }
}
