use std::fs;

use anyhow::{Context, Result};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::EnrichArgs) -> Result<()> {
    let config = super::config(cli)?;
    let target = super::geospatial(&args.target, &config)?;
    let donor = super::geospatial(&args.donor, &config)?;

    let columns: Vec<&str> = args.columns.iter().map(|c| c.trim()).collect();
    let enriched = vtlivability::largest_intersection(&target, &donor, &columns)?;

    let json = serde_json::to_string(&enriched.to_geojson()?)?;
    fs::write(&args.output, json)
        .with_context(|| format!("[enrich] failed to write {}", args.output.display()))?;
    println!("[enrich] wrote {} features to {}", enriched.height(), args.output.display());
    Ok(())
}
