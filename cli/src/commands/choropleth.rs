use std::fs;

use anyhow::{Context, Result};
use vtlivability::choropleth::Legend;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::ChoroplethArgs) -> Result<()> {
    let config = super::config(cli)?;
    let mut settings = config.choropleth.clone();
    if let Some(strategy) = &args.strategy { settings.strategy = strategy.parse()? }
    if let Some(classes) = args.classes { settings.classes = classes }
    if let Some(colormap) = &args.colormap { settings.colormap = colormap.clone() }

    let table = super::geospatial(&args.file, &config)?;
    let colouring = settings.colorize(&table, &args.column)?;
    if let Some(warning) = &colouring.warning {
        eprintln!("warning: {warning}");
    }

    for (row, color) in colouring.colors.iter().enumerate() {
        let [r, g, b, a] = color.to_array();
        println!("{row}\t{r}\t{g}\t{b}\t{a}");
    }

    match (&colouring.legend, &args.legend) {
        (Some(Legend::Colorbar { svg, .. }), Some(path)) => {
            fs::write(path, svg).with_context(|| format!("[choropleth] failed to write {}", path.display()))?;
            log::info!("[choropleth] legend written to {}", path.display());
        }
        (Some(Legend::Swatches(swatches)), _) => {
            for swatch in swatches {
                eprintln!("{}\t{}", swatch.color.to_hex(), swatch.label);
            }
        }
        _ => {}
    }
    Ok(())
}
