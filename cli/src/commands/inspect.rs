use anyhow::Result;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::InspectArgs) -> Result<()> {
    let config = super::config(cli)?;
    let dataset = super::prepare(&args.file, &config)?;

    println!("{}: {} rows", args.file.display(), dataset.height());
    if let Some(geo) = dataset.as_geo() {
        println!("crs: EPSG:{}", geo.epsg());
    }
    for (name, kind) in dataset.schema() {
        println!("{name}\t{}", kind.as_str());
    }
    Ok(())
}
