use anyhow::Result;
use vtlivability::Loader;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::LoadArgs) -> Result<()> {
    let config = super::config(cli)?;
    let loader = Loader::from_config(&config)?;
    let dataset = loader.load(&args.name)?;

    println!("{}: {} rows", args.name, dataset.height());
    for (name, kind) in dataset.schema() {
        println!("{name}\t{}", kind.as_str());
    }
    Ok(())
}
