use anyhow::{Context, Result};
use vtlivability::{census::VariableDictionary, fetch, memo::MemoCache};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::DictionaryArgs) -> Result<()> {
    let config = super::config(cli)?;
    let location = args.url.clone().unwrap_or(config.census.dictionary_url);
    let url = fetch::resolve_location(&location)
        .with_context(|| format!("[dictionary] bad location {location}"))?;

    let dict = VariableDictionary::fetch(&url, &MemoCache::global())?;
    log::info!("[dictionary] {} variables", dict.len());
    for (code, label) in dict.iter() {
        println!("{code}\t{}\t{}\t{}\t{}", label.measure, label.category, label.subcategory, label.variable);
    }
    Ok(())
}
