use std::path::PathBuf;

/// Vermont livability data tools
#[derive(clap::Parser, Debug)]
#[command(name = "vtlivability", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON configuration file
    #[arg(short, long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Read, clean and promote a file, then print its column types
    Inspect(InspectArgs),

    /// Fetch the ACS variable dictionary and print one variable per line
    Dictionary(DictionaryArgs),

    /// Colour a numeric attribute of a geospatial file
    Choropleth(ChoroplethArgs),

    /// Copy donor attributes onto target features by largest overlap
    Enrich(EnrichArgs),

    /// Load a registry entry from the configuration
    Load(LoadArgs),
}

#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    /// Input file (.csv, .json, .xlsx, .sav, .geojson, .fgb, .shp, .zip)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct DictionaryArgs {
    /// Dictionary page, defaults to the configured ACS profile variables
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ChoroplethArgs {
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub file: PathBuf,

    /// Numeric column to colour by
    #[arg(long)]
    pub column: String,

    /// jenks, outlier_holdout or outlier_yellow
    #[arg(long)]
    pub strategy: Option<String>,

    #[arg(long)]
    pub classes: Option<usize>,

    #[arg(long)]
    pub colormap: Option<String>,

    /// Write the colorbar legend here (continuous strategies)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub legend: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct EnrichArgs {
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub target: PathBuf,

    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub donor: PathBuf,

    /// Donor columns to copy, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub columns: Vec<String>,

    /// Output GeoJSON file
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct LoadArgs {
    /// Registry entry name
    pub name: String,
}
