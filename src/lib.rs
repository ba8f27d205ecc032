#![doc = "Vermont livability data core: ingestion, cleaning, Census tidying, cascading filters, choropleth colouring and spatial enrichment"]
pub mod census;
pub mod choropleth;
pub mod clean;
mod config;
pub mod crs;
mod enrich;
mod error;
pub mod fetch;
pub mod filter;
pub mod io;
pub mod memo;
pub mod promote;
pub mod registry;
mod table;

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use error::{Error, Result, Warning};

#[doc(inline)]
pub use table::{semantic_schema, Dataset, GeoTable, SemanticType, Tabular, WGS84};

#[doc(inline)]
pub use io::{read_bytes, read_from, read_path, Format};

#[doc(inline)]
pub use clean::{Cleaner, CleanerConfig};

#[doc(inline)]
pub use promote::{PromoteConfig, Promotion};

#[doc(inline)]
pub use filter::{CascadingFilter, FilterState, LevelSpec, ALL};

#[doc(inline)]
pub use choropleth::{ChoroplethConfig, Colouring, Strategy};

#[doc(inline)]
pub use enrich::largest_intersection;

#[doc(inline)]
pub use registry::{Loader, Registry};
