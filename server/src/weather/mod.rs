pub mod importer;
pub mod resolver;
pub mod types;

pub use importer::WeatherImporter;
pub use resolver::{canonical_station_name, resolve_observation, ResolveError};
pub use types::WeatherObservation;
