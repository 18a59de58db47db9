use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::WeatherObservation;
use crate::database::{Database, DatabaseError};

// Generic city labels and the weather station that serves them
const CITY_ALIASES: &[(&str, &str)] = &[
    ("Tallinn", "Tallinn-Harku"),
    ("Tartu", "Tartu-Tõravere"),
];

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No weather data found for {station}")]
    NotFound {
        station: String,
        at: Option<DateTime<Utc>>,
    },
    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// Maps "Tallinn"/"Tartu" (any case) to their station names; other names pass through.
pub fn canonical_station_name(city: &str) -> &str {
    let trimmed = city.trim();
    CITY_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(trimmed))
        .map(|(_, station)| *station)
        .unwrap_or(city)
}

/// Latest observation for the station, or the latest one at or before `at`.
pub async fn resolve_observation(
    database: &Database,
    station: &str,
    at: Option<DateTime<Utc>>,
) -> Result<WeatherObservation, ResolveError> {
    let observation = match at {
        Some(at) => database.observation_at_or_before(station, at).await?,
        None => database.latest_observation(station).await?,
    };

    observation.ok_or_else(|| ResolveError::NotFound {
        station: station.to_string(),
        at,
    })
}
