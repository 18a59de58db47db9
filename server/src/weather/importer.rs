use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::types::{ObservationsDocument, StationEntry, WeatherObservation};
use crate::config::Config;
use crate::database::{Database, DatabaseError};

/// Stations the fee service covers; everything else in the feed is skipped.
pub const TRACKED_STATIONS: [&str; 3] = ["Tallinn-Harku", "Tartu-Tõravere", "Pärnu"];

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("XML parsing failed: {0}")]
    XmlParsing(#[from] quick_xml::DeError),
    #[error("Invalid {field} for station {station}: {value:?}")]
    InvalidNumber {
        station: String,
        field: &'static str,
        value: String,
    },
    #[error("Invalid feed timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("Storing observations failed: {0}")]
    Storage(#[from] DatabaseError),
}

pub struct WeatherImporter {
    client: Client,
    feed_url: String,
    database: Arc<Database>,
}

impl WeatherImporter {
    pub fn new(config: &Config, database: Arc<Database>) -> Result<Self, ImportError> {
        let client = Client::builder()
            .user_agent("DeliveryFeeService/1.0")
            .timeout(Duration::from_secs(config.weather_http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            feed_url: config.weather_feed_url.clone(),
            database,
        })
    }

    /// One fetch-parse-persist cycle. A non-success HTTP status stores nothing
    /// and reports zero observations.
    pub async fn fetch_and_persist(&self) -> Result<usize, ImportError> {
        let observations = self.request_weather_data().await?;
        if observations.is_empty() {
            return Ok(0);
        }
        Ok(self.database.insert_observations(&observations).await?)
    }

    /// Runs a cycle and logs the outcome. Failures stay here.
    pub async fn run_import(&self) {
        match self.fetch_and_persist().await {
            Ok(count) => tracing::info!("Weather import stored {} observations", count),
            Err(e) => tracing::error!("Error importing weather data: {}", e),
        }
    }

    pub async fn request_weather_data(&self) -> Result<Vec<WeatherObservation>, ImportError> {
        let response = self.client.get(&self.feed_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Weather feed responded with HTTP {}, skipping this cycle", status);
            return Ok(Vec::new());
        }

        let body = response.text().await?;
        parse_observations(&body)
    }
}

pub fn is_tracked_station(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    TRACKED_STATIONS
        .iter()
        .any(|station| station.to_lowercase() == name)
}

/// Parses the observations feed, keeping only tracked stations. Every kept
/// observation carries the document-level timestamp.
pub fn parse_observations(xml: &str) -> Result<Vec<WeatherObservation>, ImportError> {
    let document: ObservationsDocument = quick_xml::de::from_str(xml)?;

    let tracked: Vec<&StationEntry> = document
        .stations
        .iter()
        .filter(|entry| is_tracked_station(&entry.name))
        .collect();
    if tracked.is_empty() {
        return Ok(Vec::new());
    }

    let observed_at = parse_feed_timestamp(&document.timestamp)?;

    tracked
        .into_iter()
        .map(|entry| to_observation(entry, observed_at))
        .collect()
}

fn parse_feed_timestamp(value: &str) -> Result<DateTime<Utc>, ImportError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| ImportError::InvalidTimestamp(value.to_string()))
}

fn to_observation(
    entry: &StationEntry,
    observed_at: DateTime<Utc>,
) -> Result<WeatherObservation, ImportError> {
    let station = entry.name.trim().to_string();

    Ok(WeatherObservation {
        air_temperature: parse_number(&station, "airtemperature", entry.airtemperature.as_deref())?,
        wind_speed: parse_number(&station, "windspeed", entry.windspeed.as_deref())?,
        wmo_code: entry
            .wmocode
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string),
        weather_phenomenon: entry
            .phenomenon
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        station_name: station,
        observed_at,
    })
}

fn parse_number(station: &str, field: &'static str, value: Option<&str>) -> Result<f64, ImportError> {
    let raw = value.unwrap_or_default();
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| ImportError::InvalidNumber {
            station: station.to_string(),
            field,
            value: raw.to_string(),
        })
}
