use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherObservation {
    pub station_name: String,
    pub wmo_code: Option<String>,
    pub air_temperature: f64,
    pub wind_speed: f64,
    pub weather_phenomenon: String,
    pub observed_at: DateTime<Utc>,
}

// Feed document as published by the Estonian Environment Agency:
// <observations timestamp="..."><station><name/>...</station>...</observations>
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationsDocument {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    #[serde(rename = "station", default)]
    pub stations: Vec<StationEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationEntry {
    pub name: String,
    #[serde(default)]
    pub wmocode: Option<String>,
    #[serde(default)]
    pub airtemperature: Option<String>,
    #[serde(default)]
    pub windspeed: Option<String>,
    #[serde(default)]
    pub phenomenon: Option<String>,
}
