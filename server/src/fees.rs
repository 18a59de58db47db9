use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::weather::types::WeatherObservation;

const SNOW_OR_SLEET_KEYWORDS: &[&str] = &["snow", "sleet", "snowfall", "snow shower", "snow flurries"];
const RAIN_KEYWORDS: &[&str] = &["rain", "drizzle", "rainfall", "rain shower", "light rain", "heavy rain"];
const GLAZE_HAIL_OR_THUNDER_KEYWORDS: &[&str] = &["glaze", "hail", "thunder", "thunderstorm"];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageForbidden {
    #[error("Usage of selected vehicle type is forbidden: wind speed above 20 m/s")]
    WindSpeed,
    #[error("Usage of selected vehicle type is forbidden: glaze, hail or thunder")]
    WeatherPhenomenon,
}

/// Vehicle classes the weather rules distinguish between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleClass {
    Bike,
    Scooter,
    Other,
}

impl VehicleClass {
    pub fn from_name(vehicle_type: &str) -> Self {
        let vehicle_type = vehicle_type.trim();
        if vehicle_type.eq_ignore_ascii_case("bike") {
            VehicleClass::Bike
        } else if vehicle_type.eq_ignore_ascii_case("scooter") {
            VehicleClass::Scooter
        } else {
            VehicleClass::Other
        }
    }

    fn is_exposed(self) -> bool {
        matches!(self, VehicleClass::Bike | VehicleClass::Scooter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhenomenonClass {
    SnowOrSleet,
    Rain,
    GlazeHailOrThunder,
    Clear,
}

impl PhenomenonClass {
    /// Classifies free-text phenomena; snow beats rain beats glaze/hail/thunder.
    pub fn classify(phenomenon: &str) -> Self {
        let phenomenon = phenomenon.to_lowercase();
        let contains_any = |keywords: &[&str]| keywords.iter().any(|k| phenomenon.contains(k));

        if contains_any(SNOW_OR_SLEET_KEYWORDS) {
            PhenomenonClass::SnowOrSleet
        } else if contains_any(RAIN_KEYWORDS) {
            PhenomenonClass::Rain
        } else if contains_any(GLAZE_HAIL_OR_THUNDER_KEYWORDS) {
            PhenomenonClass::GlazeHailOrThunder
        } else {
            PhenomenonClass::Clear
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    #[serde(with = "rust_decimal::serde::float")]
    pub regional_base_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub air_temperature_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub wind_speed_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub weather_phenomenon_fee: Decimal,
}

impl FeeBreakdown {
    pub fn total(&self) -> Decimal {
        self.regional_base_fee
            .saturating_add(self.air_temperature_fee)
            .saturating_add(self.wind_speed_fee)
            .saturating_add(self.weather_phenomenon_fee)
    }
}

fn half() -> Decimal {
    Decimal::new(5, 1)
}

pub fn air_temperature_fee(vehicle: VehicleClass, air_temperature: f64) -> Decimal {
    if !vehicle.is_exposed() {
        return Decimal::ZERO;
    }
    if air_temperature < -10.0 {
        Decimal::ONE
    } else if air_temperature < 0.0 {
        half()
    } else {
        Decimal::ZERO
    }
}

pub fn wind_speed_fee(vehicle: VehicleClass, wind_speed: f64) -> Result<Decimal, UsageForbidden> {
    if vehicle != VehicleClass::Bike {
        return Ok(Decimal::ZERO);
    }
    if wind_speed > 20.0 {
        Err(UsageForbidden::WindSpeed)
    } else if wind_speed >= 10.0 {
        Ok(half())
    } else {
        Ok(Decimal::ZERO)
    }
}

pub fn weather_phenomenon_fee(
    vehicle: VehicleClass,
    phenomenon: &str,
) -> Result<Decimal, UsageForbidden> {
    if !vehicle.is_exposed() {
        return Ok(Decimal::ZERO);
    }
    match PhenomenonClass::classify(phenomenon) {
        PhenomenonClass::SnowOrSleet => Ok(Decimal::ONE),
        PhenomenonClass::Rain => Ok(half()),
        PhenomenonClass::GlazeHailOrThunder => Err(UsageForbidden::WeatherPhenomenon),
        PhenomenonClass::Clear => Ok(Decimal::ZERO),
    }
}

/// Applies the weather surcharges on top of the regional base fee
/// (city base fee + vehicle base fee).
///
/// All or nothing: when wind or phenomenon forbids the vehicle no partial
/// fee is produced. Wind is checked before the phenomenon.
pub fn calculate_fee(
    city_base_fee: Decimal,
    vehicle_base_fee: Decimal,
    vehicle_type: &str,
    observation: &WeatherObservation,
) -> Result<FeeBreakdown, UsageForbidden> {
    let vehicle = VehicleClass::from_name(vehicle_type);

    let air_temperature_fee = air_temperature_fee(vehicle, observation.air_temperature);
    let wind_speed_fee = wind_speed_fee(vehicle, observation.wind_speed)?;
    let weather_phenomenon_fee = weather_phenomenon_fee(vehicle, &observation.weather_phenomenon)?;

    Ok(FeeBreakdown {
        regional_base_fee: city_base_fee.saturating_add(vehicle_base_fee),
        air_temperature_fee,
        wind_speed_fee,
        weather_phenomenon_fee,
    })
}
