use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::database::Database;
use crate::error::AppResult;
use crate::fees::{calculate_fee, FeeBreakdown};
use crate::weather::{canonical_station_name, resolve_observation, WeatherObservation};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFee {
    #[serde(with = "rust_decimal::serde::float")]
    pub fee: Decimal,
    pub city: String,
    pub vehicle_type: String,
    pub breakdown: FeeBreakdown,
    pub weather: WeatherObservation,
}

/// Fee for delivering in `city` with `vehicle_type`, using the weather
/// observed at `at` (or the latest observation when `at` is absent).
pub async fn calculate_delivery_fee(
    database: &Database,
    city: &str,
    vehicle_type: &str,
    at: Option<DateTime<Utc>>,
) -> AppResult<DeliveryFee> {
    let station = canonical_station_name(city);

    let city_fee = database.get_city_fee(station).await?;
    let vehicle_fee = database.get_vehicle_fee(vehicle_type).await?;
    let observation = resolve_observation(database, &city_fee.city_name, at).await?;

    let breakdown = match calculate_fee(
        city_fee.base_fee,
        vehicle_fee.base_fee,
        &vehicle_fee.vehicle_type,
        &observation,
    ) {
        Ok(breakdown) => breakdown,
        Err(reason) => {
            tracing::info!(
                "Refused {} delivery in {}: {}",
                vehicle_fee.vehicle_type,
                city_fee.city_name,
                reason
            );
            return Err(reason.into());
        }
    };

    Ok(DeliveryFee {
        fee: breakdown.total(),
        city: city_fee.city_name,
        vehicle_type: vehicle_fee.vehicle_type,
        breakdown,
        weather: observation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{in_memory_database, observation};
    use crate::error::AppError;
    use crate::fees::UsageForbidden;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_tartu_bike_with_general_rules() {
        let db = in_memory_database().await;
        db.insert_observations(&[observation("Tartu-Tõravere", -5.0, 15.0, "Light rain", 1_000)])
            .await
            .unwrap();

        let quote = calculate_delivery_fee(&db, "Tartu", "Bike", None).await.unwrap();

        assert_eq!(quote.fee, dec("4.0"));
        assert_eq!(quote.city, "Tartu-Tõravere");
        assert_eq!(quote.vehicle_type, "bike");
    }

    #[tokio::test]
    async fn test_tallinn_car_is_base_fee_only() {
        let db = in_memory_database().await;
        db.insert_observations(&[observation("Tallinn-Harku", -15.0, 25.0, "Thunderstorm", 1_000)])
            .await
            .unwrap();

        let quote = calculate_delivery_fee(&db, "tallinn", "CAR", None).await.unwrap();
        assert_eq!(quote.fee, dec("4.0"));
    }

    #[tokio::test]
    async fn test_forbidden_bike() {
        let db = in_memory_database().await;
        db.insert_observations(&[observation("Tartu-Tõravere", 2.0, 25.0, "Clear", 1_000)])
            .await
            .unwrap();

        let result = calculate_delivery_fee(&db, "Tartu", "Bike", None).await;
        assert!(matches!(
            result,
            Err(AppError::UsageForbidden(UsageForbidden::WindSpeed))
        ));
    }

    #[tokio::test]
    async fn test_historical_quote_uses_weather_at_time() {
        let db = in_memory_database().await;
        db.insert_observations(&[
            observation("Pärnu", 5.0, 3.0, "Clear", 1_000),
            observation("Pärnu", -12.0, 3.0, "Heavy snowfall", 2_000),
        ])
        .await
        .unwrap();

        let at = DateTime::<Utc>::from_timestamp(1_500, 0).unwrap();
        let earlier = calculate_delivery_fee(&db, "Pärnu", "Scooter", Some(at)).await.unwrap();
        assert_eq!(earlier.fee, dec("2.5"));

        let latest = calculate_delivery_fee(&db, "Pärnu", "Scooter", None).await.unwrap();
        assert_eq!(latest.fee, dec("4.5"));
        assert_eq!(latest.breakdown.air_temperature_fee, dec("1.0"));
        assert_eq!(latest.breakdown.weather_phenomenon_fee, dec("1.0"));
    }

    #[tokio::test]
    async fn test_not_found_cases() {
        let db = in_memory_database().await;

        assert!(matches!(
            calculate_delivery_fee(&db, "Narva", "Car", None).await,
            Err(AppError::CityNotFound(_))
        ));
        assert!(matches!(
            calculate_delivery_fee(&db, "Tartu", "Truck", None).await,
            Err(AppError::VehicleTypeNotFound(_))
        ));
        assert!(matches!(
            calculate_delivery_fee(&db, "Tartu", "Car", None).await,
            Err(AppError::WeatherDataNotFound(_))
        ));
    }
}
