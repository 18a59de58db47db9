use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::str::FromStr;
use thiserror::Error;

use crate::utils::normalize_key;
use crate::weather::types::WeatherObservation;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),
    #[error("City not found: {0}")]
    CityNotFound(String),
    #[error("Vehicle type not found: {0}")]
    VehicleTypeNotFound(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

// (name, base fee) pairs inserted on first start
const DEFAULT_CITY_FEES: &[(&str, &str)] = &[
    ("Tallinn-Harku", "2.5"),
    ("Tartu-Tõravere", "2.0"),
    ("Pärnu", "1.5"),
];

const DEFAULT_VEHICLE_FEES: &[(&str, &str)] = &[
    ("car", "1.5"),
    ("scooter", "1.0"),
    ("bike", "0.5"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityFee {
    pub city_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_fee: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleFee {
    pub vehicle_type: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_fee: Decimal,
}

#[derive(sqlx::FromRow)]
struct FeeRow {
    name: String,
    base_fee: String,
}

impl FeeRow {
    fn decimal_fee(&self) -> Result<Decimal, DatabaseError> {
        Decimal::from_str(&self.base_fee).map_err(|_| {
            DatabaseError::InvalidData(format!(
                "base fee '{}' stored for '{}' is not a decimal",
                self.base_fee, self.name
            ))
        })
    }
}

#[derive(sqlx::FromRow)]
struct ObservationRow {
    station_name: String,
    wmo_code: Option<String>,
    air_temperature: f64,
    wind_speed: f64,
    phenomenon: String,
    observed_at: i64,
}

impl TryFrom<ObservationRow> for WeatherObservation {
    type Error = DatabaseError;

    fn try_from(row: ObservationRow) -> Result<Self, Self::Error> {
        let observed_at = DateTime::<Utc>::from_timestamp(row.observed_at, 0).ok_or_else(|| {
            DatabaseError::InvalidData(format!("observation timestamp {} out of range", row.observed_at))
        })?;

        Ok(WeatherObservation {
            station_name: row.station_name,
            wmo_code: row.wmo_code,
            air_temperature: row.air_temperature,
            wind_speed: row.wind_speed,
            weather_phenomenon: row.phenomenon,
            observed_at,
        })
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS city_fees (
                city_key TEXT PRIMARY KEY,
                city_name TEXT NOT NULL,
                base_fee TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vehicle_fees (
                vehicle_key TEXT PRIMARY KEY,
                vehicle_type TEXT NOT NULL,
                base_fee TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weather_observations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                station_key TEXT NOT NULL,
                station_name TEXT NOT NULL,
                wmo_code TEXT,
                air_temperature REAL NOT NULL,
                wind_speed REAL NOT NULL,
                phenomenon TEXT NOT NULL,
                observed_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_weather_station_time ON weather_observations(station_key, observed_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts the default base fees. Existing rows are left untouched so
    /// administrative updates survive restarts.
    pub async fn seed_default_fees(&self) -> Result<(), DatabaseError> {
        for (city, fee) in DEFAULT_CITY_FEES {
            sqlx::query(
                "INSERT OR IGNORE INTO city_fees (city_key, city_name, base_fee) VALUES ($1, $2, $3)",
            )
            .bind(normalize_key(city))
            .bind(*city)
            .bind(*fee)
            .execute(&self.pool)
            .await?;
        }

        for (vehicle, fee) in DEFAULT_VEHICLE_FEES {
            sqlx::query(
                "INSERT OR IGNORE INTO vehicle_fees (vehicle_key, vehicle_type, base_fee) VALUES ($1, $2, $3)",
            )
            .bind(normalize_key(vehicle))
            .bind(*vehicle)
            .bind(*fee)
            .execute(&self.pool)
            .await?;
        }

        tracing::debug!(
            "Default fees seeded ({} cities, {} vehicle types)",
            DEFAULT_CITY_FEES.len(),
            DEFAULT_VEHICLE_FEES.len()
        );
        Ok(())
    }

    // Base fees

    pub async fn get_city_fee(&self, city_name: &str) -> Result<CityFee, DatabaseError> {
        let row = sqlx::query_as::<_, FeeRow>(
            "SELECT city_name AS name, base_fee FROM city_fees WHERE city_key = $1",
        )
        .bind(normalize_key(city_name))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::CityNotFound(city_name.to_string()))?;

        Ok(CityFee {
            base_fee: row.decimal_fee()?,
            city_name: row.name,
        })
    }

    pub async fn get_vehicle_fee(&self, vehicle_type: &str) -> Result<VehicleFee, DatabaseError> {
        let row = sqlx::query_as::<_, FeeRow>(
            "SELECT vehicle_type AS name, base_fee FROM vehicle_fees WHERE vehicle_key = $1",
        )
        .bind(normalize_key(vehicle_type))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::VehicleTypeNotFound(vehicle_type.to_string()))?;

        Ok(VehicleFee {
            base_fee: row.decimal_fee()?,
            vehicle_type: row.name,
        })
    }

    pub async fn update_city_fee(
        &self,
        city_name: &str,
        base_fee: Decimal,
    ) -> Result<CityFee, DatabaseError> {
        let result = sqlx::query("UPDATE city_fees SET base_fee = $2 WHERE city_key = $1")
            .bind(normalize_key(city_name))
            .bind(base_fee.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::CityNotFound(city_name.to_string()));
        }

        self.get_city_fee(city_name).await
    }

    pub async fn update_vehicle_fee(
        &self,
        vehicle_type: &str,
        base_fee: Decimal,
    ) -> Result<VehicleFee, DatabaseError> {
        let result = sqlx::query("UPDATE vehicle_fees SET base_fee = $2 WHERE vehicle_key = $1")
            .bind(normalize_key(vehicle_type))
            .bind(base_fee.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::VehicleTypeNotFound(vehicle_type.to_string()));
        }

        self.get_vehicle_fee(vehicle_type).await
    }

    // Weather observations

    pub async fn insert_observations(
        &self,
        observations: &[WeatherObservation],
    ) -> Result<usize, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        for observation in observations {
            sqlx::query(
                r#"
                INSERT INTO weather_observations (
                    station_key, station_name, wmo_code, air_temperature,
                    wind_speed, phenomenon, observed_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(normalize_key(&observation.station_name))
            .bind(&observation.station_name)
            .bind(&observation.wmo_code)
            .bind(observation.air_temperature)
            .bind(observation.wind_speed)
            .bind(&observation.weather_phenomenon)
            .bind(observation.observed_at.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(observations.len())
    }

    pub async fn latest_observation(
        &self,
        station_name: &str,
    ) -> Result<Option<WeatherObservation>, DatabaseError> {
        let row = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT station_name, wmo_code, air_temperature, wind_speed, phenomenon, observed_at
            FROM weather_observations
            WHERE station_key = $1
            ORDER BY observed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(normalize_key(station_name))
        .fetch_optional(&self.pool)
        .await?;

        row.map(WeatherObservation::try_from).transpose()
    }

    pub async fn observation_at_or_before(
        &self,
        station_name: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<WeatherObservation>, DatabaseError> {
        let row = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT station_name, wmo_code, air_temperature, wind_speed, phenomenon, observed_at
            FROM weather_observations
            WHERE station_key = $1 AND observed_at <= $2
            ORDER BY observed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(normalize_key(station_name))
        .bind(at.timestamp())
        .fetch_optional(&self.pool)
        .await?;

        row.map(WeatherObservation::try_from).transpose()
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

// Single-connection in-memory store; a second connection would see an empty database.
#[cfg(test)]
pub async fn in_memory_database() -> Database {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let database = Database::new(pool);
    database.init_tables().await.unwrap();
    database.seed_default_fees().await.unwrap();
    database
}

#[cfg(test)]
pub fn observation(station: &str, temp: f64, wind: f64, phenomenon: &str, epoch: i64) -> WeatherObservation {
    WeatherObservation {
        station_name: station.to_string(),
        wmo_code: None,
        air_temperature: temp,
        wind_speed: wind,
        weather_phenomenon: phenomenon.to_string(),
        observed_at: DateTime::<Utc>::from_timestamp(epoch, 0).unwrap(),
    }
}
