use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::fees::UsageForbidden;
use crate::scheduler::ScheduleError;
use crate::weather::ResolveError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Vehicle type not found: {0}")]
    VehicleTypeNotFound(String),

    #[error("No weather data found for {0}")]
    WeatherDataNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error(transparent)]
    UsageForbidden(#[from] UsageForbidden),

    #[error(transparent)]
    InvalidSchedule(#[from] ScheduleError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::CityNotFound(city) => AppError::CityNotFound(city),
            DatabaseError::VehicleTypeNotFound(vehicle) => AppError::VehicleTypeNotFound(vehicle),
            other => AppError::Database(other),
        }
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { station, at: None } => AppError::WeatherDataNotFound(station),
            ResolveError::NotFound { station, at: Some(at) } => {
                AppError::WeatherDataNotFound(format!("{} at or before {}", station, at.to_rfc3339()))
            }
            ResolveError::Storage(e) => e.into(),
        }
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::CityNotFound(_) => (StatusCode::NOT_FOUND, "CITY_NOT_FOUND"),
            AppError::VehicleTypeNotFound(_) => (StatusCode::NOT_FOUND, "VEHICLE_TYPE_NOT_FOUND"),
            AppError::WeatherDataNotFound(_) => (StatusCode::NOT_FOUND, "WEATHER_DATA_NOT_FOUND"),
            AppError::ResourceNotFound(_) => (StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND"),
            AppError::UsageForbidden(_) => (StatusCode::UNPROCESSABLE_ENTITY, "USAGE_FORBIDDEN"),
            AppError::InvalidSchedule(_) => (StatusCode::BAD_REQUEST, "INVALID_CRON_EXPRESSION"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response()
    }
}
