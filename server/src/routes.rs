use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    database::{CityFee, Database, DatabaseError, VehicleFee},
    delivery::{calculate_delivery_fee, DeliveryFee},
    error::{AppError, AppResult},
    scheduler::{ImportScheduler, ScheduleStatus},
    utils::{parse_fee, parse_request_timestamp},
    weather::canonical_station_name,
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Database>,
    pub scheduler: Arc<ImportScheduler>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuery {
    pub city: String,
    pub vehicle_type: String,
    pub datetime: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronQuery {
    pub cron_expression: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityFeeQuery {
    pub city_name: String,
    pub fee: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleFeeQuery {
    pub vehicle_type: String,
    pub fee: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

// Route handlers
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match state.database.health_check().await {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable".to_string())
        }
    };

    let overall = if status == StatusCode::OK { "healthy" } else { "degraded" };

    (
        status,
        Json(HealthResponse {
            status: overall.to_string(),
            database,
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

pub async fn fee_request(
    State(state): State<AppState>,
    Query(params): Query<FeeQuery>,
) -> AppResult<Json<DeliveryFee>> {
    let at = params
        .datetime
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(parse_request_timestamp)
        .transpose()
        .map_err(AppError::Validation)?;

    let quote = calculate_delivery_fee(&state.database, &params.city, &params.vehicle_type, at).await?;
    Ok(Json(quote))
}

pub async fn get_schedule(State(state): State<AppState>) -> Json<ScheduleStatus> {
    Json(state.scheduler.status().await)
}

pub async fn set_schedule(
    State(state): State<AppState>,
    Query(params): Query<CronQuery>,
) -> AppResult<Json<ScheduleStatus>> {
    let status = state.scheduler.set_schedule(&params.cron_expression).await?;
    Ok(Json(status))
}

pub async fn start_import(State(state): State<AppState>) -> Json<ScheduleStatus> {
    Json(state.scheduler.start().await)
}

pub async fn stop_import(State(state): State<AppState>) -> Json<ScheduleStatus> {
    Json(state.scheduler.stop().await)
}

pub async fn run_import(State(state): State<AppState>) -> StatusCode {
    state.scheduler.trigger_now();
    StatusCode::ACCEPTED
}

pub async fn set_city_fee(
    State(state): State<AppState>,
    Query(params): Query<CityFeeQuery>,
) -> AppResult<Json<CityFee>> {
    let fee = parse_fee(&params.fee).map_err(AppError::Validation)?;
    let city = canonical_station_name(&params.city_name);

    match state.database.update_city_fee(city, fee).await {
        Ok(updated) => {
            tracing::info!("Base fee for {} set to {}", updated.city_name, updated.base_fee);
            Ok(Json(updated))
        }
        Err(DatabaseError::CityNotFound(_)) => Err(AppError::ResourceNotFound(format!(
            "City not found: {}",
            params.city_name
        ))),
        Err(e) => Err(e.into()),
    }
}

pub async fn set_vehicle_fee(
    State(state): State<AppState>,
    Query(params): Query<VehicleFeeQuery>,
) -> AppResult<Json<VehicleFee>> {
    let fee = parse_fee(&params.fee).map_err(AppError::Validation)?;

    match state.database.update_vehicle_fee(&params.vehicle_type, fee).await {
        Ok(updated) => {
            tracing::info!("Base fee for {} set to {}", updated.vehicle_type, updated.base_fee);
            Ok(Json(updated))
        }
        Err(DatabaseError::VehicleTypeNotFound(_)) => Err(AppError::ResourceNotFound(format!(
            "Vehicle not found: {}",
            params.vehicle_type
        ))),
        Err(e) => Err(e.into()),
    }
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/delivery/feeRequest", get(fee_request))
        .route("/delivery/cron", get(get_schedule).post(set_schedule))
        .route("/delivery/import/start", post(start_import))
        .route("/delivery/import/stop", post(stop_import))
        .route("/delivery/import/run", post(run_import))
        .route("/delivery/city/setFee", post(set_city_fee))
        .route("/delivery/vehicle/setFee", post(set_vehicle_fee))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{in_memory_database, observation};
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let database = Arc::new(in_memory_database().await);
        database
            .insert_observations(&[
                observation("Tartu-Tõravere", -5.0, 15.0, "Light rain", 1_700_000_000),
                observation("Tallinn-Harku", 3.0, 4.0, "Overcast", 1_700_000_000),
                observation("Pärnu", 1.0, 25.0, "Clear", 1_700_000_000),
            ])
            .await
            .unwrap();

        let scheduler = ImportScheduler::new("0 0 0 1 1 *", || async {}).unwrap();

        AppState {
            database,
            scheduler: Arc::new(scheduler),
        }
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_fee_request_tartu_bike() {
        let app = create_router(test_state().await);

        let (status, body) = send(app, "GET", "/delivery/feeRequest?city=Tartu&vehicleType=Bike").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fee"], 4.0);
        assert_eq!(body["city"], "Tartu-Tõravere");
        assert_eq!(body["breakdown"]["windSpeedFee"], 0.5);
    }

    #[tokio::test]
    async fn test_fee_request_tallinn_car() {
        let app = create_router(test_state().await);

        let (status, body) = send(app, "GET", "/delivery/feeRequest?city=Tallinn&vehicleType=Car").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fee"], 4.0);
    }

    #[tokio::test]
    async fn test_fee_request_forbidden() {
        let app = create_router(test_state().await);

        let (status, body) = send(app, "GET", "/delivery/feeRequest?city=P%C3%A4rnu&vehicleType=bike").await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "USAGE_FORBIDDEN");
    }

    #[tokio::test]
    async fn test_fee_request_with_datetime() {
        let state = test_state().await;
        let app = create_router(state);

        let (status, body) = send(
            app.clone(),
            "GET",
            "/delivery/feeRequest?city=Tartu&vehicleType=Car&datetime=2023-11-14T22:13:20Z",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fee"], 3.5);

        let (status, body) = send(
            app.clone(),
            "GET",
            "/delivery/feeRequest?city=Tartu&vehicleType=Car&datetime=2020-01-01T00:00:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "WEATHER_DATA_NOT_FOUND");

        let (status, _) = send(app, "GET", "/delivery/feeRequest?city=Tartu&vehicleType=Car&datetime=soon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_fee_request_unknown_city_and_vehicle() {
        let app = create_router(test_state().await);

        let (status, body) = send(app.clone(), "GET", "/delivery/feeRequest?city=Narva&vehicleType=Car").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "CITY_NOT_FOUND");

        let (status, body) = send(app, "GET", "/delivery/feeRequest?city=Tartu&vehicleType=Boat").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "VEHICLE_TYPE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_set_schedule() {
        let state = test_state().await;
        let app = create_router(state.clone());

        let (status, body) = send(app.clone(), "POST", "/delivery/cron?cronExpression=0%200%20*%20*%20*%20*").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cronExpression"], "0 0 * * * *");
        assert_eq!(body["running"], true);

        let (status, body) = send(app, "POST", "/delivery/cron?cronExpression=whenever").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_CRON_EXPRESSION");
        assert_eq!(state.scheduler.status().await.cron_expression, "0 0 * * * *");

        state.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_start_stop_import() {
        let state = test_state().await;
        let app = create_router(state);

        let (status, body) = send(app.clone(), "POST", "/delivery/import/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["running"], true);

        let (_, body) = send(app.clone(), "GET", "/delivery/cron").await;
        assert_eq!(body["running"], true);

        let (_, body) = send(app.clone(), "POST", "/delivery/import/stop").await;
        assert_eq!(body["running"], false);

        let (status, _) = send(app, "POST", "/delivery/import/run").await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_set_city_fee() {
        let state = test_state().await;
        let app = create_router(state.clone());

        let (status, body) = send(app.clone(), "POST", "/delivery/city/setFee?cityName=tartu&fee=3.0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cityName"], "Tartu-Tõravere");
        assert_eq!(body["baseFee"], 3.0);

        let (_, body) = send(app.clone(), "GET", "/delivery/feeRequest?city=Tartu&vehicleType=Car").await;
        assert_eq!(body["fee"], 4.5);

        let (status, body) = send(app.clone(), "POST", "/delivery/city/setFee?cityName=Narva&fee=1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");

        let (status, _) = send(app.clone(), "POST", "/delivery/city/setFee?cityName=Tartu&fee=-2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            app.clone(),
            "POST",
            "/delivery/city/setFee?cityName=P%C3%A4rnu&fee=79228162514264337593543950335",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(app, "GET", "/delivery/feeRequest?city=P%C3%A4rnu&vehicleType=Car").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_vehicle_fee() {
        let app = create_router(test_state().await);

        let (status, body) = send(app.clone(), "POST", "/delivery/vehicle/setFee?vehicleType=Scooter&fee=1.25").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vehicleType"], "scooter");
        assert_eq!(body["baseFee"], 1.25);

        let (status, body) = send(app, "POST", "/delivery/vehicle/setFee?vehicleType=Truck&fee=1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(test_state().await);

        let (status, body) = send(app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
