use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{NewPatient, NewService, PatientUpdate, ServiceUpdate};
use crate::error::AppResult;
use crate::models::{Patient, Service};
use crate::state::AppState;

/// key: catalog-api -> patient endpoints
pub async fn register_patient(
    Extension(state): Extension<AppState>,
    Json(payload): Json<NewPatient>,
) -> AppResult<(StatusCode, Json<Patient>)> {
    let patient = state.catalog.register_patient(payload).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn list_patients(Extension(state): Extension<AppState>) -> AppResult<Json<Vec<Patient>>> {
    Ok(Json(state.catalog.list_patients().await?))
}

pub async fn get_patient(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Patient>> {
    Ok(Json(state.catalog.get_patient(id).await?))
}

pub async fn update_patient(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PatientUpdate>,
) -> AppResult<Json<Patient>> {
    Ok(Json(state.catalog.update_patient(id, payload).await?))
}

pub async fn deactivate_patient(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Patient>> {
    Ok(Json(state.catalog.deactivate_patient(id).await?))
}

/// key: catalog-api -> service endpoints
pub async fn create_service(
    Extension(state): Extension<AppState>,
    Json(payload): Json<NewService>,
) -> AppResult<(StatusCode, Json<Service>)> {
    let service = state.catalog.create_service(payload).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn list_services(Extension(state): Extension<AppState>) -> AppResult<Json<Vec<Service>>> {
    Ok(Json(state.catalog.list_services().await?))
}

pub async fn get_service(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Service>> {
    Ok(Json(state.catalog.get_service(id).await?))
}

pub async fn update_service(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ServiceUpdate>,
) -> AppResult<Json<Service>> {
    Ok(Json(state.catalog.update_service(id, payload).await?))
}

pub async fn deactivate_service(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.catalog.deactivate_service(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
