use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use uuid::Uuid;

use super::{AppointmentUpdate, BookingOutcome, BookingRequest};
use crate::error::{AppError, AppResult};
use crate::models::Appointment;
use crate::state::AppState;

/// key: booking-api -> single and recurring booking
pub async fn book_appointment(
    Extension(state): Extension<AppState>,
    Json(payload): Json<BookingRequest>,
) -> AppResult<(StatusCode, Json<BookingOutcome>)> {
    let outcome = state.booking.book_appointment(payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

pub async fn list_appointments(
    Extension(state): Extension<AppState>,
    Query(range): Query<AppointmentRange>,
) -> AppResult<Json<Vec<Appointment>>> {
    let range = match (range.start, range.end) {
        (Some(start), Some(end)) => Some((start, end)),
        (None, None) => None,
        _ => {
            return Err(AppError::validation(
                "both start and end are required to filter appointments",
            ))
        }
    };
    Ok(Json(state.booking.list_appointments(range).await?))
}

pub async fn get_appointment(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Appointment>> {
    Ok(Json(state.booking.get_appointment(id).await?))
}

pub async fn list_patient_appointments(
    Extension(state): Extension<AppState>,
    Path(patient_id): Path<Uuid>,
) -> AppResult<Json<Vec<Appointment>>> {
    Ok(Json(
        state.booking.list_patient_appointments(patient_id).await?,
    ))
}

pub async fn update_appointment(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AppointmentUpdate>,
) -> AppResult<Json<Appointment>> {
    Ok(Json(state.booking.update_appointment(id, payload).await?))
}

pub async fn delete_appointment(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.booking.delete_appointment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
