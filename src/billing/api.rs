use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    ChargeSettlement, MonthlySummary, NewSubscription, ReconciliationQuery, SettlementReport,
};
use crate::error::{AppError, AppResult};
use crate::models::{MonthlyCharge, Subscription};
use crate::state::AppState;

/// key: billing-api -> subscription endpoints
pub async fn create_subscription(
    Extension(state): Extension<AppState>,
    Json(payload): Json<NewSubscription>,
) -> AppResult<(StatusCode, Json<Subscription>)> {
    let subscription = state
        .subscriptions
        .create_subscription(payload, Utc::now().date_naive())
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn list_subscriptions(
    Extension(state): Extension<AppState>,
) -> AppResult<Json<Vec<Subscription>>> {
    Ok(Json(state.subscriptions.list_subscriptions().await?))
}

pub async fn get_subscription(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Subscription>> {
    Ok(Json(state.subscriptions.get_subscription(id).await?))
}

pub async fn cancel_subscription(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Subscription>> {
    Ok(Json(
        state
            .subscriptions
            .cancel_subscription(id, Utc::now())
            .await?,
    ))
}

pub async fn list_patient_subscriptions(
    Extension(state): Extension<AppState>,
    Path(patient_id): Path<Uuid>,
) -> AppResult<Json<Vec<Subscription>>> {
    Ok(Json(
        state
            .subscriptions
            .list_patient_subscriptions(patient_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct GenerateChargesRequest {
    pub month: i32,
    pub year: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateChargesResponse {
    pub generated: usize,
}

/// key: billing-api -> manual trigger for monthly generation
pub async fn generate_charges(
    Extension(state): Extension<AppState>,
    Json(payload): Json<GenerateChargesRequest>,
) -> AppResult<Json<GenerateChargesResponse>> {
    let generated = state
        .billing
        .generate_monthly_charges(payload.month, payload.year)
        .await?;
    Ok(Json(GenerateChargesResponse { generated }))
}

pub async fn list_charges(
    Extension(state): Extension<AppState>,
) -> AppResult<Json<Vec<MonthlyCharge>>> {
    Ok(Json(state.billing.list_charges().await?))
}

pub async fn get_charge(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MonthlyCharge>> {
    Ok(Json(state.billing.get_charge(id).await?))
}

pub async fn update_charge(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChargeSettlement>,
) -> AppResult<Json<MonthlyCharge>> {
    Ok(Json(state.billing.update_charge(id, payload).await?))
}

pub async fn list_subscription_charges(
    Extension(state): Extension<AppState>,
    Path(subscription_id): Path<Uuid>,
) -> AppResult<Json<Vec<MonthlyCharge>>> {
    Ok(Json(
        state
            .billing
            .list_subscription_charges(subscription_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ReconciliationParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Comma separated service ids.
    #[serde(default)]
    pub services: Option<String>,
}

impl ReconciliationParams {
    fn into_query(self) -> AppResult<ReconciliationQuery> {
        let service_ids = self
            .services
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                Uuid::parse_str(raw)
                    .map_err(|_| AppError::validation(format!("invalid service id {raw}")))
            })
            .collect::<AppResult<Vec<_>>>()?;
        Ok(ReconciliationQuery {
            start: self.start,
            end: self.end,
            service_ids,
        })
    }
}

/// key: billing-api -> settlement dataset for the external report renderer
pub async fn reconciliation(
    Extension(state): Extension<AppState>,
    Query(params): Query<ReconciliationParams>,
) -> AppResult<Json<SettlementReport>> {
    let query = params.into_query()?;
    Ok(Json(state.reconciliation.reconcile(query).await?))
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub month: i32,
    pub year: i32,
}

pub async fn monthly_summary(
    Extension(state): Extension<AppState>,
    Query(params): Query<SummaryParams>,
) -> AppResult<Json<MonthlySummary>> {
    Ok(Json(
        state
            .dashboard
            .monthly_summary(params.month, params.year)
            .await?,
    ))
}
