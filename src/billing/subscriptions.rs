use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Subscription;
use crate::store::Stores;

pub const MIN_DUE_DAY: i32 = 1;
pub const MAX_DUE_DAY: i32 = 28;

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubscription {
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub monthly_value: Decimal,
    pub due_day: i32,
    /// Defaults to the current day.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

/// key: subscription-service -> monthly plan lifecycle
#[derive(Clone)]
pub struct SubscriptionService {
    stores: Stores,
    // one active subscription per (patient, service) is a read-then-write check
    create_lock: Arc<Mutex<()>>,
}

impl SubscriptionService {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            create_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn create_subscription(
        &self,
        request: NewSubscription,
        today: NaiveDate,
    ) -> AppResult<Subscription> {
        info!(
            patient = %request.patient_id,
            service = %request.service_id,
            monthly_value = %request.monthly_value,
            due_day = request.due_day,
            "creating subscription"
        );

        let patient = self
            .stores
            .patients
            .find_by_id(request.patient_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("patient {}", request.patient_id)))?;
        if !patient.active {
            return Err(AppError::validation(format!(
                "patient {} is inactive",
                patient.id
            )));
        }

        let service = self
            .stores
            .services
            .find_by_id(request.service_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("service {}", request.service_id)))?;
        if !service.active {
            return Err(AppError::validation(format!(
                "service {} is inactive",
                service.id
            )));
        }

        if !(MIN_DUE_DAY..=MAX_DUE_DAY).contains(&request.due_day) {
            return Err(AppError::validation(format!(
                "due day must be between {MIN_DUE_DAY} and {MAX_DUE_DAY}"
            )));
        }
        if request.monthly_value.is_sign_negative() {
            return Err(AppError::validation("monthly value cannot be negative"));
        }

        let _guard = self.create_lock.lock().await;
        if self
            .stores
            .subscriptions
            .find_active_for_patient_and_service(patient.id, service.id)
            .await?
            .is_some()
        {
            return Err(AppError::validation(
                "an active subscription already exists for this patient and service",
            ));
        }

        let subscription = Subscription::new(
            patient.id,
            service.id,
            request.monthly_value,
            request.due_day,
            request.start_date.unwrap_or(today),
        );
        let saved = self.stores.subscriptions.save(&subscription).await?;
        info!(subscription = %saved.id, "subscription created");
        Ok(saved)
    }

    /// Idempotent: cancelling an inactive subscription changes nothing.
    pub async fn cancel_subscription(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        let mut subscription = self.get_subscription(id).await?;
        if !subscription.cancel(now) {
            info!(subscription = %id, "subscription already inactive");
            return Ok(subscription);
        }
        let saved = self.stores.subscriptions.save(&subscription).await?;
        info!(subscription = %id, "subscription cancelled");
        Ok(saved)
    }

    pub async fn get_subscription(&self, id: Uuid) -> AppResult<Subscription> {
        self.stores
            .subscriptions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("subscription {id}")))
    }

    pub async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>> {
        Ok(self.stores.subscriptions.list_all().await?)
    }

    pub async fn list_patient_subscriptions(&self, patient_id: Uuid) -> AppResult<Vec<Subscription>> {
        Ok(self.stores.subscriptions.list_by_patient(patient_id).await?)
    }
}
