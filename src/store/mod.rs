//! Persistence ports consumed by the booking and billing engines.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::models::{Appointment, MonthlyCharge, Patient, ReferencePeriod, Service, Subscription};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>>;
    async fn find_by_tax_id(&self, tax_id: &str) -> Result<Option<Patient>>;
    async fn save(&self, patient: &Patient) -> Result<Patient>;
    async fn list_all(&self) -> Result<Vec<Patient>>;
}

#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Service>>;
    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Service>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Service>>;
    async fn save(&self, service: &Service) -> Result<Service>;
    async fn list_all(&self) -> Result<Vec<Service>>;
    /// Returns `false` when no service has this id.
    async fn deactivate(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn save(&self, appointment: &Appointment) -> Result<Appointment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>>;
    async fn list_all(&self) -> Result<Vec<Appointment>>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
    /// Appointments starting in `[start, end)`, ordered by start.
    async fn list_in_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>>;
    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>>;
    /// Every appointment whose interval intersects `[start, end)`, any status.
    async fn list_conflicts_in_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn save(&self, subscription: &Subscription) -> Result<Subscription>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>>;
    async fn list_all(&self) -> Result<Vec<Subscription>>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn find_active_for_patient_and_service(
        &self,
        patient_id: Uuid,
        service_id: Uuid,
    ) -> Result<Option<Subscription>>;
    async fn list_active(&self) -> Result<Vec<Subscription>>;
    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Subscription>>;
}

#[async_trait]
pub trait ChargeStore: Send + Sync {
    async fn save(&self, charge: &MonthlyCharge) -> Result<MonthlyCharge>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MonthlyCharge>>;
    async fn list_all(&self) -> Result<Vec<MonthlyCharge>>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn find_by_key(
        &self,
        subscription_id: Uuid,
        period: ReferencePeriod,
    ) -> Result<Option<MonthlyCharge>>;
    /// PAID charges whose reference month lies within `[from, to]`.
    async fn list_paid_in_period(
        &self,
        from: ReferencePeriod,
        to: ReferencePeriod,
    ) -> Result<Vec<MonthlyCharge>>;
    async fn list_by_subscription(&self, subscription_id: Uuid) -> Result<Vec<MonthlyCharge>>;
    /// PENDING charges referring to `up_to` or any earlier month.
    async fn list_pending_due(&self, up_to: ReferencePeriod) -> Result<Vec<MonthlyCharge>>;
}

/// key: store-bundle -> injected adapters shared by every engine
#[derive(Clone)]
pub struct Stores {
    pub patients: Arc<dyn PatientStore>,
    pub services: Arc<dyn ServiceStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub charges: Arc<dyn ChargeStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self::from_adapter(Arc::new(MemoryStore::default()))
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_adapter(Arc::new(PgStore::new(pool)))
    }

    fn from_adapter<S>(adapter: Arc<S>) -> Self
    where
        S: PatientStore + ServiceStore + AppointmentStore + SubscriptionStore + ChargeStore + 'static,
    {
        Self {
            patients: adapter.clone(),
            services: adapter.clone(),
            appointments: adapter.clone(),
            subscriptions: adapter.clone(),
            charges: adapter,
        }
    }
}
