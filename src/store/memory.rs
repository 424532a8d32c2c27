use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use dashmap::DashMap;
use uuid::Uuid;

use super::{AppointmentStore, ChargeStore, PatientStore, ServiceStore, SubscriptionStore};
use crate::models::{
    Appointment, ChargeStatus, MonthlyCharge, Patient, ReferencePeriod, Service, Subscription,
};

/// key: store-memory -> process-local adapter for tests and `STORE_BACKEND=memory`
#[derive(Default)]
pub struct MemoryStore {
    patients: DashMap<Uuid, Patient>,
    services: DashMap<Uuid, Service>,
    appointments: DashMap<Uuid, Appointment>,
    subscriptions: DashMap<Uuid, Subscription>,
    charges: DashMap<Uuid, MonthlyCharge>,
}

fn collect<T: Clone>(map: &DashMap<Uuid, T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    map.iter()
        .filter(|entry| keep(entry.value()))
        .map(|entry| entry.value().clone())
        .collect()
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>> {
        Ok(self.patients.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_tax_id(&self, tax_id: &str) -> Result<Option<Patient>> {
        Ok(collect(&self.patients, |patient| patient.tax_id == tax_id)
            .into_iter()
            .next())
    }

    async fn save(&self, patient: &Patient) -> Result<Patient> {
        self.patients.insert(patient.id, patient.clone());
        Ok(patient.clone())
    }

    async fn list_all(&self) -> Result<Vec<Patient>> {
        let mut patients = collect(&self.patients, |_| true);
        patients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(patients)
    }
}

#[async_trait]
impl ServiceStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Service>> {
        Ok(self.services.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Service>> {
        Ok(self
            .services
            .get(&id)
            .map(|entry| entry.value().clone())
            .filter(|service| service.active))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Service>> {
        Ok(collect(&self.services, |service| service.name == name)
            .into_iter()
            .next())
    }

    async fn save(&self, service: &Service) -> Result<Service> {
        self.services.insert(service.id, service.clone());
        Ok(service.clone())
    }

    async fn list_all(&self) -> Result<Vec<Service>> {
        let mut services = collect(&self.services, |_| true);
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool> {
        Ok(match self.services.get_mut(&id) {
            Some(mut entry) => {
                entry.active = false;
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn save(&self, appointment: &Appointment) -> Result<Appointment> {
        self.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        Ok(self.appointments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_all(&self) -> Result<Vec<Appointment>> {
        let mut appointments = collect(&self.appointments, |_| true);
        appointments.sort_by_key(|appointment| appointment.start_time);
        Ok(appointments)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.appointments.remove(&id).is_some())
    }

    async fn list_in_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>> {
        let mut appointments = collect(&self.appointments, |appointment| {
            appointment.start_time >= start && appointment.start_time < end
        });
        appointments.sort_by_key(|appointment| appointment.start_time);
        Ok(appointments)
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>> {
        let mut appointments = collect(&self.appointments, |appointment| {
            appointment.patient_id == patient_id
        });
        appointments.sort_by_key(|appointment| appointment.start_time);
        Ok(appointments)
    }

    async fn list_conflicts_in_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>> {
        Ok(collect(&self.appointments, |appointment| {
            appointment.overlaps(start, end)
        }))
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn save(&self, subscription: &Subscription) -> Result<Subscription> {
        self.subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(subscription.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>> {
        Ok(self
            .subscriptions
            .get(&id)
            .map(|entry| entry.value().clone()))
    }

    async fn list_all(&self) -> Result<Vec<Subscription>> {
        let mut subscriptions = collect(&self.subscriptions, |_| true);
        subscriptions.sort_by_key(|subscription| subscription.start_date);
        Ok(subscriptions)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.subscriptions.remove(&id).is_some())
    }

    async fn find_active_for_patient_and_service(
        &self,
        patient_id: Uuid,
        service_id: Uuid,
    ) -> Result<Option<Subscription>> {
        Ok(collect(&self.subscriptions, |subscription| {
            subscription.active
                && subscription.patient_id == patient_id
                && subscription.service_id == service_id
        })
        .into_iter()
        .next())
    }

    async fn list_active(&self) -> Result<Vec<Subscription>> {
        let mut subscriptions = collect(&self.subscriptions, |subscription| subscription.active);
        subscriptions.sort_by_key(|subscription| subscription.start_date);
        Ok(subscriptions)
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Subscription>> {
        let mut subscriptions = collect(&self.subscriptions, |subscription| {
            subscription.patient_id == patient_id
        });
        subscriptions.sort_by_key(|subscription| subscription.start_date);
        Ok(subscriptions)
    }
}

#[async_trait]
impl ChargeStore for MemoryStore {
    async fn save(&self, charge: &MonthlyCharge) -> Result<MonthlyCharge> {
        self.charges.insert(charge.id, charge.clone());
        Ok(charge.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MonthlyCharge>> {
        Ok(self.charges.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_all(&self) -> Result<Vec<MonthlyCharge>> {
        let mut charges = collect(&self.charges, |_| true);
        charges.sort_by_key(|charge| (charge.period(), charge.created_at));
        Ok(charges)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.charges.remove(&id).is_some())
    }

    async fn find_by_key(
        &self,
        subscription_id: Uuid,
        period: ReferencePeriod,
    ) -> Result<Option<MonthlyCharge>> {
        Ok(collect(&self.charges, |charge| {
            charge.subscription_id == subscription_id && charge.period() == period
        })
        .into_iter()
        .next())
    }

    async fn list_paid_in_period(
        &self,
        from: ReferencePeriod,
        to: ReferencePeriod,
    ) -> Result<Vec<MonthlyCharge>> {
        let mut charges = collect(&self.charges, |charge| {
            charge.status == ChargeStatus::Paid && charge.period() >= from && charge.period() <= to
        });
        charges.sort_by_key(|charge| (charge.period(), charge.payment_date));
        Ok(charges)
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> Result<Vec<MonthlyCharge>> {
        let mut charges = collect(&self.charges, |charge| {
            charge.subscription_id == subscription_id
        });
        charges.sort_by_key(|charge| charge.period());
        Ok(charges)
    }

    async fn list_pending_due(&self, up_to: ReferencePeriod) -> Result<Vec<MonthlyCharge>> {
        let mut charges = collect(&self.charges, |charge| {
            charge.status == ChargeStatus::Pending && charge.period() <= up_to
        });
        charges.sort_by_key(|charge| charge.period());
        Ok(charges)
    }
}
