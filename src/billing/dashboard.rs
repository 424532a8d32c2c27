use std::collections::BTreeSet;

use chrono::Months;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use super::reconciliation::share;
use crate::error::{AppError, AppResult};
use crate::models::{AppointmentStatus, ReferencePeriod};
use crate::store::Stores;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlySummary {
    pub period: ReferencePeriod,
    pub completed_appointments: usize,
    pub professional_revenue: Decimal,
    /// Sorted, distinct names of patients with PENDING charges up to `period`.
    pub pending_patients: Vec<String>,
}

/// key: billing-dashboard -> monthly activity and overdue overview
#[derive(Clone)]
pub struct DashboardService {
    stores: Stores,
}

impl DashboardService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn monthly_summary(&self, month: i32, year: i32) -> AppResult<MonthlySummary> {
        let period = ReferencePeriod::new(month, year).ok_or_else(|| {
            AppError::validation(format!("reference month must be 1-12, got {month}"))
        })?;
        let first = period
            .first_day()
            .ok_or_else(|| AppError::validation(format!("invalid reference period {period}")))?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| AppError::validation(format!("invalid reference period {period}")))?;
        let window_start = first.and_hms_opt(0, 0, 0).unwrap_or_default();
        let window_end = next.and_hms_opt(0, 0, 0).unwrap_or_default();

        let completed: Vec<_> = self
            .stores
            .appointments
            .list_in_range(window_start, window_end)
            .await?
            .into_iter()
            .filter(|appointment| appointment.status == AppointmentStatus::Completed)
            .collect();

        let per_visit: Decimal = completed
            .iter()
            .filter(|appointment| appointment.charged_amount > Decimal::ZERO)
            .map(|appointment| {
                share(appointment.charged_amount, appointment.professional_pct_snapshot)
            })
            .sum();

        let plans: Decimal = self
            .stores
            .charges
            .list_paid_in_period(period, period)
            .await?
            .iter()
            .map(|charge| share(charge.amount, charge.professional_pct_snapshot))
            .sum();
        debug!(%period, %per_visit, %plans, "professional revenue computed");

        let mut pending_patients = BTreeSet::new();
        for charge in self.stores.charges.list_pending_due(period).await? {
            let Some(subscription) = self
                .stores
                .subscriptions
                .find_by_id(charge.subscription_id)
                .await?
            else {
                continue;
            };
            if let Some(patient) = self.stores.patients.find_by_id(subscription.patient_id).await? {
                pending_patients.insert(patient.name);
            }
        }

        let summary = MonthlySummary {
            period,
            completed_appointments: completed.len(),
            professional_revenue: per_visit + plans,
            pending_patients: pending_patients.into_iter().collect(),
        };
        info!(
            %period,
            completed = summary.completed_appointments,
            revenue = %summary.professional_revenue,
            pending = summary.pending_patients.len(),
            "monthly summary built"
        );
        Ok(summary)
    }
}
