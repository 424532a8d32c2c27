//! Settlement between the clinic and the professional.
//!
//! Every billable record names who physically collected the money. The party
//! that collected owes the other its contractual share, and the report nets
//! those debts into a single balance.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Appointment, MonthlyCharge, Payer, PaymentMethod, ReferencePeriod, Subscription};
use crate::store::Stores;

/// `amount * pct / 100` rounded half-up to cents.
pub fn share(amount: Decimal, pct: Decimal) -> Decimal {
    (amount * pct / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Restricts the report to these services; empty means every service.
    #[serde(default)]
    pub service_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementKind {
    Appointment,
    MonthlyCharge,
}

/// key: reconciliation-item -> one collected payment and its signed adjustment
#[derive(Debug, Clone, Serialize)]
pub struct SettlementItem {
    pub date: NaiveDateTime,
    pub kind: SettlementKind,
    pub source_id: Uuid,
    pub patient_name: String,
    pub service_label: String,
    pub amount: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub payer: Option<Payer>,
    pub clinic_pct: Decimal,
    pub professional_pct: Decimal,
    pub clinic_share: Decimal,
    pub professional_share: Decimal,
    /// `None` while nobody is recorded as having collected the payment.
    pub adjustment: Option<Decimal>,
}

impl SettlementItem {
    #[allow(clippy::too_many_arguments)]
    fn new(
        date: NaiveDateTime,
        kind: SettlementKind,
        source_id: Uuid,
        patient_name: String,
        service_label: String,
        amount: Decimal,
        clinic_pct: Decimal,
        professional_pct: Decimal,
        payer: Option<Payer>,
        payment_method: Option<PaymentMethod>,
    ) -> Self {
        let clinic_share = share(amount, clinic_pct);
        let professional_share = share(amount, professional_pct);
        let adjustment = payer.map(|payer| match payer {
            Payer::Clinic => professional_share,
            Payer::Professional => -clinic_share,
        });
        Self {
            date,
            kind,
            source_id,
            patient_name,
            service_label,
            amount,
            payment_method,
            payer,
            clinic_pct,
            professional_pct,
            clinic_share,
            professional_share,
            adjustment,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.adjustment.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub items: Vec<SettlementItem>,
    /// Negative when the professional owes the clinic.
    pub balance_owed_to_professional: Decimal,
    pub gross_total: Decimal,
    pub professional_total: Decimal,
    pub clinic_total: Decimal,
    pub pending_count: usize,
}

impl SettlementReport {
    fn from_items(start: NaiveDate, end: NaiveDate, mut items: Vec<SettlementItem>) -> Self {
        items.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.kind.cmp(&b.kind))
                .then(a.patient_name.cmp(&b.patient_name))
        });

        let mut report = Self {
            start,
            end,
            items: Vec::new(),
            balance_owed_to_professional: Decimal::ZERO,
            gross_total: Decimal::ZERO,
            professional_total: Decimal::ZERO,
            clinic_total: Decimal::ZERO,
            pending_count: 0,
        };
        for item in &items {
            report.gross_total += item.amount;
            report.professional_total += item.professional_share;
            report.clinic_total += item.clinic_share;
            match item.adjustment {
                Some(adjustment) => report.balance_owed_to_professional += adjustment,
                None => report.pending_count += 1,
            }
        }
        report.items = items;
        report
    }
}

/// key: reconciliation-engine -> read-only settlement report
#[derive(Clone)]
pub struct ReconciliationService {
    stores: Stores,
}

impl ReconciliationService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn reconcile(&self, query: ReconciliationQuery) -> AppResult<SettlementReport> {
        if query.end < query.start {
            return Err(AppError::validation(
                "reconciliation end date must be on or after the start date",
            ));
        }
        let filter: HashSet<Uuid> = query.service_ids.iter().copied().collect();
        let mut lookup = Lookup::new(&self.stores);

        let window_start = start_of_day(query.start);
        let window_end = query
            .end
            .succ_opt()
            .map(start_of_day)
            .ok_or_else(|| AppError::validation("reconciliation end date is out of range"))?;
        let appointments: Vec<Appointment> = self
            .stores
            .appointments
            .list_in_range(window_start, window_end)
            .await?
            .into_iter()
            .filter(|appointment| appointment.charged_amount > Decimal::ZERO)
            .filter(|appointment| filter.is_empty() || filter.contains(&appointment.service_id))
            .collect();

        let mut items = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            let patient_name = lookup.patient_name(appointment.patient_id).await?;
            let service_label = lookup.service_name(appointment.service_id).await?;
            items.push(SettlementItem::new(
                appointment.start_time,
                SettlementKind::Appointment,
                appointment.id,
                patient_name,
                service_label,
                appointment.charged_amount,
                appointment.clinic_pct_snapshot,
                appointment.professional_pct_snapshot,
                appointment.payer,
                appointment.payment_method,
            ));
        }

        let charges = self
            .stores
            .charges
            .list_paid_in_period(ReferencePeriod::of(query.start), ReferencePeriod::of(query.end))
            .await?;
        for charge in charges {
            let Some(subscription) = lookup.subscription(charge.subscription_id).await? else {
                debug!(charge = %charge.id, "paid charge without subscription skipped");
                continue;
            };
            if !filter.is_empty() && !filter.contains(&subscription.service_id) {
                continue;
            }
            let patient_name = lookup.patient_name(subscription.patient_id).await?;
            let service_name = lookup.service_name(subscription.service_id).await?;
            items.push(charge_item(&charge, patient_name, &service_name));
        }

        let report = SettlementReport::from_items(query.start, query.end, items);
        info!(
            start = %query.start,
            end = %query.end,
            items = report.items.len(),
            pending = report.pending_count,
            balance = %report.balance_owed_to_professional,
            "reconciliation report built"
        );
        Ok(report)
    }
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

fn charge_item(charge: &MonthlyCharge, patient_name: String, service_name: &str) -> SettlementItem {
    let period = charge.period();
    let date = charge
        .payment_date
        .or_else(|| period.first_day())
        .map(start_of_day)
        .unwrap_or_default();
    SettlementItem::new(
        date,
        SettlementKind::MonthlyCharge,
        charge.id,
        patient_name,
        format!("Monthly plan {service_name} ({period})"),
        charge.amount,
        charge.clinic_pct_snapshot,
        charge.professional_pct_snapshot,
        charge.payer,
        charge.payment_method,
    )
}

/// Per-report cache for names referenced by many items.
struct Lookup<'a> {
    stores: &'a Stores,
    patients: HashMap<Uuid, String>,
    services: HashMap<Uuid, String>,
    subscriptions: HashMap<Uuid, Option<Subscription>>,
}

impl<'a> Lookup<'a> {
    fn new(stores: &'a Stores) -> Self {
        Self {
            stores,
            patients: HashMap::new(),
            services: HashMap::new(),
            subscriptions: HashMap::new(),
        }
    }

    async fn patient_name(&mut self, id: Uuid) -> AppResult<String> {
        if let Some(name) = self.patients.get(&id) {
            return Ok(name.clone());
        }
        let name = match self.stores.patients.find_by_id(id).await? {
            Some(patient) => patient.name,
            None => format!("unknown patient {id}"),
        };
        self.patients.insert(id, name.clone());
        Ok(name)
    }

    async fn service_name(&mut self, id: Uuid) -> AppResult<String> {
        if let Some(name) = self.services.get(&id) {
            return Ok(name.clone());
        }
        let name = match self.stores.services.find_by_id(id).await? {
            Some(service) => service.name,
            None => format!("unknown service {id}"),
        };
        self.services.insert(id, name.clone());
        Ok(name)
    }

    async fn subscription(&mut self, id: Uuid) -> AppResult<Option<Subscription>> {
        if let Some(found) = self.subscriptions.get(&id) {
            return Ok(found.clone());
        }
        let found = self.stores.subscriptions.find_by_id(id).await?;
        self.subscriptions.insert(id, found.clone());
        Ok(found)
    }
}
