use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ChargeStatus, MonthlyCharge, Payer, PaymentMethod, ReferencePeriod};
use crate::snapshot::apply_split;
use crate::store::Stores;

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeSettlement {
    pub status: ChargeStatus,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub payer: Option<Payer>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

/// key: billing-service -> monthly charge generation and settlement
#[derive(Clone)]
pub struct BillingService {
    stores: Stores,
    // generation runs check-then-insert per subscription
    generation_lock: Arc<Mutex<()>>,
}

impl BillingService {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            generation_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates one PENDING charge per active subscription for the month.
    /// Safe to replay: subscriptions already charged for the period are
    /// skipped. Returns how many charges were created.
    pub async fn generate_monthly_charges(&self, month: i32, year: i32) -> AppResult<usize> {
        let period = ReferencePeriod::new(month, year).ok_or_else(|| {
            AppError::validation(format!("reference month must be 1-12, got {month}"))
        })?;

        let _guard = self.generation_lock.lock().await;
        let subscriptions = self.stores.subscriptions.list_active().await?;
        info!(%period, active = subscriptions.len(), "generating monthly charges");

        let mut generated = 0;
        for subscription in subscriptions {
            if self
                .stores
                .charges
                .find_by_key(subscription.id, period)
                .await?
                .is_some()
            {
                debug!(subscription = %subscription.id, %period, "charge already exists");
                continue;
            }

            let mut charge = MonthlyCharge::pending(&subscription, period);
            match self.stores.services.find_by_id(subscription.service_id).await? {
                Some(service) => apply_split(&mut charge, &service),
                None => warn!(
                    subscription = %subscription.id,
                    service = %subscription.service_id,
                    "subscription service missing; charge split left at zero"
                ),
            }

            let saved = self.stores.charges.save(&charge).await?;
            generated += 1;
            info!(
                subscription = %subscription.id,
                charge = %saved.id,
                amount = %saved.amount,
                %period,
                "monthly charge generated"
            );
        }

        info!(%period, generated, "monthly charge generation finished");
        Ok(generated)
    }

    /// Records payment details. Marking a charge PAID requires the payment
    /// date and who received the money.
    pub async fn update_charge(
        &self,
        id: Uuid,
        settlement: ChargeSettlement,
    ) -> AppResult<MonthlyCharge> {
        let mut charge = self.get_charge(id).await?;

        if settlement.status == ChargeStatus::Paid {
            if settlement.payment_date.is_none() {
                return Err(AppError::validation(
                    "payment date is required when marking a charge as PAID",
                ));
            }
            if settlement.payer.is_none() {
                return Err(AppError::validation(
                    "payer is required when marking a charge as PAID",
                ));
            }
        }

        charge.status = settlement.status;
        charge.payment_date = settlement.payment_date;
        charge.payer = settlement.payer;
        charge.payment_method = settlement.payment_method;

        let saved = self.stores.charges.save(&charge).await?;
        info!(charge = %saved.id, status = saved.status.as_str(), "monthly charge updated");
        Ok(saved)
    }

    pub async fn get_charge(&self, id: Uuid) -> AppResult<MonthlyCharge> {
        self.stores
            .charges
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("monthly charge {id}")))
    }

    pub async fn list_charges(&self) -> AppResult<Vec<MonthlyCharge>> {
        Ok(self.stores.charges.list_all().await?)
    }

    pub async fn list_subscription_charges(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<MonthlyCharge>> {
        Ok(self
            .stores
            .charges
            .list_by_subscription(subscription_id)
            .await?)
    }
}
