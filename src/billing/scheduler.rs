use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

use crate::models::ReferencePeriod;

use super::service::BillingService;

/// key: billing-charge-scheduler -> remembers the last period generated in-process
#[derive(Clone, Default)]
pub struct MonthlyChargeTrigger {
    last_period: Arc<Mutex<Option<ReferencePeriod>>>,
}

impl MonthlyChargeTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_period(&self) -> Option<ReferencePeriod> {
        *self.last_period.lock().await
    }
}

/// key: billing-charge-scheduler -> generate charges once per calendar month
pub fn spawn(service: BillingService, interval: Duration) -> MonthlyChargeTrigger {
    let trigger = MonthlyChargeTrigger::new();
    let handle = trigger.clone();

    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        loop {
            ticker.tick().await;
            let today = Utc::now().date_naive();
            process_tick(&service, &handle, today).await;
        }
    });

    trigger
}

/// key: billing-charge-scheduler -> tick handler
///
/// Runs generation for the month of `today` unless this trigger already
/// completed it. A process that starts mid-month catches up on its first
/// tick; failures are logged and retried on the next tick.
pub async fn process_tick(
    service: &BillingService,
    trigger: &MonthlyChargeTrigger,
    today: NaiveDate,
) -> Option<usize> {
    let period = ReferencePeriod::of(today);
    let mut last = trigger.last_period.lock().await;
    if *last == Some(period) {
        debug!(%period, "monthly charges already generated this period");
        return None;
    }

    match service
        .generate_monthly_charges(period.month, period.year)
        .await
    {
        Ok(generated) => {
            *last = Some(period);
            info!(%period, generated, "monthly charge automation tick completed");
            Some(generated)
        }
        Err(err) => {
            warn!(?err, %period, "monthly charge automation tick failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Service, ServiceType, Subscription};
    use crate::store::Stores;
    use rust_decimal_macros::dec;

    fn day(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    async fn seeded() -> (Stores, BillingService) {
        let stores = Stores::in_memory();
        let service = Service::new("Pilates", ServiceType::Pilates, dec!(50), dec!(40), dec!(60));
        stores.services.save(&service).await.unwrap();
        let subscription =
            Subscription::new(uuid::Uuid::new_v4(), service.id, dec!(300), 5, day(1, 1));
        stores.subscriptions.save(&subscription).await.unwrap();
        let billing = BillingService::new(stores.clone());
        (stores, billing)
    }

    #[tokio::test]
    async fn generates_once_per_period() {
        let (stores, billing) = seeded().await;
        let trigger = MonthlyChargeTrigger::new();

        assert_eq!(process_tick(&billing, &trigger, day(3, 14)).await, Some(1));
        assert_eq!(process_tick(&billing, &trigger, day(3, 15)).await, None);
        assert_eq!(
            trigger.last_period().await,
            ReferencePeriod::new(3, 2025)
        );
        assert_eq!(stores.charges.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_month_triggers_next_generation() {
        let (stores, billing) = seeded().await;
        let trigger = MonthlyChargeTrigger::new();

        process_tick(&billing, &trigger, day(3, 31)).await;
        assert_eq!(process_tick(&billing, &trigger, day(4, 1)).await, Some(1));
        assert_eq!(stores.charges.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn restarted_trigger_does_not_duplicate_charges() {
        let (stores, billing) = seeded().await;

        process_tick(&billing, &MonthlyChargeTrigger::new(), day(3, 2)).await;
        assert_eq!(
            process_tick(&billing, &MonthlyChargeTrigger::new(), day(3, 2)).await,
            Some(0)
        );
        assert_eq!(stores.charges.list_all().await.unwrap().len(), 1);
    }
}
