use crate::billing::{BillingService, DashboardService, ReconciliationService, SubscriptionService};
use crate::booking::{BookingService, ConflictPolicy};
use crate::catalog::CatalogService;
use crate::store::Stores;

/// key: app-state -> engines shared with every handler through `Extension`
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub catalog: CatalogService,
    pub booking: BookingService,
    pub subscriptions: SubscriptionService,
    pub billing: BillingService,
    pub reconciliation: ReconciliationService,
    pub dashboard: DashboardService,
}

impl AppState {
    pub fn new(stores: Stores, policy: ConflictPolicy) -> Self {
        Self {
            catalog: CatalogService::new(stores.clone()),
            booking: BookingService::new(stores.clone(), policy),
            subscriptions: SubscriptionService::new(stores.clone()),
            billing: BillingService::new(stores.clone()),
            reconciliation: ReconciliationService::new(stores.clone()),
            dashboard: DashboardService::new(stores.clone()),
            stores,
        }
    }

    pub fn in_memory(policy: ConflictPolicy) -> Self {
        Self::new(Stores::in_memory(), policy)
    }
}
