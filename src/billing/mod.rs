pub mod api;
pub mod dashboard;
pub mod reconciliation;
pub mod scheduler;
pub mod service;
pub mod subscriptions;

pub use dashboard::{DashboardService, MonthlySummary};
pub use reconciliation::{
    share, ReconciliationQuery, ReconciliationService, SettlementItem, SettlementKind,
    SettlementReport,
};
pub use scheduler::{
    process_tick as run_monthly_charge_tick, spawn as spawn_monthly_charge_scheduler,
    MonthlyChargeTrigger,
};
pub use service::{BillingService, ChargeSettlement};
pub use subscriptions::{NewSubscription, SubscriptionService, MAX_DUE_DAY, MIN_DUE_DAY};
