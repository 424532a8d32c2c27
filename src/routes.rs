use axum::{
    routing::{get, post},
    Extension, Router,
};

use crate::state::AppState;
use crate::{billing, booking, catalog};

pub fn api_routes() -> Router {
    Router::new()
        .route(
            "/api/patients",
            get(catalog::api::list_patients).post(catalog::api::register_patient),
        )
        .route(
            "/api/patients/:id",
            get(catalog::api::get_patient)
                .put(catalog::api::update_patient)
                .delete(catalog::api::deactivate_patient),
        )
        .route(
            "/api/patients/:id/appointments",
            get(booking::api::list_patient_appointments),
        )
        .route(
            "/api/patients/:id/subscriptions",
            get(billing::api::list_patient_subscriptions),
        )
        .route(
            "/api/services",
            get(catalog::api::list_services).post(catalog::api::create_service),
        )
        .route(
            "/api/services/:id",
            get(catalog::api::get_service)
                .put(catalog::api::update_service)
                .delete(catalog::api::deactivate_service),
        )
        .route(
            "/api/appointments",
            get(booking::api::list_appointments).post(booking::api::book_appointment),
        )
        .route(
            "/api/appointments/:id",
            get(booking::api::get_appointment)
                .put(booking::api::update_appointment)
                .delete(booking::api::delete_appointment),
        )
        .route(
            "/api/subscriptions",
            get(billing::api::list_subscriptions).post(billing::api::create_subscription),
        )
        .route("/api/subscriptions/:id", get(billing::api::get_subscription))
        .route(
            "/api/subscriptions/:id/cancel",
            post(billing::api::cancel_subscription),
        )
        .route(
            "/api/subscriptions/:id/charges",
            get(billing::api::list_subscription_charges),
        )
        .route("/api/billing/charges", get(billing::api::list_charges))
        .route(
            "/api/billing/charges/generate",
            post(billing::api::generate_charges),
        )
        .route(
            "/api/billing/charges/:id",
            get(billing::api::get_charge).put(billing::api::update_charge),
        )
        .route(
            "/api/billing/reconciliation",
            get(billing::api::reconciliation),
        )
        .route("/api/billing/summary", get(billing::api::monthly_summary))
}

pub async fn root() -> &'static str {
    "Clinic API"
}

/// Root and API routes with the shared engines attached.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .merge(api_routes())
        .layer(Extension(state))
}
