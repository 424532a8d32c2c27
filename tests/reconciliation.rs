use chrono::NaiveDate;
use clinic_backend::billing::{ChargeSettlement, NewSubscription, ReconciliationQuery, SettlementKind};
use clinic_backend::booking::{AppointmentUpdate, BookingRequest, ConflictPolicy};
use clinic_backend::models::{ChargeStatus, Patient, Payer, PaymentMethod, Service, ServiceType};
use clinic_backend::{AppError, AppState};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

fn march() -> ReconciliationQuery {
    ReconciliationQuery {
        start: day(3, 1),
        end: day(3, 31),
        service_ids: Vec::new(),
    }
}

async fn patient(state: &AppState, name: &str) -> Patient {
    state
        .stores
        .patients
        .save(&Patient::new(name, Uuid::new_v4().simple().to_string()))
        .await
        .unwrap()
}

struct Fixture {
    state: AppState,
    physio: Service,
    pilates: Service,
}

/// One per-visit physiotherapy session collected by the clinic and one
/// pilates plan collected by the professional, both in March 2025.
async fn fixture() -> Fixture {
    let state = AppState::in_memory(ConflictPolicy::default());
    let physio = state
        .stores
        .services
        .save(&Service::new(
            "Physiotherapy",
            ServiceType::Physiotherapy,
            dec!(100.00),
            dec!(20),
            dec!(80),
        ))
        .await
        .unwrap();
    let pilates = state
        .stores
        .services
        .save(&Service::new(
            "Pilates",
            ServiceType::Pilates,
            dec!(50.00),
            dec!(30),
            dec!(70),
        ))
        .await
        .unwrap();
    let ana = patient(&state, "Ana").await;
    let bruno = patient(&state, "Bruno").await;

    let session = state
        .booking
        .book_appointment(BookingRequest::single(
            ana.id,
            physio.id,
            day(3, 12).and_hms_opt(10, 0, 0).unwrap(),
        ))
        .await
        .unwrap();
    state
        .booking
        .update_appointment(
            session.created[0].id,
            AppointmentUpdate {
                payer: Some(Payer::Clinic),
                payment_method: Some(PaymentMethod::Pix),
                ..AppointmentUpdate::default()
            },
        )
        .await
        .unwrap();

    let plan = state
        .subscriptions
        .create_subscription(
            NewSubscription {
                patient_id: bruno.id,
                service_id: pilates.id,
                monthly_value: dec!(200.00),
                due_day: 5,
                start_date: Some(day(1, 1)),
            },
            day(1, 1),
        )
        .await
        .unwrap();
    state.billing.generate_monthly_charges(3, 2025).await.unwrap();
    let charge = state
        .billing
        .list_subscription_charges(plan.id)
        .await
        .unwrap()
        .remove(0);
    state
        .billing
        .update_charge(
            charge.id,
            ChargeSettlement {
                status: ChargeStatus::Paid,
                payment_date: Some(day(3, 5)),
                payer: Some(Payer::Professional),
                payment_method: Some(PaymentMethod::Cash),
            },
        )
        .await
        .unwrap();

    Fixture {
        state,
        physio,
        pilates,
    }
}

// key: reconciliation-tests -> clinic vs professional netting scenario
#[tokio::test]
async fn balance_nets_both_collectors() {
    let Fixture { state, .. } = fixture().await;

    let report = state.reconciliation.reconcile(march()).await.unwrap();
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.balance_owed_to_professional, dec!(20.00));
    assert_eq!(report.gross_total, dec!(300.00));
    assert_eq!(report.professional_total, dec!(220.00));
    assert_eq!(report.clinic_total, dec!(80.00));
    assert_eq!(report.pending_count, 0);

    // March 5 charge comes before the March 12 session
    let plan = &report.items[0];
    assert_eq!(plan.kind, SettlementKind::MonthlyCharge);
    assert_eq!(plan.patient_name, "Bruno");
    assert_eq!(plan.adjustment, Some(dec!(-60.00)));
    assert!(plan.service_label.contains("Pilates"));

    let session = &report.items[1];
    assert_eq!(session.kind, SettlementKind::Appointment);
    assert_eq!(session.patient_name, "Ana");
    assert_eq!(session.service_label, "Physiotherapy");
    assert_eq!(session.adjustment, Some(dec!(80.00)));
}

#[tokio::test]
async fn service_filter_applies_to_sessions_and_plans() {
    let Fixture {
        state,
        physio,
        pilates,
    } = fixture().await;

    let only_physio = state
        .reconciliation
        .reconcile(ReconciliationQuery {
            service_ids: vec![physio.id],
            ..march()
        })
        .await
        .unwrap();
    assert_eq!(only_physio.items.len(), 1);
    assert_eq!(only_physio.balance_owed_to_professional, dec!(80.00));

    let only_pilates = state
        .reconciliation
        .reconcile(ReconciliationQuery {
            service_ids: vec![pilates.id],
            ..march()
        })
        .await
        .unwrap();
    assert_eq!(only_pilates.items.len(), 1);
    assert_eq!(only_pilates.balance_owed_to_professional, dec!(-60.00));
}

#[tokio::test]
async fn unsettled_items_are_pending_and_zero_value_sessions_are_skipped() {
    let Fixture {
        state,
        physio,
        pilates,
    } = fixture().await;
    let carla = patient(&state, "Carla").await;

    // per-visit session without a recorded payer
    state
        .booking
        .book_appointment(BookingRequest::single(
            carla.id,
            physio.id,
            day(3, 20).and_hms_opt(10, 0, 0).unwrap(),
        ))
        .await
        .unwrap();

    // subscriber session carries no charge of its own
    let bruno = state
        .stores
        .patients
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .find(|patient| patient.name == "Bruno")
        .unwrap();
    state
        .booking
        .book_appointment(BookingRequest::single(
            bruno.id,
            pilates.id,
            day(3, 21).and_hms_opt(7, 0, 0).unwrap(),
        ))
        .await
        .unwrap();

    let report = state.reconciliation.reconcile(march()).await.unwrap();
    assert_eq!(report.items.len(), 3);
    assert_eq!(report.pending_count, 1);
    assert_eq!(report.balance_owed_to_professional, dec!(20.00));
    assert!(report.items[2].is_pending());
}

#[tokio::test]
async fn range_outside_activity_is_empty() {
    let Fixture { state, .. } = fixture().await;

    let april = state
        .reconciliation
        .reconcile(ReconciliationQuery {
            start: day(4, 1),
            end: day(4, 30),
            service_ids: Vec::new(),
        })
        .await
        .unwrap();
    assert!(april.items.is_empty());
    assert_eq!(april.balance_owed_to_professional, dec!(0));

    let inverted = state
        .reconciliation
        .reconcile(ReconciliationQuery {
            start: day(3, 31),
            end: day(3, 1),
            service_ids: Vec::new(),
        })
        .await;
    assert!(matches!(inverted, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn sessions_in_the_last_second_of_the_range_are_included() {
    let Fixture { state, physio, .. } = fixture().await;
    let carla = patient(&state, "Carla").await;

    let late = day(3, 31).and_hms_milli_opt(23, 59, 59, 500).unwrap();
    let booked = state
        .booking
        .book_appointment(BookingRequest::single(carla.id, physio.id, late))
        .await
        .unwrap();
    let id = booked.created[0].id;

    let report = state.reconciliation.reconcile(march()).await.unwrap();
    assert!(report.items.iter().any(|item| item.source_id == id));

    let april = state
        .reconciliation
        .reconcile(ReconciliationQuery {
            start: day(4, 1),
            end: day(4, 30),
            service_ids: Vec::new(),
        })
        .await
        .unwrap();
    assert!(april.items.iter().all(|item| item.source_id != id));
}
