use chrono::{NaiveDate, NaiveDateTime};
use clinic_backend::billing::NewSubscription;
use clinic_backend::booking::{BookingRequest, ConflictPolicy};
use clinic_backend::catalog::ServiceUpdate;
use clinic_backend::models::{AppointmentStatus, Patient, Service, ServiceType};
use clinic_backend::{AppError, AppState};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

async fn patient(state: &AppState, name: &str) -> Patient {
    state
        .stores
        .patients
        .save(&Patient::new(name, Uuid::new_v4().simple().to_string()))
        .await
        .unwrap()
}

async fn service(state: &AppState, name: &str, service_type: ServiceType) -> Service {
    let service = match service_type {
        ServiceType::Pilates => Service::new(name, service_type, dec!(50.00), dec!(30), dec!(70)),
        ServiceType::Physiotherapy => {
            Service::new(name, service_type, dec!(120.00), dec!(20), dec!(80))
        }
    };
    state.stores.services.save(&service).await.unwrap()
}

async fn subscribe(state: &AppState, patient: &Patient, service: &Service) {
    state
        .subscriptions
        .create_subscription(
            NewSubscription {
                patient_id: patient.id,
                service_id: service.id,
                monthly_value: dec!(200.00),
                due_day: 10,
                start_date: None,
            },
            today(),
        )
        .await
        .unwrap();
}

// key: booking-tests -> pilates capacity scenario
#[tokio::test]
async fn pilates_slot_takes_fifteen_and_rejects_the_sixteenth() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let pilates = service(&state, "Pilates", ServiceType::Pilates).await;
    let slot = at(3, 3, 10);

    for index in 0..14 {
        let patient = patient(&state, &format!("Patient {index}")).await;
        state
            .booking
            .book_appointment(BookingRequest::single(patient.id, pilates.id, slot))
            .await
            .expect("within capacity");
    }

    let fifteenth = patient(&state, "Patient 15").await;
    let outcome = state
        .booking
        .book_appointment(BookingRequest::single(fifteenth.id, pilates.id, slot))
        .await
        .expect("fifteenth fills the slot");
    assert_eq!(outcome.created.len(), 1);

    let sixteenth = patient(&state, "Patient 16").await;
    let err = state
        .booking
        .book_appointment(BookingRequest::single(sixteenth.id, pilates.id, slot))
        .await
        .expect_err("slot is full");
    assert!(err.is_conflict());
    assert!(err.to_string().contains("capacity of 15"));
    assert_eq!(state.booking.list_appointments(None).await.unwrap().len(), 15);
}

#[tokio::test]
async fn group_booking_counts_every_member() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let pilates = service(&state, "Pilates", ServiceType::Pilates).await;
    let slot = at(3, 4, 9);
    let occupancy = |state: AppState| async move {
        state
            .booking
            .list_appointments(Some((slot, slot + chrono::Duration::hours(1))))
            .await
            .unwrap()
            .len()
    };

    for index in 0..10 {
        let patient = patient(&state, &format!("Patient {index}")).await;
        state
            .booking
            .book_appointment(BookingRequest::single(patient.id, pilates.id, slot))
            .await
            .unwrap();
    }

    let mut group = Vec::new();
    for index in 0..6 {
        group.push(patient(&state, &format!("Member {index}")).await.id);
    }
    let six = BookingRequest::group(group.clone(), pilates.id, slot).unwrap();
    let err = state.booking.book_appointment(six).await.expect_err("16 > 15");
    assert!(err.is_conflict());
    assert_eq!(occupancy(state.clone()).await, 10);

    // a subscriber in the group is exempt from the per-visit price
    let subscriber = patient(&state, &format!("Member {}", group.len())).await;
    subscribe(&state, &subscriber, &pilates).await;
    let mut five: Vec<Uuid> = group[..4].to_vec();
    five.push(subscriber.id);
    let outcome = state
        .booking
        .book_appointment(BookingRequest::group(five.clone(), pilates.id, slot).unwrap())
        .await
        .expect("group fills the slot");
    assert_eq!(outcome.created.len(), 5);
    let patients: Vec<Uuid> = outcome
        .created
        .iter()
        .map(|appointment| appointment.patient_id)
        .collect();
    assert_eq!(patients, five);
    assert_eq!(outcome.created[0].charged_amount, dec!(50.00));
    assert_eq!(outcome.created[4].charged_amount, Decimal::ZERO);
    assert_eq!(occupancy(state.clone()).await, 15);

    let late = patient(&state, "Late").await;
    let err = state
        .booking
        .book_appointment(BookingRequest::single(late.id, pilates.id, slot))
        .await
        .expect_err("slot is full");
    assert!(err.is_conflict());
    assert_eq!(occupancy(state.clone()).await, 15);
}

#[tokio::test]
async fn group_members_are_validated_before_booking() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let pilates = service(&state, "Pilates", ServiceType::Pilates).await;
    let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
    let ana = patient(&state, "Ana").await;
    let bruno = patient(&state, "Bruno").await;
    let slot = at(3, 4, 11);

    let repeated = BookingRequest::group(vec![ana.id, bruno.id, ana.id], pilates.id, slot).unwrap();
    assert!(matches!(
        state.booking.book_appointment(repeated).await,
        Err(AppError::Validation(_))
    ));

    state.catalog.deactivate_patient(bruno.id).await.unwrap();
    let inactive = BookingRequest::group(vec![ana.id, bruno.id], pilates.id, slot).unwrap();
    assert!(matches!(
        state.booking.book_appointment(inactive).await,
        Err(AppError::Validation(_))
    ));

    let carla = patient(&state, "Carla").await;
    let pair = BookingRequest::group(vec![ana.id, carla.id], physio.id, slot).unwrap();
    assert!(state
        .booking
        .book_appointment(pair)
        .await
        .unwrap_err()
        .is_conflict());

    assert!(BookingRequest::group(Vec::new(), pilates.id, slot).is_none());
    assert!(state.booking.list_appointments(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn physiotherapy_and_pilates_never_share_a_slot() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let pilates = service(&state, "Pilates", ServiceType::Pilates).await;
    let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
    let ana = patient(&state, "Ana").await;
    let bruno = patient(&state, "Bruno").await;

    state
        .booking
        .book_appointment(BookingRequest::single(ana.id, physio.id, at(3, 5, 14)))
        .await
        .unwrap();

    // 14:30 still overlaps the 14:00-15:00 physiotherapy session
    let err = state
        .booking
        .book_appointment(BookingRequest::single(
            bruno.id,
            pilates.id,
            at(3, 5, 14) + chrono::Duration::minutes(30),
        ))
        .await
        .expect_err("cross type overlap");
    assert!(err.is_conflict());

    // back-to-back is fine
    state
        .booking
        .book_appointment(BookingRequest::single(bruno.id, pilates.id, at(3, 5, 15)))
        .await
        .expect("adjacent slot");
}

#[tokio::test]
async fn evaluation_blocks_ninety_minutes() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let evaluation = service(&state, "Evaluation", ServiceType::Physiotherapy).await;
    let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
    let ana = patient(&state, "Ana").await;
    let bruno = patient(&state, "Bruno").await;

    let outcome = state
        .booking
        .book_appointment(BookingRequest::single(ana.id, evaluation.id, at(3, 6, 8)))
        .await
        .unwrap();
    assert_eq!(
        outcome.created[0].end_time,
        at(3, 6, 9) + chrono::Duration::minutes(30)
    );

    let err = state
        .booking
        .book_appointment(BookingRequest::single(bruno.id, physio.id, at(3, 6, 9)))
        .await
        .expect_err("evaluation still running at 09:00");
    assert!(err.is_conflict());
}

#[tokio::test]
async fn snapshot_survives_service_updates() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
    let ana = patient(&state, "Ana").await;

    let outcome = state
        .booking
        .book_appointment(BookingRequest::single(ana.id, physio.id, at(3, 7, 10)))
        .await
        .unwrap();
    let booked = &outcome.created[0];
    assert_eq!(booked.charged_amount, dec!(120.00));
    assert_eq!(booked.clinic_pct_snapshot, dec!(20));
    assert_eq!(booked.professional_pct_snapshot, dec!(80));

    state
        .catalog
        .update_service(
            physio.id,
            ServiceUpdate {
                base_price: Some(dec!(150.00)),
                pct_clinic: Some(dec!(40)),
                pct_professional: Some(dec!(60)),
                ..ServiceUpdate::default()
            },
        )
        .await
        .unwrap();

    let reloaded = state.booking.get_appointment(booked.id).await.unwrap();
    assert_eq!(reloaded.charged_amount, dec!(120.00));
    assert_eq!(reloaded.clinic_pct_snapshot, dec!(20));
    assert_eq!(reloaded.professional_pct_snapshot, dec!(80));
}

#[tokio::test]
async fn subscriber_appointments_are_zeroed() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let pilates = service(&state, "Pilates", ServiceType::Pilates).await;
    let ana = patient(&state, "Ana").await;
    subscribe(&state, &ana, &pilates).await;

    let outcome = state
        .booking
        .book_appointment(BookingRequest::single(ana.id, pilates.id, at(3, 10, 7)))
        .await
        .unwrap();
    let booked = &outcome.created[0];
    assert_eq!(booked.charged_amount, Decimal::ZERO);
    assert_eq!(booked.clinic_pct_snapshot, Decimal::ZERO);
    assert_eq!(booked.professional_pct_snapshot, Decimal::ZERO);
}

#[tokio::test]
async fn subscribers_of_one_service_share_the_slot() {
    let physio_for = |policy: ConflictPolicy| async move {
        let state = AppState::in_memory(policy);
        let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
        let ana = patient(&state, "Ana").await;
        let bruno = patient(&state, "Bruno").await;
        subscribe(&state, &ana, &physio).await;
        subscribe(&state, &bruno, &physio).await;
        state
            .booking
            .book_appointment(BookingRequest::single(ana.id, physio.id, at(3, 11, 10)))
            .await
            .unwrap();
        state
            .booking
            .book_appointment(BookingRequest::single(bruno.id, physio.id, at(3, 11, 10)))
            .await
    };

    assert!(physio_for(ConflictPolicy::SubscriptionAware).await.is_ok());
    assert!(physio_for(ConflictPolicy::Strict).await.is_err());
}

#[tokio::test]
async fn canceled_sessions_free_the_slot() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
    let ana = patient(&state, "Ana").await;
    let bruno = patient(&state, "Bruno").await;

    let outcome = state
        .booking
        .book_appointment(BookingRequest::single(ana.id, physio.id, at(3, 12, 16)))
        .await
        .unwrap();
    state
        .booking
        .update_appointment(
            outcome.created[0].id,
            clinic_backend::booking::AppointmentUpdate {
                status: Some(AppointmentStatus::Canceled),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    state
        .booking
        .book_appointment(BookingRequest::single(bruno.id, physio.id, at(3, 12, 16)))
        .await
        .expect("canceled session no longer counts");
}

// key: booking-tests -> recurring partial failure
#[tokio::test]
async fn recurring_booking_reports_skipped_dates() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
    let ana = patient(&state, "Ana").await;
    let bruno = patient(&state, "Bruno").await;

    // Wednesday 2025-03-12 at 10:00 is already taken
    state
        .booking
        .book_appointment(BookingRequest::single(bruno.id, physio.id, at(3, 12, 10)))
        .await
        .unwrap();

    let outcome = state
        .booking
        .book_appointment(BookingRequest::recurring(
            ana.id,
            physio.id,
            at(3, 3, 10),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            Some(vec![1, 3]),
        ))
        .await
        .unwrap();

    let booked: Vec<NaiveDate> = outcome
        .created
        .iter()
        .map(|appointment| appointment.start_time.date())
        .collect();
    assert_eq!(
        booked,
        vec![
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        ]
    );
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(
        outcome.failed[0].date,
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
    );
    assert!(outcome
        .created
        .iter()
        .all(|appointment| appointment.start_time.time() == at(3, 3, 10).time()));
}

#[tokio::test]
async fn recurring_booking_with_no_free_date_fails() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
    let ana = patient(&state, "Ana").await;
    let bruno = patient(&state, "Bruno").await;

    state
        .booking
        .book_appointment(BookingRequest::single(bruno.id, physio.id, at(3, 3, 10)))
        .await
        .unwrap();

    let err = state
        .booking
        .book_appointment(BookingRequest::recurring(
            ana.id,
            physio.id,
            at(3, 3, 10),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            None,
        ))
        .await
        .expect_err("only date is taken");
    assert!(matches!(err, AppError::State(_)));
}

#[tokio::test]
async fn recurring_input_is_validated() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
    let ana = patient(&state, "Ana").await;

    let before_start = BookingRequest::recurring(
        ana.id,
        physio.id,
        at(3, 10, 10),
        NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
        None,
    );
    assert!(matches!(
        state.booking.book_appointment(before_start).await,
        Err(AppError::Validation(_))
    ));

    let bad_weekday = BookingRequest::recurring(
        ana.id,
        physio.id,
        at(3, 10, 10),
        NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
        Some(vec![8]),
    );
    assert!(matches!(
        state.booking.book_appointment(bad_weekday).await,
        Err(AppError::Validation(_))
    ));

    let open_ended = BookingRequest::recurring(
        ana.id,
        physio.id,
        at(3, 10, 10),
        NaiveDate::from_ymd_opt(9999, 12, 31).unwrap(),
        None,
    );
    assert!(matches!(
        state.booking.book_appointment(open_ended).await,
        Err(AppError::Validation(_))
    ));
    assert!(state.booking.list_appointments(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn inactive_records_never_book() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
    let ana = patient(&state, "Ana").await;

    state.catalog.deactivate_service(physio.id).await.unwrap();
    assert!(matches!(
        state
            .booking
            .book_appointment(BookingRequest::single(ana.id, physio.id, at(3, 13, 10)))
            .await,
        Err(AppError::NotFound(_))
    ));

    let pilates = service(&state, "Pilates", ServiceType::Pilates).await;
    state.catalog.deactivate_patient(ana.id).await.unwrap();
    assert!(matches!(
        state
            .booking
            .book_appointment(BookingRequest::single(ana.id, pilates.id, at(3, 13, 10)))
            .await,
        Err(AppError::Validation(_))
    ));

    assert!(matches!(
        state
            .booking
            .book_appointment(BookingRequest::single(Uuid::new_v4(), pilates.id, at(3, 13, 10)))
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(state.booking.list_appointments(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn appointment_updates_keep_the_snapshot() {
    let state = AppState::in_memory(ConflictPolicy::SubscriptionAware);
    let physio = service(&state, "Physiotherapy", ServiceType::Physiotherapy).await;
    let ana = patient(&state, "Ana").await;
    let outcome = state
        .booking
        .book_appointment(BookingRequest::single(ana.id, physio.id, at(3, 14, 10)))
        .await
        .unwrap();
    let id = outcome.created[0].id;

    let updated = state
        .booking
        .update_appointment(
            id,
            clinic_backend::booking::AppointmentUpdate {
                status: Some(AppointmentStatus::Completed),
                evolution: Some("Improved range of motion".to_string()),
                payer: Some(clinic_backend::models::Payer::Clinic),
                payment_method: Some(clinic_backend::models::PaymentMethod::Pix),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, AppointmentStatus::Completed);
    assert_eq!(updated.charged_amount, dec!(120.00));

    state.booking.delete_appointment(id).await.unwrap();
    assert!(matches!(
        state.booking.get_appointment(id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        state.booking.delete_appointment(id).await,
        Err(AppError::NotFound(_))
    ));
}
