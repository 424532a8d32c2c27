use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::availability::{AvailabilityEngine, ConflictPolicy, SlotRequest};
use super::recurrence::{expand_dates, resolve_weekdays};
use crate::error::{AppError, AppResult};
use crate::models::{Appointment, AppointmentStatus, Patient, Payer, PaymentMethod, Service};
use crate::snapshot::{apply_snapshot, zero_snapshot};
use crate::store::Stores;

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub start_time: NaiveDateTime,
    #[serde(default)]
    pub recurrence_end: Option<NaiveDate>,
    /// ISO weekday numbers, Monday = 1.
    #[serde(default)]
    pub weekdays: Option<Vec<i32>>,
    /// Further patients booked into the same slot alongside `patient_id`.
    #[serde(default)]
    pub patient_ids: Vec<Uuid>,
}

impl BookingRequest {
    pub fn single(patient_id: Uuid, service_id: Uuid, start_time: NaiveDateTime) -> Self {
        Self {
            patient_id,
            service_id,
            start_time,
            recurrence_end: None,
            weekdays: None,
            patient_ids: Vec::new(),
        }
    }

    pub fn group(
        patient_ids: Vec<Uuid>,
        service_id: Uuid,
        start_time: NaiveDateTime,
    ) -> Option<Self> {
        let (first, rest) = patient_ids.split_first()?;
        Some(Self {
            patient_ids: rest.to_vec(),
            ..Self::single(*first, service_id, start_time)
        })
    }

    /// The requesting patient followed by the rest of the group.
    pub fn members(&self) -> Vec<Uuid> {
        std::iter::once(self.patient_id)
            .chain(self.patient_ids.iter().copied())
            .collect()
    }

    pub fn recurring(
        patient_id: Uuid,
        service_id: Uuid,
        start_time: NaiveDateTime,
        recurrence_end: NaiveDate,
        weekdays: Option<Vec<i32>>,
    ) -> Self {
        Self {
            recurrence_end: Some(recurrence_end),
            weekdays,
            ..Self::single(patient_id, service_id, start_time)
        }
    }
}

struct GroupMember {
    patient: Patient,
    subscribed: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingFailure {
    pub date: NaiveDate,
    pub reason: String,
}

/// Appointments created by one request. Recurring requests may be partial;
/// callers must inspect `failed` rather than assume full coverage.
#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub created: Vec<Appointment>,
    pub failed: Vec<BookingFailure>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentUpdate {
    pub status: Option<AppointmentStatus>,
    pub evolution: Option<String>,
    pub payer: Option<Payer>,
    pub payment_method: Option<PaymentMethod>,
}

/// key: booking-service -> single and recurring appointment booking
#[derive(Clone)]
pub struct BookingService {
    stores: Stores,
    availability: AvailabilityEngine,
    // serializes the availability read with the insert that follows it
    slot_lock: Arc<Mutex<()>>,
}

impl BookingService {
    pub fn new(stores: Stores, policy: ConflictPolicy) -> Self {
        Self {
            availability: AvailabilityEngine::new(stores.clone(), policy),
            stores,
            slot_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn book_appointment(&self, request: BookingRequest) -> AppResult<BookingOutcome> {
        info!(
            patient = %request.patient_id,
            service = %request.service_id,
            start = %request.start_time,
            recurring = request.recurrence_end.is_some(),
            "booking appointment"
        );

        let member_ids = request.members();
        let mut seen = HashSet::with_capacity(member_ids.len());
        if let Some(repeated) = member_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(AppError::validation(format!(
                "patient {repeated} is listed more than once in the booking"
            )));
        }

        let mut patients = Vec::with_capacity(member_ids.len());
        for patient_id in member_ids {
            patients.push(self.active_patient(patient_id).await?);
        }

        let service = self
            .stores
            .services
            .find_active_by_id(request.service_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("service {} (missing or inactive)", request.service_id))
            })?;

        let mut members = Vec::with_capacity(patients.len());
        for patient in patients {
            let subscribed = self
                .stores
                .subscriptions
                .find_active_for_patient_and_service(patient.id, service.id)
                .await?
                .is_some();
            members.push(GroupMember {
                patient,
                subscribed,
            });
        }

        let Some(recurrence_end) = request.recurrence_end else {
            let created = self
                .book_slot(&service, &members, request.start_time)
                .await?;
            return Ok(BookingOutcome {
                created,
                failed: Vec::new(),
            });
        };

        let first = request.start_time.date();
        if recurrence_end < first {
            return Err(AppError::validation(
                "recurrence end must be on or after the first session date",
            ));
        }
        let weekdays = resolve_weekdays(first, request.weekdays.as_deref())?;
        let dates = expand_dates(first, recurrence_end, &weekdays)?;
        info!(
            patient = %request.patient_id,
            group = members.len(),
            service = %service.id,
            dates = dates.len(),
            "expanding recurring booking"
        );

        let time_of_day = request.start_time.time();
        let mut outcome = BookingOutcome {
            created: Vec::with_capacity(dates.len() * members.len()),
            failed: Vec::new(),
        };
        for date in dates {
            let start = date.and_time(time_of_day);
            match self.book_slot(&service, &members, start).await {
                Ok(appointments) => outcome.created.extend(appointments),
                Err(err) if err.is_conflict() => {
                    warn!(%date, reason = %err, "skipping recurring date");
                    outcome.failed.push(BookingFailure {
                        date,
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    error!(?err, %date, "unexpected failure booking recurring date");
                    outcome.failed.push(BookingFailure {
                        date,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            patient = %request.patient_id,
            created = outcome.created.len(),
            failed = outcome.failed.len(),
            "recurring booking finished"
        );

        if outcome.created.is_empty() {
            return Err(AppError::State(
                "no appointment could be booked; check the time slot conflicts".to_string(),
            ));
        }
        Ok(outcome)
    }

    async fn active_patient(&self, patient_id: Uuid) -> AppResult<Patient> {
        let patient = self
            .stores
            .patients
            .find_by_id(patient_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("patient {patient_id}")))?;
        if !patient.active {
            return Err(AppError::validation(format!(
                "patient {} is inactive",
                patient.id
            )));
        }
        Ok(patient)
    }

    /// Checks the slot once for the whole group, then stores one appointment
    /// per member so later checks see every reserved place.
    async fn book_slot(
        &self,
        service: &Service,
        members: &[GroupMember],
        start: NaiveDateTime,
    ) -> AppResult<Vec<Appointment>> {
        let appointments: Vec<Appointment> = members
            .iter()
            .map(|member| {
                let mut appointment = Appointment::scheduled(member.patient.id, service, start);
                if member.subscribed {
                    zero_snapshot(&mut appointment);
                    debug!(
                        patient = %member.patient.id,
                        service = %service.id,
                        "active subscription; appointment billed through monthly charge"
                    );
                } else {
                    apply_snapshot(&mut appointment, service);
                }
                appointment
            })
            .collect();
        let Some(lead) = appointments.first() else {
            return Err(AppError::validation("a booking needs at least one patient"));
        };

        let _guard = self.slot_lock.lock().await;
        self.availability
            .check(&SlotRequest {
                patient_id: lead.patient_id,
                service,
                start: lead.start_time,
                end: lead.end_time,
                group_size: appointments.len(),
                // a mixed group only shares with subscribers when every member subscribes
                subscribed: members.iter().all(|member| member.subscribed),
            })
            .await?;

        let mut saved = Vec::with_capacity(appointments.len());
        for appointment in &appointments {
            let stored = self.stores.appointments.save(appointment).await?;
            debug!(appointment = %stored.id, start = %stored.start_time, "appointment booked");
            saved.push(stored);
        }
        Ok(saved)
    }

    pub async fn get_appointment(&self, id: Uuid) -> AppResult<Appointment> {
        self.stores
            .appointments
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("appointment {id}")))
    }

    /// All appointments, or those starting in `[start, end)`.
    pub async fn list_appointments(
        &self,
        range: Option<(NaiveDateTime, NaiveDateTime)>,
    ) -> AppResult<Vec<Appointment>> {
        let appointments = match range {
            Some((start, end)) => self.stores.appointments.list_in_range(start, end).await?,
            None => self.stores.appointments.list_all().await?,
        };
        Ok(appointments)
    }

    pub async fn list_patient_appointments(&self, patient_id: Uuid) -> AppResult<Vec<Appointment>> {
        Ok(self.stores.appointments.list_by_patient(patient_id).await?)
    }

    /// Updates status, clinical notes and payment fields. The financial
    /// snapshot is never recalculated.
    pub async fn update_appointment(
        &self,
        id: Uuid,
        update: AppointmentUpdate,
    ) -> AppResult<Appointment> {
        let mut appointment = self.get_appointment(id).await?;
        if let Some(status) = update.status {
            appointment.status = status;
        }
        if let Some(evolution) = update.evolution {
            appointment.evolution = Some(evolution);
        }
        if let Some(payer) = update.payer {
            appointment.payer = Some(payer);
        }
        if let Some(method) = update.payment_method {
            appointment.payment_method = Some(method);
        }
        let saved = self.stores.appointments.save(&appointment).await?;
        info!(appointment = %saved.id, status = saved.status.as_str(), "appointment updated");
        Ok(saved)
    }

    pub async fn delete_appointment(&self, id: Uuid) -> AppResult<()> {
        if !self.stores.appointments.delete(id).await? {
            return Err(AppError::not_found(format!("appointment {id}")));
        }
        info!(appointment = %id, "appointment deleted");
        Ok(())
    }
}
