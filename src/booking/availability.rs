use std::collections::HashMap;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Appointment, Service, ServiceType};
use crate::store::Stores;

pub const PILATES_SLOT_CAPACITY: usize = 15;
pub const PHYSIOTHERAPY_SLOT_CAPACITY: usize = 1;

pub fn slot_capacity(service_type: ServiceType) -> usize {
    match service_type {
        ServiceType::Pilates => PILATES_SLOT_CAPACITY,
        ServiceType::Physiotherapy => PHYSIOTHERAPY_SLOT_CAPACITY,
    }
}

/// key: availability-policy -> which overlapping appointments count as conflicts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Canceled appointments are ignored and subscribers of the same service
    /// share a slot without consuming capacity.
    #[default]
    SubscriptionAware,
    /// Every overlapping appointment conflicts, whatever its status.
    Strict,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::SubscriptionAware => "subscription_aware",
            ConflictPolicy::Strict => "strict",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "subscription_aware" | "subscription-aware" => Some(ConflictPolicy::SubscriptionAware),
            "strict" => Some(ConflictPolicy::Strict),
            _ => None,
        }
    }
}

/// Candidate window for one booking attempt.
#[derive(Debug, Clone)]
pub struct SlotRequest<'a> {
    pub patient_id: Uuid,
    pub service: &'a Service,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub group_size: usize,
    /// Whether the candidate patient holds an active subscription for `service`.
    pub subscribed: bool,
}

/// Applies the slot rules to the service types of the counted conflicts.
/// Returns the number of patients the slot would hold after booking.
pub fn evaluate_slot(
    service_type: ServiceType,
    conflicting_types: &[ServiceType],
    group_size: usize,
) -> Result<usize, String> {
    if conflicting_types.iter().any(|other| *other != service_type) {
        return Err(
            "a different service type is already booked in this time slot".to_string(),
        );
    }

    let total = conflicting_types.len() + group_size;
    let capacity = slot_capacity(service_type);
    if total > capacity {
        return Err(match service_type {
            ServiceType::Pilates => format!(
                "PILATES capacity of {capacity} patients reached for this time slot (requested total {total})"
            ),
            ServiceType::Physiotherapy => {
                "an appointment already exists in this time slot".to_string()
            }
        });
    }
    Ok(total)
}

/// key: availability-engine -> capacity and cross-type conflict checks
#[derive(Clone)]
pub struct AvailabilityEngine {
    stores: Stores,
    policy: ConflictPolicy,
}

impl AvailabilityEngine {
    pub fn new(stores: Stores, policy: ConflictPolicy) -> Self {
        Self { stores, policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Fails with [`AppError::Conflict`] when the slot cannot take the request.
    pub async fn check(&self, request: &SlotRequest<'_>) -> AppResult<usize> {
        let overlapping = self
            .stores
            .appointments
            .list_conflicts_in_range(request.start, request.end)
            .await?;

        let counted = self.counted_conflicts(request, overlapping).await?;
        let types = self.resolve_types(request.service, &counted).await?;

        match evaluate_slot(request.service.service_type, &types, request.group_size) {
            Ok(total) => {
                debug!(
                    service = %request.service.id,
                    start = %request.start,
                    total,
                    policy = self.policy.as_str(),
                    "slot available"
                );
                Ok(total)
            }
            Err(reason) => {
                warn!(
                    patient = %request.patient_id,
                    service = %request.service.id,
                    service_type = request.service.service_type.as_str(),
                    start = %request.start,
                    conflicts = types.len(),
                    group_size = request.group_size,
                    %reason,
                    "slot rejected"
                );
                Err(AppError::conflict(reason))
            }
        }
    }

    async fn counted_conflicts(
        &self,
        request: &SlotRequest<'_>,
        overlapping: Vec<Appointment>,
    ) -> AppResult<Vec<Appointment>> {
        if self.policy == ConflictPolicy::Strict {
            return Ok(overlapping);
        }

        let mut subscribers: HashMap<Uuid, bool> = HashMap::new();
        let mut counted = Vec::with_capacity(overlapping.len());
        for appointment in overlapping {
            if appointment.is_canceled() {
                continue;
            }
            let shares_slot = request.subscribed
                && appointment.service_id == request.service.id
                && appointment.start_time == request.start;
            if shares_slot {
                let subscribed = match subscribers.get(&appointment.patient_id) {
                    Some(known) => *known,
                    None => {
                        let found = self
                            .stores
                            .subscriptions
                            .find_active_for_patient_and_service(
                                appointment.patient_id,
                                request.service.id,
                            )
                            .await?
                            .is_some();
                        subscribers.insert(appointment.patient_id, found);
                        found
                    }
                };
                if subscribed {
                    continue;
                }
            }
            counted.push(appointment);
        }
        Ok(counted)
    }

    async fn resolve_types(
        &self,
        service: &Service,
        appointments: &[Appointment],
    ) -> AppResult<Vec<ServiceType>> {
        let mut known: HashMap<Uuid, ServiceType> = HashMap::new();
        known.insert(service.id, service.service_type);

        let mut types = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            let service_type = match known.get(&appointment.service_id) {
                Some(service_type) => *service_type,
                None => {
                    let other = self
                        .stores
                        .services
                        .find_by_id(appointment.service_id)
                        .await?
                        .ok_or_else(|| {
                            anyhow!(
                                "appointment {} references unknown service {}",
                                appointment.id,
                                appointment.service_id
                            )
                        })?;
                    known.insert(other.id, other.service_type);
                    other.service_type
                }
            };
            types.push(service_type);
        }
        Ok(types)
    }
}
