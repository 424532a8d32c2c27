//! Appointment booking: slot availability, recurrence expansion and the
//! orchestrator that freezes financial snapshots.

pub mod api;
pub mod availability;
pub mod recurrence;
pub mod service;

pub use availability::{
    evaluate_slot, slot_capacity, AvailabilityEngine, ConflictPolicy, SlotRequest,
    PHYSIOTHERAPY_SLOT_CAPACITY, PILATES_SLOT_CAPACITY,
};
pub use service::{
    AppointmentUpdate, BookingFailure, BookingOutcome, BookingRequest, BookingService,
};
