//! Financial snapshots frozen onto billable records.
//!
//! Appointments and monthly charges keep their own copy of the revenue split
//! so later catalog edits never rewrite history.

use rust_decimal::Decimal;

use crate::models::{Appointment, MonthlyCharge, Service};

/// Records that carry a frozen clinic/professional split.
pub trait SplitSnapshot {
    fn freeze_split(&mut self, clinic_pct: Decimal, professional_pct: Decimal);
}

impl SplitSnapshot for Appointment {
    fn freeze_split(&mut self, clinic_pct: Decimal, professional_pct: Decimal) {
        self.clinic_pct_snapshot = clinic_pct;
        self.professional_pct_snapshot = professional_pct;
    }
}

impl SplitSnapshot for MonthlyCharge {
    fn freeze_split(&mut self, clinic_pct: Decimal, professional_pct: Decimal) {
        self.clinic_pct_snapshot = clinic_pct;
        self.professional_pct_snapshot = professional_pct;
    }
}

/// Copies the service price and split onto a per-visit appointment. The
/// caller is responsible for passing an active service.
pub fn apply_snapshot(appointment: &mut Appointment, service: &Service) {
    appointment.charged_amount = service.base_price;
    apply_split(appointment, service);
}

/// Copies only the split; charges take their amount from the subscription.
pub fn apply_split<T: SplitSnapshot>(target: &mut T, service: &Service) {
    target.freeze_split(service.pct_clinic, service.pct_professional);
}

/// Subscriber visits are billed through the monthly charge instead.
pub fn zero_snapshot(appointment: &mut Appointment) {
    appointment.charged_amount = Decimal::ZERO;
    appointment.freeze_split(Decimal::ZERO, Decimal::ZERO);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReferencePeriod, ServiceType, Subscription};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn pilates() -> Service {
        Service::new("Pilates", ServiceType::Pilates, dec!(50.00), dec!(30), dec!(70))
    }

    #[test]
    fn appointment_snapshot_is_a_value_copy() {
        let mut service = pilates();
        let start = NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let mut appointment = Appointment::scheduled(Uuid::new_v4(), &service, start);

        apply_snapshot(&mut appointment, &service);
        service.base_price = dec!(80.00);
        service.pct_clinic = dec!(50);
        service.pct_professional = dec!(50);

        assert_eq!(appointment.charged_amount, dec!(50.00));
        assert_eq!(appointment.clinic_pct_snapshot, dec!(30));
        assert_eq!(appointment.professional_pct_snapshot, dec!(70));
    }

    #[test]
    fn charge_split_leaves_amount_alone() {
        let service = pilates();
        let subscription = Subscription::new(
            Uuid::new_v4(),
            service.id,
            dec!(200.00),
            10,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );
        let mut charge =
            MonthlyCharge::pending(&subscription, ReferencePeriod::new(3, 2025).unwrap());

        apply_split(&mut charge, &service);

        assert_eq!(charge.amount, dec!(200.00));
        assert_eq!(charge.clinic_pct_snapshot, dec!(30));
        assert_eq!(charge.professional_pct_snapshot, dec!(70));
    }

    #[test]
    fn zeroed_snapshot_clears_everything() {
        let service = pilates();
        let start = NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let mut appointment = Appointment::scheduled(Uuid::new_v4(), &service, start);
        apply_snapshot(&mut appointment, &service);

        zero_snapshot(&mut appointment);

        assert_eq!(appointment.charged_amount, Decimal::ZERO);
        assert_eq!(appointment.clinic_pct_snapshot, Decimal::ZERO);
        assert_eq!(appointment.professional_pct_snapshot, Decimal::ZERO);
    }
}
