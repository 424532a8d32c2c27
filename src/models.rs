use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Service name that books a longer slot.
pub const EVALUATION_SERVICE_NAME: &str = "Evaluation";
pub const EVALUATION_MINUTES: i64 = 90;
pub const SESSION_MINUTES: i64 = 60;

/// key: clinic-models -> service type drives slot sharing rules
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Pilates,
    Physiotherapy,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Pilates => "PILATES",
            ServiceType::Physiotherapy => "PHYSIOTHERAPY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PILATES" => Some(ServiceType::Pilates),
            "PHYSIOTHERAPY" => Some(ServiceType::Physiotherapy),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Canceled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Canceled => "CANCELED",
            AppointmentStatus::NoShow => "NO_SHOW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SCHEDULED" => Some(AppointmentStatus::Scheduled),
            "COMPLETED" => Some(AppointmentStatus::Completed),
            "CANCELED" => Some(AppointmentStatus::Canceled),
            "NO_SHOW" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeStatus {
    Pending,
    Paid,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "PENDING",
            ChargeStatus::Paid => "PAID",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(ChargeStatus::Pending),
            "PAID" => Some(ChargeStatus::Paid),
            _ => None,
        }
    }
}

/// key: clinic-models -> who physically received the money
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payer {
    Clinic,
    Professional,
}

impl Payer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Payer::Clinic => "CLINIC",
            Payer::Professional => "PROFESSIONAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CLINIC" => Some(Payer::Clinic),
            "PROFESSIONAL" => Some(Payer::Professional),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Pix,
    DebitCard,
    CreditCard,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Pix => "PIX",
            PaymentMethod::DebitCard => "DEBIT_CARD",
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CASH" => Some(PaymentMethod::Cash),
            "PIX" => Some(PaymentMethod::Pix),
            "DEBIT_CARD" => Some(PaymentMethod::DebitCard),
            "CREDIT_CARD" => Some(PaymentMethod::CreditCard),
            "BANK_TRANSFER" => Some(PaymentMethod::BankTransfer),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// key: clinic-models -> patient record
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    /// Brazilian CPF, stored as digits only.
    pub tax_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub address: Address,
    pub birth_date: Option<NaiveDate>,
    pub anamnesis: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub active: bool,
}

impl Patient {
    pub fn new(name: impl Into<String>, tax_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tax_id: tax_id.into(),
            phone: None,
            email: None,
            address: Address::default(),
            birth_date: None,
            anamnesis: None,
            registered_at: Utc::now(),
            active: true,
        }
    }
}

/// key: clinic-models -> service catalog entry with revenue split
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub base_price: Decimal,
    pub pct_clinic: Decimal,
    pub pct_professional: Decimal,
    pub active: bool,
    pub service_type: ServiceType,
}

impl Service {
    pub fn new(
        name: impl Into<String>,
        service_type: ServiceType,
        base_price: Decimal,
        pct_clinic: Decimal,
        pct_professional: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            base_price,
            pct_clinic,
            pct_professional,
            active: true,
            service_type,
        }
    }

    pub fn session_length(&self) -> Duration {
        if self.name == EVALUATION_SERVICE_NAME {
            Duration::minutes(EVALUATION_MINUTES)
        } else {
            Duration::minutes(SESSION_MINUTES)
        }
    }
}

/// key: clinic-models -> monthly plan binding a patient to a service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub monthly_value: Decimal,
    pub due_day: i32,
    pub active: bool,
    pub start_date: NaiveDate,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn new(
        patient_id: Uuid,
        service_id: Uuid,
        monthly_value: Decimal,
        due_day: i32,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            service_id,
            monthly_value,
            due_day,
            active: true,
            start_date,
            cancelled_at: None,
        }
    }

    /// Returns `false` when the subscription was already inactive; the
    /// original cancellation timestamp is kept in that case.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.cancelled_at = Some(now);
        true
    }
}

/// key: clinic-models -> booked session with frozen financial snapshot
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub charged_amount: Decimal,
    pub clinic_pct_snapshot: Decimal,
    pub professional_pct_snapshot: Decimal,
    pub evolution: Option<String>,
    pub payer: Option<Payer>,
    pub payment_method: Option<PaymentMethod>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// New scheduled appointment with an empty snapshot; the booking flow
    /// decides between the service snapshot and the subscription exemption.
    pub fn scheduled(patient_id: Uuid, service: &Service, start_time: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            service_id: service.id,
            start_time,
            end_time: start_time + service.session_length(),
            status: AppointmentStatus::Scheduled,
            charged_amount: Decimal::ZERO,
            clinic_pct_snapshot: Decimal::ZERO,
            professional_pct_snapshot: Decimal::ZERO,
            evolution: None,
            payer: None,
            payment_method: None,
            created_at: Utc::now(),
        }
    }

    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start_time < end && self.end_time > start
    }

    pub fn is_canceled(&self) -> bool {
        self.status == AppointmentStatus::Canceled
    }
}

/// key: clinic-models -> calendar month a charge refers to
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferencePeriod {
    pub year: i32,
    pub month: i32,
}

impl ReferencePeriod {
    pub fn new(month: i32, year: i32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month() as i32,
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month as u32, 1)
    }
}

impl std::fmt::Display for ReferencePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// key: clinic-models -> subscription charge for one calendar month
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MonthlyCharge {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub reference_month: i32,
    pub reference_year: i32,
    pub amount: Decimal,
    pub status: ChargeStatus,
    pub payment_date: Option<NaiveDate>,
    pub payer: Option<Payer>,
    pub payment_method: Option<PaymentMethod>,
    pub clinic_pct_snapshot: Decimal,
    pub professional_pct_snapshot: Decimal,
    pub created_at: DateTime<Utc>,
}

impl MonthlyCharge {
    pub fn pending(subscription: &Subscription, period: ReferencePeriod) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscription_id: subscription.id,
            reference_month: period.month,
            reference_year: period.year,
            amount: subscription.monthly_value,
            status: ChargeStatus::Pending,
            payment_date: None,
            payer: None,
            payment_method: None,
            clinic_pct_snapshot: Decimal::ZERO,
            professional_pct_snapshot: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    pub fn period(&self) -> ReferencePeriod {
        ReferencePeriod {
            year: self.reference_year,
            month: self.reference_month,
        }
    }
}
