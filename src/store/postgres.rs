use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::{AppointmentStore, ChargeStore, PatientStore, ServiceStore, SubscriptionStore};
use crate::models::{
    Address, Appointment, AppointmentStatus, ChargeStatus, MonthlyCharge, Patient, Payer,
    PaymentMethod, ReferencePeriod, Service, ServiceType, Subscription,
};

/// key: store-postgres -> sqlx adapter over the clinic schema
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PATIENT_COLUMNS: &str = "id, name, tax_id, phone, email, street, number, complement, \
    district, city, state, postal_code, birth_date, anamnesis, registered_at, active";

const SERVICE_COLUMNS: &str =
    "id, name, base_price, pct_clinic, pct_professional, active, service_type";

const APPOINTMENT_COLUMNS: &str = "id, patient_id, service_id, start_time, end_time, status, \
    charged_amount, clinic_pct_snapshot, professional_pct_snapshot, evolution, payer, \
    payment_method, created_at";

const SUBSCRIPTION_COLUMNS: &str =
    "id, patient_id, service_id, monthly_value, due_day, active, start_date, cancelled_at";

const CHARGE_COLUMNS: &str = "id, subscription_id, reference_month, reference_year, amount, \
    status, payment_date, payer, payment_method, clinic_pct_snapshot, \
    professional_pct_snapshot, created_at";

fn map_patient(row: &PgRow) -> Result<Patient> {
    Ok(Patient {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        tax_id: row.try_get("tax_id")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: Address {
            street: row.try_get("street")?,
            number: row.try_get("number")?,
            complement: row.try_get("complement")?,
            district: row.try_get("district")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            postal_code: row.try_get("postal_code")?,
        },
        birth_date: row.try_get("birth_date")?,
        anamnesis: row.try_get("anamnesis")?,
        registered_at: row.try_get("registered_at")?,
        active: row.try_get("active")?,
    })
}

fn map_service(row: &PgRow) -> Result<Service> {
    let service_type: String = row.try_get("service_type")?;
    Ok(Service {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        base_price: row.try_get("base_price")?,
        pct_clinic: row.try_get("pct_clinic")?,
        pct_professional: row.try_get("pct_professional")?,
        active: row.try_get("active")?,
        service_type: ServiceType::parse(&service_type)
            .ok_or_else(|| anyhow!("unknown service type `{service_type}`"))?,
    })
}

fn map_payer(value: Option<String>) -> Result<Option<Payer>> {
    value
        .map(|raw| Payer::parse(&raw).ok_or_else(|| anyhow!("unknown payer `{raw}`")))
        .transpose()
}

fn map_payment_method(value: Option<String>) -> Result<Option<PaymentMethod>> {
    value
        .map(|raw| {
            PaymentMethod::parse(&raw).ok_or_else(|| anyhow!("unknown payment method `{raw}`"))
        })
        .transpose()
}

fn map_appointment(row: &PgRow) -> Result<Appointment> {
    let status: String = row.try_get("status")?;
    Ok(Appointment {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        service_id: row.try_get("service_id")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        status: AppointmentStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown appointment status `{status}`"))?,
        charged_amount: row.try_get("charged_amount")?,
        clinic_pct_snapshot: row.try_get("clinic_pct_snapshot")?,
        professional_pct_snapshot: row.try_get("professional_pct_snapshot")?,
        evolution: row.try_get("evolution")?,
        payer: map_payer(row.try_get("payer")?)?,
        payment_method: map_payment_method(row.try_get("payment_method")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_subscription(row: &PgRow) -> Result<Subscription> {
    Ok(Subscription {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        service_id: row.try_get("service_id")?,
        monthly_value: row.try_get("monthly_value")?,
        due_day: row.try_get("due_day")?,
        active: row.try_get("active")?,
        start_date: row.try_get("start_date")?,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

fn map_charge(row: &PgRow) -> Result<MonthlyCharge> {
    let status: String = row.try_get("status")?;
    Ok(MonthlyCharge {
        id: row.try_get("id")?,
        subscription_id: row.try_get("subscription_id")?,
        reference_month: row.try_get("reference_month")?,
        reference_year: row.try_get("reference_year")?,
        amount: row.try_get("amount")?,
        status: ChargeStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown charge status `{status}`"))?,
        payment_date: row.try_get("payment_date")?,
        payer: map_payer(row.try_get("payer")?)?,
        payment_method: map_payment_method(row.try_get("payment_method")?)?,
        clinic_pct_snapshot: row.try_get("clinic_pct_snapshot")?,
        professional_pct_snapshot: row.try_get("professional_pct_snapshot")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_rows<T>(rows: Vec<PgRow>, map: fn(&PgRow) -> Result<T>) -> Result<Vec<T>> {
    rows.iter().map(map).collect()
}

#[async_trait]
impl PatientStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>> {
        let row = sqlx::query(&format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_patient).transpose()
    }

    async fn find_by_tax_id(&self, tax_id: &str) -> Result<Option<Patient>> {
        let row = sqlx::query(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE tax_id = $1"
        ))
        .bind(tax_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_patient).transpose()
    }

    async fn save(&self, patient: &Patient) -> Result<Patient> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO patients ({PATIENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                tax_id = EXCLUDED.tax_id,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                street = EXCLUDED.street,
                number = EXCLUDED.number,
                complement = EXCLUDED.complement,
                district = EXCLUDED.district,
                city = EXCLUDED.city,
                state = EXCLUDED.state,
                postal_code = EXCLUDED.postal_code,
                birth_date = EXCLUDED.birth_date,
                anamnesis = EXCLUDED.anamnesis,
                active = EXCLUDED.active
            RETURNING {PATIENT_COLUMNS}
            "#
        ))
        .bind(patient.id)
        .bind(&patient.name)
        .bind(&patient.tax_id)
        .bind(&patient.phone)
        .bind(&patient.email)
        .bind(&patient.address.street)
        .bind(&patient.address.number)
        .bind(&patient.address.complement)
        .bind(&patient.address.district)
        .bind(&patient.address.city)
        .bind(&patient.address.state)
        .bind(&patient.address.postal_code)
        .bind(patient.birth_date)
        .bind(&patient.anamnesis)
        .bind(patient.registered_at)
        .bind(patient.active)
        .fetch_one(&self.pool)
        .await?;
        map_patient(&row)
    }

    async fn list_all(&self) -> Result<Vec<Patient>> {
        let rows = sqlx::query(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_patient)
    }
}

#[async_trait]
impl ServiceStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Service>> {
        let row = sqlx::query(&format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_service).transpose()
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Service>> {
        let row = sqlx::query(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1 AND active = TRUE"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_service).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Service>> {
        let row = sqlx::query(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_service).transpose()
    }

    async fn save(&self, service: &Service) -> Result<Service> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO services ({SERVICE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                base_price = EXCLUDED.base_price,
                pct_clinic = EXCLUDED.pct_clinic,
                pct_professional = EXCLUDED.pct_professional,
                active = EXCLUDED.active,
                service_type = EXCLUDED.service_type
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(service.id)
        .bind(&service.name)
        .bind(service.base_price)
        .bind(service.pct_clinic)
        .bind(service.pct_professional)
        .bind(service.active)
        .bind(service.service_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        map_service(&row)
    }

    async fn list_all(&self) -> Result<Vec<Service>> {
        let rows = sqlx::query(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_service)
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE services SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn save(&self, appointment: &Appointment) -> Result<Appointment> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO appointments ({APPOINTMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id)
            DO UPDATE SET
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                status = EXCLUDED.status,
                evolution = EXCLUDED.evolution,
                payer = EXCLUDED.payer,
                payment_method = EXCLUDED.payment_method
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(appointment.id)
        .bind(appointment.patient_id)
        .bind(appointment.service_id)
        .bind(appointment.start_time)
        .bind(appointment.end_time)
        .bind(appointment.status.as_str())
        .bind(appointment.charged_amount)
        .bind(appointment.clinic_pct_snapshot)
        .bind(appointment.professional_pct_snapshot)
        .bind(&appointment.evolution)
        .bind(appointment.payer.map(|payer| payer.as_str()))
        .bind(appointment.payment_method.map(|method| method.as_str()))
        .bind(appointment.created_at)
        .fetch_one(&self.pool)
        .await?;
        map_appointment(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_appointment).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Appointment>> {
        let rows = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY start_time ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_appointment)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_in_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS} FROM appointments
            WHERE start_time >= $1 AND start_time < $2
            ORDER BY start_time ASC
            "#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_appointment)
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>> {
        let rows = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE patient_id = $1 ORDER BY start_time ASC"
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_appointment)
    }

    async fn list_conflicts_in_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS} FROM appointments
            WHERE start_time < $2 AND end_time > $1
            "#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_appointment)
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn save(&self, subscription: &Subscription) -> Result<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id)
            DO UPDATE SET
                monthly_value = EXCLUDED.monthly_value,
                due_day = EXCLUDED.due_day,
                active = EXCLUDED.active,
                cancelled_at = EXCLUDED.cancelled_at
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(subscription.id)
        .bind(subscription.patient_id)
        .bind(subscription.service_id)
        .bind(subscription.monthly_value)
        .bind(subscription.due_day)
        .bind(subscription.active)
        .bind(subscription.start_date)
        .bind(subscription.cancelled_at)
        .fetch_one(&self.pool)
        .await?;
        map_subscription(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_subscription).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY start_date ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_subscription)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_active_for_patient_and_service(
        &self,
        patient_id: Uuid,
        service_id: Uuid,
    ) -> Result<Option<Subscription>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
            WHERE patient_id = $1 AND service_id = $2 AND active = TRUE
            LIMIT 1
            "#
        ))
        .bind(patient_id)
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_subscription).transpose()
    }

    async fn list_active(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE active = TRUE ORDER BY start_date ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_subscription)
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE patient_id = $1 ORDER BY start_date ASC"
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_subscription)
    }
}

#[async_trait]
impl ChargeStore for PgStore {
    async fn save(&self, charge: &MonthlyCharge) -> Result<MonthlyCharge> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO monthly_charges ({CHARGE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id)
            DO UPDATE SET
                status = EXCLUDED.status,
                payment_date = EXCLUDED.payment_date,
                payer = EXCLUDED.payer,
                payment_method = EXCLUDED.payment_method
            RETURNING {CHARGE_COLUMNS}
            "#
        ))
        .bind(charge.id)
        .bind(charge.subscription_id)
        .bind(charge.reference_month)
        .bind(charge.reference_year)
        .bind(charge.amount)
        .bind(charge.status.as_str())
        .bind(charge.payment_date)
        .bind(charge.payer.map(|payer| payer.as_str()))
        .bind(charge.payment_method.map(|method| method.as_str()))
        .bind(charge.clinic_pct_snapshot)
        .bind(charge.professional_pct_snapshot)
        .bind(charge.created_at)
        .fetch_one(&self.pool)
        .await?;
        map_charge(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MonthlyCharge>> {
        let row = sqlx::query(&format!(
            "SELECT {CHARGE_COLUMNS} FROM monthly_charges WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_charge).transpose()
    }

    async fn list_all(&self) -> Result<Vec<MonthlyCharge>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHARGE_COLUMNS} FROM monthly_charges ORDER BY reference_year, reference_month, created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_charge)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM monthly_charges WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_key(
        &self,
        subscription_id: Uuid,
        period: ReferencePeriod,
    ) -> Result<Option<MonthlyCharge>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {CHARGE_COLUMNS} FROM monthly_charges
            WHERE subscription_id = $1 AND reference_month = $2 AND reference_year = $3
            LIMIT 1
            "#
        ))
        .bind(subscription_id)
        .bind(period.month)
        .bind(period.year)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_charge).transpose()
    }

    async fn list_paid_in_period(
        &self,
        from: ReferencePeriod,
        to: ReferencePeriod,
    ) -> Result<Vec<MonthlyCharge>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CHARGE_COLUMNS} FROM monthly_charges
            WHERE status = 'PAID'
              AND (reference_year > $1 OR (reference_year = $1 AND reference_month >= $2))
              AND (reference_year < $3 OR (reference_year = $3 AND reference_month <= $4))
            ORDER BY reference_year ASC, reference_month ASC, payment_date ASC
            "#
        ))
        .bind(from.year)
        .bind(from.month)
        .bind(to.year)
        .bind(to.month)
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_charge)
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> Result<Vec<MonthlyCharge>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CHARGE_COLUMNS} FROM monthly_charges
            WHERE subscription_id = $1
            ORDER BY reference_year ASC, reference_month ASC
            "#
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_charge)
    }

    async fn list_pending_due(&self, up_to: ReferencePeriod) -> Result<Vec<MonthlyCharge>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CHARGE_COLUMNS} FROM monthly_charges
            WHERE status = 'PENDING'
              AND (reference_year < $1 OR (reference_year = $1 AND reference_month <= $2))
            ORDER BY reference_year ASC, reference_month ASC
            "#
        ))
        .bind(up_to.year)
        .bind(up_to.month)
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows, map_charge)
    }
}
