//! Patient registry and service catalog.

pub mod api;

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Address, Patient, Service, ServiceType};
use crate::store::Stores;

static CPF_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{3}\.?\d{3}\.?\d{3}-?\d{2}$").expect("invalid regex")
});

/// Normalizes a CPF to its eleven digits, validating layout and check digits.
pub fn normalize_tax_id(raw: &str) -> AppResult<String> {
    let raw = raw.trim();
    if !CPF_PATTERN.is_match(raw) {
        return Err(AppError::validation(format!("invalid CPF format: {raw}")));
    }
    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.iter().all(|digit| *digit == digits[0]) {
        return Err(AppError::validation(format!("invalid CPF: {raw}")));
    }
    let check = |len: usize| {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, digit)| digit * (len as u32 + 1 - i as u32))
            .sum();
        (sum * 10) % 11 % 10
    };
    if check(9) != digits[9] || check(10) != digits[10] {
        return Err(AppError::validation(format!("invalid CPF check digits: {raw}")));
    }
    Ok(digits.iter().map(|digit| char::from_digit(*digit, 10).unwrap_or('0')).collect())
}

/// Each share must lie in [0, 100] and together they must cover the full price.
pub fn validate_split(pct_clinic: Decimal, pct_professional: Decimal) -> AppResult<()> {
    let range = Decimal::ZERO..=Decimal::ONE_HUNDRED;
    if !range.contains(&pct_clinic) || !range.contains(&pct_professional) {
        return Err(AppError::validation(
            "percentages must be between 0 and 100",
        ));
    }
    if pct_clinic + pct_professional != Decimal::ONE_HUNDRED {
        return Err(AppError::validation(format!(
            "clinic and professional percentages must sum to 100 (got {})",
            pct_clinic + pct_professional
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub tax_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub anamnesis: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<Address>,
    pub birth_date: Option<NaiveDate>,
    pub anamnesis: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub name: String,
    pub service_type: ServiceType,
    pub base_price: Decimal,
    pub pct_clinic: Decimal,
    pub pct_professional: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub base_price: Option<Decimal>,
    pub pct_clinic: Option<Decimal>,
    pub pct_professional: Option<Decimal>,
    pub active: Option<bool>,
}

/// key: catalog-service -> patients and billable services
#[derive(Clone)]
pub struct CatalogService {
    stores: Stores,
}

impl CatalogService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn register_patient(&self, request: NewPatient) -> AppResult<Patient> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("patient name is required"));
        }
        let tax_id = normalize_tax_id(&request.tax_id)?;
        if self.stores.patients.find_by_tax_id(&tax_id).await?.is_some() {
            return Err(AppError::validation(format!(
                "a patient with CPF {tax_id} already exists"
            )));
        }

        let mut patient = Patient::new(name, tax_id);
        patient.phone = request.phone;
        patient.email = request.email;
        patient.address = request.address;
        patient.birth_date = request.birth_date;
        patient.anamnesis = Some(request.anamnesis.unwrap_or_default());
        patient.registered_at = Utc::now();

        let saved = self.stores.patients.save(&patient).await?;
        info!(patient = %saved.id, "patient registered");
        Ok(saved)
    }

    pub async fn update_patient(&self, id: Uuid, update: PatientUpdate) -> AppResult<Patient> {
        let mut patient = self.get_patient(id).await?;
        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::validation("patient name is required"));
            }
            patient.name = name.to_string();
        }
        if let Some(phone) = update.phone {
            patient.phone = Some(phone);
        }
        if let Some(email) = update.email {
            patient.email = Some(email);
        }
        if let Some(address) = update.address {
            patient.address = address;
        }
        if let Some(birth_date) = update.birth_date {
            patient.birth_date = Some(birth_date);
        }
        if let Some(anamnesis) = update.anamnesis {
            patient.anamnesis = Some(anamnesis);
        }
        if let Some(active) = update.active {
            patient.active = active;
        }
        let saved = self.stores.patients.save(&patient).await?;
        info!(patient = %saved.id, active = saved.active, "patient updated");
        Ok(saved)
    }

    /// Soft delete; appointments and charges keep referring to the record.
    pub async fn deactivate_patient(&self, id: Uuid) -> AppResult<Patient> {
        self.update_patient(
            id,
            PatientUpdate {
                active: Some(false),
                ..PatientUpdate::default()
            },
        )
        .await
    }

    pub async fn get_patient(&self, id: Uuid) -> AppResult<Patient> {
        self.stores
            .patients
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("patient {id}")))
    }

    pub async fn list_patients(&self) -> AppResult<Vec<Patient>> {
        Ok(self.stores.patients.list_all().await?)
    }

    pub async fn create_service(&self, request: NewService) -> AppResult<Service> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("service name is required"));
        }
        if request.base_price.is_sign_negative() {
            return Err(AppError::validation("base price cannot be negative"));
        }
        validate_split(request.pct_clinic, request.pct_professional)?;
        if self.stores.services.find_by_name(name).await?.is_some() {
            return Err(AppError::validation(format!(
                "a service named {name} already exists"
            )));
        }

        let service = Service::new(
            name,
            request.service_type,
            request.base_price,
            request.pct_clinic,
            request.pct_professional,
        );
        let saved = self.stores.services.save(&service).await?;
        info!(
            service = %saved.id,
            name = %saved.name,
            service_type = saved.service_type.as_str(),
            "service created"
        );
        Ok(saved)
    }

    /// Changes apply to future bookings and charges only; existing snapshots
    /// keep the values frozen when they were created.
    pub async fn update_service(&self, id: Uuid, update: ServiceUpdate) -> AppResult<Service> {
        let mut service = self.get_service(id).await?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::validation("service name is required"));
            }
            if name != service.name {
                if let Some(other) = self.stores.services.find_by_name(&name).await? {
                    if other.id != service.id {
                        return Err(AppError::validation(format!(
                            "another service named {name} already exists"
                        )));
                    }
                }
                service.name = name;
            }
        }
        if let Some(price) = update.base_price {
            if price.is_sign_negative() {
                return Err(AppError::validation("base price cannot be negative"));
            }
            service.base_price = price;
        }
        let pct_clinic = update.pct_clinic.unwrap_or(service.pct_clinic);
        let pct_professional = update.pct_professional.unwrap_or(service.pct_professional);
        if update.pct_clinic.is_some() || update.pct_professional.is_some() {
            validate_split(pct_clinic, pct_professional)?;
        }
        service.pct_clinic = pct_clinic;
        service.pct_professional = pct_professional;
        if let Some(active) = update.active {
            service.active = active;
        }

        let saved = self.stores.services.save(&service).await?;
        info!(service = %saved.id, active = saved.active, "service updated");
        Ok(saved)
    }

    pub async fn deactivate_service(&self, id: Uuid) -> AppResult<()> {
        if !self.stores.services.deactivate(id).await? {
            return Err(AppError::not_found(format!("service {id}")));
        }
        info!(service = %id, "service deactivated");
        Ok(())
    }

    pub async fn get_service(&self, id: Uuid) -> AppResult<Service> {
        self.stores
            .services
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("service {id}")))
    }

    pub async fn list_services(&self) -> AppResult<Vec<Service>> {
        Ok(self.stores.services.list_all().await?)
    }
}
