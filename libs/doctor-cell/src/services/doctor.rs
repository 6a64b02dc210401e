use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{ilike_contains, SupabaseClient};
use shared_models::profile::USER_EMBED;
use shared_utils::access::CallerScope;
use shared_utils::validation::{is_time_slot, FieldErrors};

use crate::models::{Doctor, DoctorError, UpdateDoctorRequest, WeeklyAvailability};

#[derive(Debug, Deserialize)]
struct AvailabilityRow {
    #[serde(default)]
    availability: WeeklyAvailability,
}

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub fn supabase(&self) -> &SupabaseClient {
        &self.supabase
    }

    fn select() -> String {
        format!("*,{}", USER_EMBED)
    }

    pub async fn list_doctors(&self, auth_token: &str) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?select={}&order=created_at.desc", Self::select());
        Ok(self.supabase.find_many(&path, auth_token).await?)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}&select={}", doctor_id, Self::select());
        self.supabase
            .find_one(&path, auth_token)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    pub async fn update_doctor(
        &self,
        scope: &CallerScope,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        match scope {
            CallerScope::Admin => {}
            CallerScope::Doctor { doctor_id: own } if *own == doctor_id => {}
            CallerScope::Doctor { doctor_id: own } => {
                warn!("Doctor {} attempted to edit doctor {}", own, doctor_id);
                return Err(DoctorError::Forbidden("Access denied".to_string()));
            }
            CallerScope::Patient { .. } => {
                return Err(DoctorError::Forbidden("Access denied".to_string()));
            }
        }

        if request.is_empty() {
            return Err(DoctorError::BadRequest("No updatable fields supplied".to_string()));
        }

        let mut update_data = Self::validate_update(&request)?;

        self.get_doctor(doctor_id, auth_token).await?;

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}&select={}", doctor_id, Self::select());
        let updated: Vec<Doctor> = self
            .supabase
            .update(&path, auth_token, Value::Object(update_data))
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    DoctorError::LicenseTaken
                } else {
                    DoctorError::Database(e)
                }
            })?;

        info!("Doctor profile {} updated", doctor_id);
        updated.into_iter().next().ok_or(DoctorError::NotFound)
    }

    pub async fn search_by_specialization(
        &self,
        specialization: &str,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let term = specialization.trim();
        if term.is_empty() {
            return Err(DoctorError::BadRequest("Specialization is required".to_string()));
        }

        let path = format!(
            "/rest/v1/doctors?specialization={}&select={}&order=created_at.desc",
            ilike_contains(term),
            Self::select()
        );
        Ok(self.supabase.find_many(&path, auth_token).await?)
    }

    pub async fn get_availability(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<WeeklyAvailability, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=availability", doctor_id);
        let row: AvailabilityRow = self
            .supabase
            .find_one(&path, auth_token)
            .await?
            .ok_or(DoctorError::NotFound)?;

        Ok(row.availability)
    }

    fn validate_update(request: &UpdateDoctorRequest) -> Result<Map<String, Value>, DoctorError> {
        let mut errors = FieldErrors::new();
        let mut fields = Map::new();

        for (field, value) in [
            ("specialization", &request.specialization),
            ("license_number", &request.license_number),
            ("department", &request.department),
        ] {
            if let Some(value) = value {
                let value = value.trim();
                if value.is_empty() {
                    errors.add(field, &format!("{} cannot be empty", label(field)));
                } else {
                    fields.insert(field.to_string(), json!(value));
                }
            }
        }

        if let Some(years) = request.experience {
            if years >= 0.0 && years.fract() == 0.0 {
                fields.insert("experience".to_string(), json!(years as u32));
            } else {
                errors.add("experience", "Experience must be a non-negative whole number");
            }
        }

        if let Some(fee) = request.consultation_fee {
            if fee.is_finite() && fee >= 0.0 {
                fields.insert("consultation_fee".to_string(), json!(fee));
            } else {
                errors.add("consultation_fee", "Consultation fee must be non-negative");
            }
        }

        if let Some(availability) = &request.availability {
            for (day, schedule) in availability.days() {
                let Some(schedule) = schedule.filter(|s| s.available) else {
                    continue;
                };
                match (schedule.start.as_deref(), schedule.end.as_deref()) {
                    (Some(start), Some(end)) if is_time_slot(start) && is_time_slot(end) => {
                        // Zero-padded HH:MM compares correctly as text.
                        if start.trim() >= end.trim() {
                            errors.add(
                                &format!("availability.{}", day),
                                "Start time must be before end time",
                            );
                        }
                    }
                    _ => errors.add(
                        &format!("availability.{}", day),
                        "Available days need start and end times in HH:MM format",
                    ),
                }
            }
            fields.insert("availability".to_string(), json!(availability));
        }

        if let Some(education) = &request.education {
            fields.insert("education".to_string(), json!(education));
        }
        if let Some(qualifications) = &request.qualifications {
            fields.insert("qualifications".to_string(), json!(qualifications));
        }
        if let Some(bio) = &request.bio {
            fields.insert("bio".to_string(), json!(bio));
        }
        if let Some(image) = &request.image {
            fields.insert("image".to_string(), json!(image));
        }
        if let Some(contact) = &request.contact {
            fields.insert("contact".to_string(), json!(contact));
        }

        errors.finish().map_err(DoctorError::Validation)?;
        Ok(fields)
    }
}

fn label(field: &str) -> &'static str {
    match field {
        "specialization" => "Specialization",
        "license_number" => "License number",
        _ => "Department",
    }
}
