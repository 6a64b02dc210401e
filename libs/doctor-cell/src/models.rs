use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::{AppError, FieldError};
use shared_models::profile::ProfileSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization: String,
    pub license_number: String,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub contact: Option<Contact>,
    #[serde(default)]
    pub availability: WeeklyAvailability,
    #[serde(default)]
    pub consultation_fee: f64,
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ProfileSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyAvailability {
    pub monday: Option<DaySchedule>,
    pub tuesday: Option<DaySchedule>,
    pub wednesday: Option<DaySchedule>,
    pub thursday: Option<DaySchedule>,
    pub friday: Option<DaySchedule>,
    pub saturday: Option<DaySchedule>,
    pub sunday: Option<DaySchedule>,
}

impl WeeklyAvailability {
    pub fn days(&self) -> [(&'static str, Option<&DaySchedule>); 7] {
        [
            ("monday", self.monday.as_ref()),
            ("tuesday", self.tuesday.as_ref()),
            ("wednesday", self.wednesday.as_ref()),
            ("thursday", self.thursday.as_ref()),
            ("friday", self.friday.as_ref()),
            ("saturday", self.saturday.as_ref()),
            ("sunday", self.sunday.as_ref()),
        ]
    }

    /// Weekdays marked available.
    pub fn working_days(&self) -> Vec<&'static str> {
        self.days()
            .into_iter()
            .filter(|(_, day)| day.map(|d| d.available).unwrap_or(false))
            .map(|(name, _)| name)
            .collect()
    }
}

/// Profile edits. Numbers arrive as `f64` so negative or fractional values
/// are reported against their field instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience: Option<f64>,
    pub education: Option<Vec<Education>>,
    pub qualifications: Option<Vec<String>>,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub contact: Option<Contact>,
    pub availability: Option<WeeklyAvailability>,
    pub consultation_fee: Option<f64>,
    pub department: Option<String>,
}

impl UpdateDoctorRequest {
    pub fn is_empty(&self) -> bool {
        self.specialization.is_none()
            && self.license_number.is_none()
            && self.experience.is_none()
            && self.education.is_none()
            && self.qualifications.is_none()
            && self.bio.is_none()
            && self.image.is_none()
            && self.contact.is_none()
            && self.availability.is_none()
            && self.consultation_fee.is_none()
            && self.department.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("License number already registered")]
    LicenseTaken,

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound(err.to_string()),
            DoctorError::Forbidden(msg) => AppError::Forbidden(msg),
            DoctorError::LicenseTaken => AppError::Conflict(err.to_string()),
            DoctorError::BadRequest(msg) => AppError::BadRequest(msg),
            DoctorError::Validation(errors) => AppError::InvalidFields(errors),
            DoctorError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_doctor_row_with_partial_week() {
        let row = json!({
            "id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "specialization": "Cardiology",
            "license_number": "MD-42",
            "experience": 7,
            "bio": null,
            "image": null,
            "contact": null,
            "availability": {
                "monday": { "start": "09:00", "end": "13:00", "available": true },
                "friday": { "start": null, "end": null, "available": false }
            },
            "department": "Cardiology",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });

        let doctor: Doctor = serde_json::from_value(row).unwrap();
        assert_eq!(doctor.availability.working_days(), vec!["monday"]);
        assert!(doctor.availability.tuesday.is_none());
        assert!(doctor.education.is_empty());
        assert_eq!(doctor.consultation_fee, 0.0);
    }

    #[test]
    fn test_license_conflict_maps_to_409() {
        let app: AppError = DoctorError::LicenseTaken.into();
        assert_eq!(app.status_code(), axum::http::StatusCode::CONFLICT);
    }
}
