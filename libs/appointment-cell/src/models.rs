// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::{AppError, FieldError};
use shared_models::profile::PartySummary;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    /// Slot start, `HH:MM`.
    pub time: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub approved_by_doctor: bool,
    #[serde(default)]
    pub completed_by_doctor: bool,
    pub reason: String,
    pub notes: Option<String>,
    pub prescription: Option<Prescription>,
    pub follow_up_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PartySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<PartySummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Statuses that keep the (doctor, date, time) slot occupied.
    pub const SLOT_HOLDING: [AppointmentStatus; 3] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Scheduled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected
                | AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::NoShow
        )
    }

    pub fn holds_slot(&self) -> bool {
        Self::SLOT_HOLDING.contains(self)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Approved => write!(f, "approved"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no-show"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    #[serde(default)]
    pub medications: Vec<Medication>,
    pub instructions: Option<String>,
}

/// Doctor-driven and cancellation moves through the status workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentAction {
    Approve,
    Reject,
    Complete,
    MarkNoShow,
    Cancel,
}

impl AppointmentAction {
    pub fn target_status(&self) -> AppointmentStatus {
        match self {
            AppointmentAction::Approve => AppointmentStatus::Approved,
            AppointmentAction::Reject => AppointmentStatus::Rejected,
            AppointmentAction::Complete => AppointmentStatus::Completed,
            AppointmentAction::MarkNoShow => AppointmentStatus::NoShow,
            AppointmentAction::Cancel => AppointmentStatus::Cancelled,
        }
    }
}

impl fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentAction::Approve => write!(f, "approve"),
            AppointmentAction::Reject => write!(f, "reject"),
            AppointmentAction::Complete => write!(f, "complete"),
            AppointmentAction::MarkNoShow => write!(f, "mark as no-show"),
            AppointmentAction::Cancel => write!(f, "cancel"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Raw booking body; fields are optional so validation can report each one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    /// Admins book on behalf of a patient.
    pub patient_id: Option<Uuid>,
}

/// A booking request that passed field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub reason: String,
    pub notes: Option<String>,
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub prescription: Option<Prescription>,
    pub follow_up_date: Option<String>,
    /// Rejected when present: status only moves through the workflow routes.
    #[serde(default, skip_serializing)]
    pub status: Option<Value>,
}

impl UpdateAppointmentRequest {
    pub fn reschedules(&self) -> bool {
        self.date.is_some() || self.time.is_some()
    }

    pub fn touches_clinical_fields(&self) -> bool {
        self.prescription.is_some() || self.follow_up_date.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.time.is_none()
            && self.reason.is_none()
            && self.notes.is_none()
            && !self.touches_clinical_fields()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveAppointmentRequest {
    pub approve: bool,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Time slot already booked")]
    SlotTaken,

    #[error("{message}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        message: String,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PatientNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotTaken
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::BadRequest(_) => AppError::BadRequest(err.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::Validation(errors) => AppError::InvalidFields(errors),
            AppointmentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
