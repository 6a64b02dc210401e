// libs/billing-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::{AppError, FieldError};
use shared_models::profile::PartySummary;

// ==============================================================================
// CORE BILLING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub invoice_number: String,
    #[serde(default)]
    pub services: Vec<ServiceLineItem>,
    pub subtotal: f64,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub discount: f64,
    pub total_amount: f64,
    pub status: BillStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_date: Option<DateTime<Utc>>,
    pub due_date: DateTime<Utc>,
    /// Public path of the uploaded proof, `/cover/<file>`.
    pub payment_proof: Option<String>,
    #[serde(default)]
    pub verified_by_doctor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PartySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment: Option<BilledAppointment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLineItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
}

/// Appointment summary embedded in bill responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BilledAppointment {
    pub id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl BillStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BillStatus::Paid | BillStatus::Cancelled)
    }

    pub fn can_move_to(&self, next: BillStatus) -> bool {
        match self {
            BillStatus::Pending => matches!(
                next,
                BillStatus::Paid | BillStatus::Overdue | BillStatus::Cancelled
            ),
            BillStatus::Overdue => matches!(next, BillStatus::Paid | BillStatus::Cancelled),
            BillStatus::Paid | BillStatus::Cancelled => false,
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BillStatus::Pending => write!(f, "pending"),
            BillStatus::Paid => write!(f, "paid"),
            BillStatus::Overdue => write!(f, "overdue"),
            BillStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for BillStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(BillStatus::Pending),
            "paid" => Ok(BillStatus::Paid),
            "overdue" => Ok(BillStatus::Overdue),
            "cancelled" => Ok(BillStatus::Cancelled),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Insurance,
    Online,
}

impl FromStr for PaymentMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "insurance" => Ok(PaymentMethod::Insurance),
            "online" => Ok(PaymentMethod::Online),
            _ => Err(()),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceLineRequest {
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBillRequest {
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    pub services: Option<Vec<ServiceLineRequest>>,
    pub tax: Option<f64>,
    pub discount: Option<f64>,
}

/// A line that passed validation, before totals are computed.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBill {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub services: Vec<ServiceLine>,
    pub tax: f64,
    pub discount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceTotals {
    pub services: Vec<ServiceLineItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePaymentRequest {
    pub status: Option<String>,
    pub payment_method: Option<String>,
}

/// A PDF pulled out of the multipart body.
#[derive(Debug, Clone)]
pub struct ProofUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Bill not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Appointment does not belong to this patient")]
    AppointmentMismatch,

    #[error("{message}")]
    InvalidStatusTransition { from: BillStatus, message: String },

    #[error("No payment proof uploaded")]
    MissingProof,

    #[error("{0}")]
    InvalidUpload(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotFound
            | BillingError::PatientNotFound
            | BillingError::AppointmentNotFound => AppError::NotFound(err.to_string()),
            BillingError::AppointmentMismatch
            | BillingError::InvalidStatusTransition { .. }
            | BillingError::MissingProof
            | BillingError::InvalidUpload(_)
            | BillingError::BadRequest(_) => AppError::BadRequest(err.to_string()),
            BillingError::Forbidden(msg) => AppError::Forbidden(msg),
            BillingError::Validation(errors) => AppError::InvalidFields(errors),
            BillingError::Storage(e) => AppError::Internal(e.to_string()),
            BillingError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bill_transitions() {
        assert!(BillStatus::Pending.can_move_to(BillStatus::Overdue));
        assert!(BillStatus::Overdue.can_move_to(BillStatus::Paid));
        assert!(!BillStatus::Overdue.can_move_to(BillStatus::Pending));
        assert!(!BillStatus::Paid.can_move_to(BillStatus::Cancelled));
        assert!(!BillStatus::Pending.can_move_to(BillStatus::Pending));
        assert!(BillStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(json!(BillStatus::Overdue), json!("overdue"));
        assert_eq!("insurance".parse::<PaymentMethod>(), Ok(PaymentMethod::Insurance));
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_upload_errors_are_client_errors() {
        let err: AppError = BillingError::InvalidUpload("Only PDF files are allowed".to_string()).into();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let err: AppError = BillingError::MissingProof.into();
        assert_eq!(err.to_string(), "Bad Request: No payment proof uploaded");
    }
}
