// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_database::DatabaseError;
use shared_utils::access::CallerScope;
use shared_utils::validation::{is_blank, is_time_slot, parse_iso_date, FieldErrors};

use crate::models::{
    Appointment, AppointmentAction, AppointmentError, AppointmentStatus,
    CreateAppointmentRequest, NewAppointment, UpdateAppointmentRequest,
};
use crate::services::conflict::SlotConflictService;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Appointment columns plus the embedded patient and doctor summaries.
pub const APPOINTMENT_SELECT: &str = "*,\
patient:patients(id,user:profiles(name,email,contact_number)),\
doctor:doctors(id,user:profiles(name,email,contact_number))";

pub struct AppointmentService {
    supabase: Arc<SupabaseClient>,
    conflict_service: SlotConflictService,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            conflict_service: SlotConflictService::new(Arc::clone(&supabase)),
            lifecycle_service: AppointmentLifecycleService::new(),
            supabase,
        }
    }

    pub fn supabase(&self) -> &SupabaseClient {
        &self.supabase
    }

    /// Field-level validation of a booking body.
    pub fn validate_create_request(
        request: &CreateAppointmentRequest,
    ) -> Result<NewAppointment, AppointmentError> {
        let mut errors = FieldErrors::new();

        let doctor_id = match request.doctor_id.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("doctor_id", "Doctor ID is required");
                None
            }
            Some(raw) => {
                let parsed = Uuid::parse_str(raw).ok();
                errors.check(parsed.is_some(), "doctor_id", "Doctor ID is invalid");
                parsed
            }
        };

        let date = request.date.as_deref().and_then(parse_iso_date);
        errors.check(date.is_some(), "date", "Valid date is required");

        let time = request.time.as_deref().map(str::trim).unwrap_or_default();
        if time.is_empty() {
            errors.add("time", "Time is required");
        } else {
            errors.check(is_time_slot(time), "time", "Time must be in HH:MM format");
        }

        errors.check(!is_blank(request.reason.as_deref()), "reason", "Reason is required");

        errors.finish().map_err(AppointmentError::Validation)?;

        let (Some(doctor_id), Some(date)) = (doctor_id, date) else {
            return Err(AppointmentError::BadRequest("Invalid appointment request".to_string()));
        };

        Ok(NewAppointment {
            doctor_id,
            date,
            time: time.to_string(),
            reason: request.reason.as_deref().unwrap_or_default().trim().to_string(),
            notes: request.notes.clone(),
            patient_id: request.patient_id,
        })
    }

    pub async fn list_appointments(
        &self,
        scope: &CallerScope,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?select={}&order=date.desc,time.desc",
            APPOINTMENT_SELECT
        );
        if let Some(filter) = scope.ownership_filter() {
            path.push('&');
            path.push_str(&filter);
        }

        debug!("Listing appointments for {:?}", scope);
        Ok(self.supabase.find_many(&path, auth_token).await?)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&select={}",
            appointment_id, APPOINTMENT_SELECT
        );

        self.supabase
            .find_one(&path, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// Fetches an appointment the caller is a party to.
    pub async fn get_scoped_appointment(
        &self,
        scope: &CallerScope,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        scope
            .ensure_access(appointment.patient_id, Some(appointment.doctor_id))
            .map_err(|_| {
                warn!("{:?} denied access to appointment {}", scope, appointment_id);
                AppointmentError::Forbidden("Access denied".to_string())
            })?;

        Ok(appointment)
    }

    pub async fn book_appointment(
        &self,
        scope: &CallerScope,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let booking = Self::validate_create_request(&request)?;

        let patient_id = match scope {
            CallerScope::Patient { patient_id } => *patient_id,
            CallerScope::Admin => {
                let patient_id = booking.patient_id.ok_or_else(|| {
                    AppointmentError::BadRequest("Patient ID is required".to_string())
                })?;
                if !self.record_exists("patients", patient_id, auth_token).await? {
                    return Err(AppointmentError::PatientNotFound);
                }
                patient_id
            }
            CallerScope::Doctor { .. } => {
                return Err(AppointmentError::Forbidden(
                    "Doctors cannot book appointments".to_string(),
                ));
            }
        };

        info!(
            "Booking appointment for patient {} with doctor {} at {} {}",
            patient_id, booking.doctor_id, booking.date, booking.time
        );

        if !self.record_exists("doctors", booking.doctor_id, auth_token).await? {
            return Err(AppointmentError::DoctorNotFound);
        }

        self.conflict_service
            .ensure_slot_free(booking.doctor_id, booking.date, &booking.time, None, auth_token)
            .await?;

        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "patient_id": patient_id,
            "doctor_id": booking.doctor_id,
            "date": booking.date.format("%Y-%m-%d").to_string(),
            "time": booking.time,
            "status": AppointmentStatus::Pending,
            "approved_by_doctor": false,
            "completed_by_doctor": false,
            "reason": booking.reason,
            "notes": booking.notes,
            "created_at": now,
            "updated_at": now
        });

        let table = format!("appointments?select={}", APPOINTMENT_SELECT);
        let created: Vec<Appointment> = self
            .supabase
            .insert(&table, auth_token, appointment_data)
            .await
            .map_err(Self::slot_aware)?;

        let appointment = created.into_iter().next().ok_or_else(|| {
            AppointmentError::Database(DatabaseError::Decode(
                "Insert returned no appointment".to_string(),
            ))
        })?;

        info!("Appointment {} booked", appointment.id);
        Ok(appointment)
    }

    pub async fn update_appointment(
        &self,
        scope: &CallerScope,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if request.status.is_some() {
            return Err(AppointmentError::BadRequest(
                "Status can only be changed through the approve, complete and cancel actions"
                    .to_string(),
            ));
        }
        if request.is_empty() {
            return Err(AppointmentError::BadRequest("No updatable fields supplied".to_string()));
        }

        let appointment = self.get_scoped_appointment(scope, appointment_id, auth_token).await?;

        if appointment.status.is_terminal() {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                message: "Appointment can no longer be modified".to_string(),
            });
        }

        if let CallerScope::Patient { .. } = scope {
            if request.touches_clinical_fields() {
                return Err(AppointmentError::Forbidden(
                    "Patients cannot set prescriptions or follow-up dates".to_string(),
                ));
            }
            if (request.reschedules() || request.reason.is_some() || request.notes.is_some())
                && appointment.status != AppointmentStatus::Pending
            {
                return Err(AppointmentError::BadRequest(
                    "Only pending appointments can be changed by the patient".to_string(),
                ));
            }
        }

        let changes = Self::collect_changes(&request)?;

        let new_date = changes.date.unwrap_or(appointment.date);
        let new_time = changes.time.clone().unwrap_or_else(|| appointment.time.clone());
        let moves_slot = new_date != appointment.date || new_time != appointment.time;

        if moves_slot && appointment.status.holds_slot() {
            self.conflict_service
                .ensure_slot_free(appointment.doctor_id, new_date, &new_time, Some(appointment.id), auth_token)
                .await?;
        }

        let mut update_data = changes.fields;
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&select={}",
            appointment_id, APPOINTMENT_SELECT
        );
        let updated: Vec<Appointment> = self
            .supabase
            .update(&path, auth_token, Value::Object(update_data))
            .await
            .map_err(Self::slot_aware)?;

        updated.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Runs one step of the status workflow on behalf of `scope`.
    pub async fn apply_action(
        &self,
        scope: &CallerScope,
        appointment_id: Uuid,
        action: AppointmentAction,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        scope
            .require(self.lifecycle_service.allowed_roles(action))
            .map_err(|_| AppointmentError::Forbidden("Access denied".to_string()))?;

        let appointment = self.get_scoped_appointment(scope, appointment_id, auth_token).await?;
        let next_status = self.lifecycle_service.validate_transition(appointment.status, action)?;

        let mut update_data = Map::new();
        update_data.insert("status".to_string(), json!(next_status));
        match action {
            AppointmentAction::Approve => {
                update_data.insert("approved_by_doctor".to_string(), json!(true));
            }
            AppointmentAction::Reject => {
                update_data.insert("approved_by_doctor".to_string(), json!(false));
            }
            AppointmentAction::Complete => {
                update_data.insert("completed_by_doctor".to_string(), json!(true));
            }
            AppointmentAction::MarkNoShow | AppointmentAction::Cancel => {}
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        // Matching on the status we validated against turns a concurrent
        // transition into an empty update instead of a lost write.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}&select={}",
            appointment_id, appointment.status, APPOINTMENT_SELECT
        );
        let updated: Vec<Appointment> = self
            .supabase
            .update(&path, auth_token, Value::Object(update_data))
            .await?;

        let updated = updated.into_iter().next().ok_or_else(|| {
            warn!("Appointment {} changed status during {}", appointment_id, action);
            AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                message: "Appointment was modified by another request; reload and retry".to_string(),
            }
        })?;

        info!("Appointment {} moved {} -> {}", appointment_id, appointment.status, updated.status);
        Ok(updated)
    }

    async fn record_exists(
        &self,
        table: &str,
        id: Uuid,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let path = format!("/rest/v1/{}?id=eq.{}&select=id", table, id);
        let row: Option<Value> = self.supabase.find_one(&path, auth_token).await?;
        Ok(row.is_some())
    }

    fn slot_aware(err: DatabaseError) -> AppointmentError {
        if err.is_conflict() {
            AppointmentError::SlotTaken
        } else {
            AppointmentError::Database(err)
        }
    }

    fn collect_changes(request: &UpdateAppointmentRequest) -> Result<AppointmentChanges, AppointmentError> {
        let mut errors = FieldErrors::new();
        let mut fields = Map::new();

        let date = request.date.as_deref().map(parse_iso_date);
        if let Some(parsed) = date {
            match parsed {
                Some(d) => {
                    fields.insert("date".to_string(), json!(d.format("%Y-%m-%d").to_string()));
                }
                None => errors.add("date", "Valid date is required"),
            }
        }

        let time = request.time.as_deref().map(str::trim);
        if let Some(t) = time {
            if is_time_slot(t) {
                fields.insert("time".to_string(), json!(t));
            } else {
                errors.add("time", "Time must be in HH:MM format");
            }
        }

        if let Some(reason) = &request.reason {
            if reason.trim().is_empty() {
                errors.add("reason", "Reason is required");
            } else {
                fields.insert("reason".to_string(), json!(reason.trim()));
            }
        }

        if let Some(notes) = &request.notes {
            fields.insert("notes".to_string(), json!(notes));
        }

        if let Some(prescription) = &request.prescription {
            fields.insert("prescription".to_string(), json!(prescription));
        }

        if let Some(raw) = request.follow_up_date.as_deref() {
            match parse_iso_date(raw) {
                Some(d) => {
                    fields.insert("follow_up_date".to_string(), json!(d.format("%Y-%m-%d").to_string()));
                }
                None => errors.add("follow_up_date", "Valid follow-up date is required"),
            }
        }

        errors.finish().map_err(AppointmentError::Validation)?;

        Ok(AppointmentChanges {
            date: date.flatten(),
            time: time.map(str::to_string),
            fields,
        })
    }
}

#[derive(Debug)]
struct AppointmentChanges {
    date: Option<NaiveDate>,
    time: Option<String>,
    fields: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn valid_request() -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            doctor_id: Some(Uuid::new_v4().to_string()),
            date: Some("2024-01-10".to_string()),
            time: Some("09:00".to_string()),
            reason: Some("  Persistent cough ".to_string()),
            notes: None,
            patient_id: None,
        }
    }

    #[test]
    fn test_valid_booking_is_normalized() {
        let booking = AppointmentService::validate_create_request(&valid_request()).unwrap();
        assert_eq!(booking.date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(booking.time, "09:00");
        assert_eq!(booking.reason, "Persistent cough");
    }

    #[test]
    fn test_every_missing_field_is_reported() {
        let result = AppointmentService::validate_create_request(&CreateAppointmentRequest::default());

        assert_matches!(result, Err(AppointmentError::Validation(errors)) => {
            let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
            assert_eq!(fields, vec!["doctor_id", "date", "time", "reason"]);
        });
    }

    #[test]
    fn test_invalid_time_format_is_rejected() {
        let request = CreateAppointmentRequest {
            time: Some("9am".to_string()),
            ..valid_request()
        };

        assert_matches!(
            AppointmentService::validate_create_request(&request),
            Err(AppointmentError::Validation(errors)) if errors[0].field == "time"
        );
    }

    #[test]
    fn test_collect_changes_rejects_bad_follow_up() {
        let request = UpdateAppointmentRequest {
            follow_up_date: Some("next week".to_string()),
            ..Default::default()
        };

        assert_matches!(
            AppointmentService::collect_changes(&request),
            Err(AppointmentError::Validation(errors)) if errors[0].field == "follow_up_date"
        );
    }
}
