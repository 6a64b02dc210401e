use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{ilike_contains, SupabaseClient};
use shared_models::auth::Role;
use shared_models::profile::USER_EMBED;
use shared_utils::access::CallerScope;
use shared_utils::validation::{parse_iso_date, FieldErrors};

use crate::models::{BloodGroup, Gender, Patient, PatientError, UpdatePatientRequest};

#[derive(Debug, Deserialize)]
struct ProfileRef {
    id: Uuid,
}

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
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

    pub async fn list_patients(&self, scope: &CallerScope, auth_token: &str) -> Result<Vec<Patient>, PatientError> {
        Self::require_staff(scope)?;

        let path = format!("/rest/v1/patients?select={}&order=created_at.desc", Self::select());
        Ok(self.supabase.find_many(&path, auth_token).await?)
    }

    pub async fn get_patient(
        &self,
        scope: &CallerScope,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        scope.ensure_patient_owns(patient_id).map_err(|_| {
            warn!("{:?} denied access to patient {}", scope, patient_id);
            PatientError::Unauthorized
        })?;

        let path = format!("/rest/v1/patients?id=eq.{}&select={}", patient_id, Self::select());
        self.supabase
            .find_one(&path, auth_token)
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub async fn update_patient(
        &self,
        scope: &CallerScope,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        if request.is_empty() {
            return Err(PatientError::BadRequest("No updatable fields supplied".to_string()));
        }

        let mut update_data = Self::validate_update(&request)?;

        // Ownership and existence are checked against the stored row.
        self.get_patient(scope, patient_id, auth_token).await?;

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}&select={}", patient_id, Self::select());
        let updated: Vec<Patient> = self
            .supabase
            .update(&path, auth_token, Value::Object(update_data))
            .await?;

        info!("Patient profile {} updated", patient_id);
        updated.into_iter().next().ok_or(PatientError::NotFound)
    }

    /// Case-insensitive match on the owning user's name or email.
    pub async fn search_patients(
        &self,
        scope: &CallerScope,
        query: &str,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        Self::require_staff(scope)?;

        let term = query.trim();
        if term.is_empty() {
            return Err(PatientError::BadRequest("Search query is required".to_string()));
        }

        debug!("Searching patients matching {:?}", term);

        let pattern = ilike_contains(term);
        let users_path = format!(
            "/rest/v1/profiles?role=eq.patient&or=(name.{},email.{})&select=id",
            pattern, pattern
        );
        let users: Vec<ProfileRef> = self.supabase.find_many(&users_path, auth_token).await?;

        if users.is_empty() {
            return Ok(Vec::new());
        }

        let ids = users
            .iter()
            .map(|u| u.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/patients?user_id=in.({})&select={}&order=created_at.desc",
            ids,
            Self::select()
        );

        Ok(self.supabase.find_many(&path, auth_token).await?)
    }

    fn validate_update(request: &UpdatePatientRequest) -> Result<Map<String, Value>, PatientError> {
        let mut errors = FieldErrors::new();
        let mut fields = Map::new();

        if let Some(raw) = request.date_of_birth.as_deref() {
            match parse_iso_date(raw) {
                Some(dob) if dob <= Utc::now().date_naive() => {
                    fields.insert("date_of_birth".to_string(), json!(dob.format("%Y-%m-%d").to_string()));
                }
                _ => errors.add("date_of_birth", "Valid date of birth is required"),
            }
        }

        if let Some(raw) = request.gender.as_deref() {
            match raw.parse::<Gender>() {
                Ok(gender) => {
                    fields.insert("gender".to_string(), json!(gender));
                }
                Err(_) => errors.add("gender", "Valid gender is required"),
            }
        }

        if let Some(raw) = request.blood_group.as_deref() {
            match raw.parse::<BloodGroup>() {
                Ok(group) => {
                    fields.insert("blood_group".to_string(), json!(group));
                }
                Err(_) => errors.add("blood_group", "Valid blood group is required"),
            }
        }

        if let Some(address) = &request.address {
            fields.insert("address".to_string(), json!(address.trim()));
        }
        if let Some(contact) = &request.emergency_contact {
            fields.insert("emergency_contact".to_string(), json!(contact));
        }
        if let Some(history) = &request.medical_history {
            fields.insert("medical_history".to_string(), json!(history));
        }
        if let Some(allergies) = &request.allergies {
            fields.insert("allergies".to_string(), json!(allergies));
        }

        errors.finish().map_err(PatientError::Validation)?;
        Ok(fields)
    }

    fn require_staff(scope: &CallerScope) -> Result<(), PatientError> {
        scope
            .require(&[Role::Admin, Role::Doctor])
            .map_err(|_| PatientError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_update_validation_reports_each_field() {
        let request = UpdatePatientRequest {
            date_of_birth: Some("12/04/1990".to_string()),
            gender: Some("unknown".to_string()),
            blood_group: Some("Z+".to_string()),
            ..Default::default()
        };

        assert_matches!(PatientService::validate_update(&request), Err(PatientError::Validation(errors)) => {
            let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
            assert_eq!(fields, vec!["date_of_birth", "gender", "blood_group"]);
        });
    }

    #[test]
    fn test_update_keeps_only_known_fields() {
        let request = UpdatePatientRequest {
            date_of_birth: Some("1990-04-12".to_string()),
            blood_group: Some("AB+".to_string()),
            allergies: Some(vec!["penicillin".to_string()]),
            ..Default::default()
        };

        let fields = PatientService::validate_update(&request).unwrap();
        assert_eq!(fields["date_of_birth"], "1990-04-12");
        assert_eq!(fields["blood_group"], "AB+");
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_future_birth_date_is_rejected() {
        let request = UpdatePatientRequest {
            date_of_birth: Some("2999-01-01".to_string()),
            ..Default::default()
        };
        assert_matches!(PatientService::validate_update(&request), Err(PatientError::Validation(_)));
    }
}
