//! Caller scoping shared by every resource cell.
//!
//! A token only says who the user is. Patients and doctors act through their
//! `patients` / `doctors` profile rows, so every scoped route first resolves
//! the caller into a [`CallerScope`] and then asks it for a listing filter or
//! an ownership decision.

use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{eq_filter, SupabaseClient};
use shared_database::DatabaseError;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerScope {
    Admin,
    Doctor { doctor_id: Uuid },
    Patient { patient_id: Uuid },
}

#[derive(Debug, Deserialize)]
struct ProfileId {
    id: Uuid,
}

/// Looks up the id of the profile row in `table` owned by `user_id`.
pub async fn lookup_profile_id(
    supabase: &SupabaseClient,
    table: &str,
    user_id: &str,
    auth_token: &str,
) -> Result<Option<Uuid>, DatabaseError> {
    let path = format!("/rest/v1/{}?user_id={}&select=id", table, eq_filter(user_id));
    let row: Option<ProfileId> = supabase.find_one(&path, auth_token).await?;
    Ok(row.map(|r| r.id))
}

pub async fn resolve_scope(
    supabase: &SupabaseClient,
    user: &User,
    auth_token: &str,
) -> Result<CallerScope, AppError> {
    let scope = match user.app_role() {
        Some(Role::Admin) => CallerScope::Admin,
        Some(Role::Doctor) => {
            let doctor_id = lookup_profile_id(supabase, "doctors", &user.id, auth_token)
                .await?
                .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))?;
            CallerScope::Doctor { doctor_id }
        }
        Some(Role::Patient) => {
            let patient_id = lookup_profile_id(supabase, "patients", &user.id, auth_token)
                .await?
                .ok_or_else(|| AppError::NotFound("Patient profile not found".to_string()))?;
            CallerScope::Patient { patient_id }
        }
        None => {
            return Err(AppError::Forbidden("Account has no clinic role".to_string()));
        }
    };

    debug!("Resolved user {} to scope {:?}", user.id, scope);
    Ok(scope)
}

impl CallerScope {
    pub fn role(&self) -> Role {
        match self {
            CallerScope::Admin => Role::Admin,
            CallerScope::Doctor { .. } => Role::Doctor,
            CallerScope::Patient { .. } => Role::Patient,
        }
    }

    pub fn require(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role()) {
            Ok(())
        } else {
            Err(AppError::access_denied())
        }
    }

    pub fn patient_id(&self) -> Option<Uuid> {
        match self {
            CallerScope::Patient { patient_id } => Some(*patient_id),
            _ => None,
        }
    }

    pub fn doctor_id(&self) -> Option<Uuid> {
        match self {
            CallerScope::Doctor { doctor_id } => Some(*doctor_id),
            _ => None,
        }
    }

    /// Strict ownership: patients see records about them, doctors see
    /// records they attend, admins see everything.
    pub fn can_access(&self, patient_id: Uuid, doctor_id: Option<Uuid>) -> bool {
        match self {
            CallerScope::Admin => true,
            CallerScope::Patient { patient_id: own } => *own == patient_id,
            CallerScope::Doctor { doctor_id: own } => doctor_id == Some(*own),
        }
    }

    pub fn ensure_access(&self, patient_id: Uuid, doctor_id: Option<Uuid>) -> Result<(), AppError> {
        if self.can_access(patient_id, doctor_id) {
            Ok(())
        } else {
            Err(AppError::access_denied())
        }
    }

    /// Patient-only restriction: staff pass, patients must own the record.
    pub fn ensure_patient_owns(&self, patient_id: Uuid) -> Result<(), AppError> {
        match self {
            CallerScope::Patient { patient_id: own } if *own != patient_id => {
                Err(AppError::access_denied())
            }
            _ => Ok(()),
        }
    }

    /// Query-string filter limiting a listing to records the caller attends
    /// or owns. `None` means unrestricted.
    pub fn ownership_filter(&self) -> Option<String> {
        match self {
            CallerScope::Admin => None,
            CallerScope::Doctor { doctor_id } => Some(format!("doctor_id=eq.{}", doctor_id)),
            CallerScope::Patient { patient_id } => Some(format!("patient_id=eq.{}", patient_id)),
        }
    }

    /// Like [`Self::ownership_filter`] but only patients are restricted.
    pub fn patient_filter(&self) -> Option<String> {
        self.patient_id().map(|id| format!("patient_id=eq.{}", id))
    }
}
