use std::path::PathBuf;
use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub upload_dir: PathBuf,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            upload_dir: std::env::temp_dir().join("clinic-test-cover"),
        }
    }
}

impl TestConfig {
    /// Config pointed at a mock PostgREST server.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            server_port: 0,
            upload_dir: self.upload_dir.clone(),
            max_upload_bytes: 1024 * 1024,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    /// Signed with [`TEST_JWT_SECRET`], valid for a day.
    pub fn token(&self) -> String {
        JwtTestUtils::create_test_token(self, TEST_JWT_SECRET, Some(24))
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": { "role": user.role },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows shaped like the clinic tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn profile_id_response(profile_id: &str) -> serde_json::Value {
        json!({ "id": profile_id })
    }

    pub fn user_summary(name: &str, email: &str) -> serde_json::Value {
        json!({
            "name": name,
            "email": email,
            "contact_number": "+1-555-0100"
        })
    }

    pub fn patient_response(patient_id: &str, user_id: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "user_id": user_id,
            "date_of_birth": "1990-04-12",
            "gender": "female",
            "blood_group": "O+",
            "address": "12 Harbour Road",
            "emergency_contact": null,
            "medical_history": [],
            "allergies": [],
            "user": Self::user_summary("Test Patient", "patient@example.com"),
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_response(doctor_id: &str, user_id: &str, specialization: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "user_id": user_id,
            "specialization": specialization,
            "license_number": "MD123456",
            "experience": 10,
            "education": [
                { "degree": "MBBS", "institution": "Medical University", "year": 2010 }
            ],
            "qualifications": ["Board Certified"],
            "bio": "Experienced general practitioner",
            "image": null,
            "contact": { "email": "doctor@example.com", "phone": null },
            "availability": {
                "monday": { "start": "09:00", "end": "17:00", "available": true },
                "sunday": { "start": null, "end": null, "available": false }
            },
            "consultation_fee": 150.0,
            "department": "General Medicine",
            "user": Self::user_summary("Dr. Test", "doctor@example.com"),
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "date": "2024-01-10",
            "time": "09:00",
            "status": status,
            "approved_by_doctor": false,
            "completed_by_doctor": false,
            "reason": "Persistent cough",
            "notes": null,
            "prescription": null,
            "follow_up_date": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn bill_response(bill_id: &str, patient_id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": bill_id,
            "patient_id": patient_id,
            "appointment_id": null,
            "invoice_number": "INV-1704067200000-A1B2C3",
            "services": [
                { "description": "Consultation", "quantity": 1, "unit_price": 100.0, "total_price": 100.0 }
            ],
            "subtotal": 100.0,
            "tax": 10.0,
            "discount": 5.0,
            "total_amount": 105.0,
            "status": status,
            "payment_method": null,
            "payment_date": null,
            "due_date": "2024-01-31T00:00:00Z",
            "payment_proof": null,
            "verified_by_doctor": false,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.email, "doc@example.com");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(user.role.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
