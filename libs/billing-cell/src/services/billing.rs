// libs/billing-cell/src/services/billing.rs
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_database::DatabaseError;
use shared_models::auth::Role;
use shared_utils::access::CallerScope;

use crate::models::{
    Bill, BillStatus, BillingError, CreateBillRequest, ProofUpload, UpdatePaymentRequest,
};
use crate::services::invoice::InvoiceService;
use crate::services::proof::PaymentProofStore;

/// Bill columns plus the embedded patient and appointment summaries.
pub const BILL_SELECT: &str = "*,\
patient:patients(id,user:profiles(name,email,contact_number)),\
appointment:appointments(id,date,time,status)";

const INVOICE_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize)]
struct AppointmentOwner {
    patient_id: Uuid,
}

pub struct BillingService {
    supabase: Arc<SupabaseClient>,
    invoice_service: InvoiceService,
    proof_store: PaymentProofStore,
}

impl BillingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            invoice_service: InvoiceService::new(),
            proof_store: PaymentProofStore::new(config.upload_dir.clone()),
        }
    }

    pub fn supabase(&self) -> &SupabaseClient {
        &self.supabase
    }

    pub async fn list_bills(&self, scope: &CallerScope, auth_token: &str) -> Result<Vec<Bill>, BillingError> {
        let mut path = format!("/rest/v1/billing?select={}&order=created_at.desc", BILL_SELECT);
        if let Some(filter) = scope.patient_filter() {
            path.push('&');
            path.push_str(&filter);
        }

        debug!("Listing bills for {:?}", scope);
        Ok(self.supabase.find_many(&path, auth_token).await?)
    }

    pub async fn get_bill(&self, bill_id: Uuid, auth_token: &str) -> Result<Bill, BillingError> {
        let path = format!("/rest/v1/billing?id=eq.{}&select={}", bill_id, BILL_SELECT);

        self.supabase
            .find_one(&path, auth_token)
            .await?
            .ok_or(BillingError::NotFound)
    }

    /// Staff read any bill; patients only their own.
    pub async fn get_scoped_bill(
        &self,
        scope: &CallerScope,
        bill_id: Uuid,
        auth_token: &str,
    ) -> Result<Bill, BillingError> {
        let bill = self.get_bill(bill_id, auth_token).await?;

        scope.ensure_patient_owns(bill.patient_id).map_err(|_| {
            warn!("{:?} denied access to bill {}", scope, bill_id);
            BillingError::Forbidden("Access denied".to_string())
        })?;

        Ok(bill)
    }

    pub async fn create_bill(
        &self,
        scope: &CallerScope,
        request: CreateBillRequest,
        auth_token: &str,
    ) -> Result<Bill, BillingError> {
        Self::require(scope, &[Role::Admin, Role::Doctor])?;

        let new_bill = self.invoice_service.validate_create_request(&request)?;

        let patient_path = format!("/rest/v1/patients?id=eq.{}&select=id", new_bill.patient_id);
        let patient: Option<Value> = self.supabase.find_one(&patient_path, auth_token).await?;
        if patient.is_none() {
            return Err(BillingError::PatientNotFound);
        }

        if let Some(appointment_id) = new_bill.appointment_id {
            let path = format!("/rest/v1/appointments?id=eq.{}&select=patient_id", appointment_id);
            let owner: AppointmentOwner = self
                .supabase
                .find_one(&path, auth_token)
                .await?
                .ok_or(BillingError::AppointmentNotFound)?;

            if owner.patient_id != new_bill.patient_id {
                return Err(BillingError::AppointmentMismatch);
            }
        }

        let totals = self
            .invoice_service
            .compute_totals(&new_bill.services, new_bill.tax, new_bill.discount);

        let table = format!("billing?select={}", BILL_SELECT);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = Utc::now();
            let invoice_number = self.invoice_service.generate_invoice_number(now);

            let bill_data = json!({
                "patient_id": new_bill.patient_id,
                "appointment_id": new_bill.appointment_id,
                "invoice_number": invoice_number,
                "services": totals.services,
                "subtotal": totals.subtotal,
                "tax": totals.tax,
                "discount": totals.discount,
                "total_amount": totals.total_amount,
                "status": BillStatus::Pending,
                "due_date": self.invoice_service.due_date(now).to_rfc3339(),
                "verified_by_doctor": false,
                "created_at": now.to_rfc3339(),
                "updated_at": now.to_rfc3339()
            });

            match self.supabase.insert::<Bill>(&table, auth_token, bill_data).await {
                Ok(created) => {
                    let bill = created.into_iter().next().ok_or_else(|| {
                        BillingError::Database(DatabaseError::Decode("Insert returned no bill".to_string()))
                    })?;
                    info!("Bill {} created as {}", bill.id, bill.invoice_number);
                    return Ok(bill);
                }
                Err(e) if e.is_conflict() && attempt < INVOICE_NUMBER_ATTEMPTS => {
                    warn!("Invoice number {} already used, retrying", invoice_number);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn update_payment(
        &self,
        scope: &CallerScope,
        bill_id: Uuid,
        request: UpdatePaymentRequest,
        auth_token: &str,
    ) -> Result<Bill, BillingError> {
        Self::require(scope, &[Role::Admin])?;

        let (status, method) = self.invoice_service.validate_payment_update(&request)?;
        let bill = self.get_bill(bill_id, auth_token).await?;
        self.invoice_service.validate_transition(bill.status, status)?;

        let now = Utc::now().to_rfc3339();
        let mut update_data = Map::new();
        update_data.insert("status".to_string(), json!(status));
        if status == BillStatus::Paid {
            update_data.insert("payment_method".to_string(), json!(method));
            update_data.insert("payment_date".to_string(), json!(now));
        }
        update_data.insert("updated_at".to_string(), json!(now));

        let path = format!(
            "/rest/v1/billing?id=eq.{}&status=eq.{}&select={}",
            bill_id, bill.status, BILL_SELECT
        );
        let updated: Vec<Bill> = self
            .supabase
            .update(&path, auth_token, Value::Object(update_data))
            .await?;

        let updated = updated.into_iter().next().ok_or_else(|| {
            warn!("Bill {} changed status during payment update", bill_id);
            BillingError::InvalidStatusTransition {
                from: bill.status,
                message: "Bill was modified by another request; reload and retry".to_string(),
            }
        })?;

        info!("Bill {} moved {} -> {}", bill_id, bill.status, updated.status);
        Ok(updated)
    }

    /// Stores a patient's PDF proof against their pending bill.
    pub async fn attach_payment_proof(
        &self,
        scope: &CallerScope,
        bill_id: Uuid,
        upload: ProofUpload,
        auth_token: &str,
    ) -> Result<Bill, BillingError> {
        Self::require(scope, &[Role::Patient])?;

        let bill = self.get_scoped_bill(scope, bill_id, auth_token).await?;
        if bill.status != BillStatus::Pending {
            return Err(BillingError::InvalidStatusTransition {
                from: bill.status,
                message: "Payment proof can only be uploaded for pending bills".to_string(),
            });
        }

        let public_path = self.proof_store.save(&upload).await?;

        let path = format!("/rest/v1/billing?id=eq.{}&select={}", bill_id, BILL_SELECT);
        let update_data = json!({
            "payment_proof": public_path,
            "verified_by_doctor": false,
            "updated_at": Utc::now().to_rfc3339()
        });

        let updated: Vec<Bill> = match self.supabase.update(&path, auth_token, update_data).await {
            Ok(rows) => rows,
            Err(e) => {
                self.proof_store.discard(&public_path).await;
                return Err(e.into());
            }
        };

        if let Some(previous) = bill.payment_proof.as_deref() {
            self.proof_store.discard(previous).await;
        }

        info!("Payment proof attached to bill {}", bill_id);
        updated.into_iter().next().ok_or(BillingError::NotFound)
    }

    pub async fn verify_payment(
        &self,
        scope: &CallerScope,
        bill_id: Uuid,
        auth_token: &str,
    ) -> Result<Bill, BillingError> {
        Self::require(scope, &[Role::Doctor])?;

        let bill = self.get_bill(bill_id, auth_token).await?;
        if bill.payment_proof.is_none() {
            return Err(BillingError::MissingProof);
        }

        let path = format!("/rest/v1/billing?id=eq.{}&select={}", bill_id, BILL_SELECT);
        let updated: Vec<Bill> = self
            .supabase
            .update(
                &path,
                auth_token,
                json!({ "verified_by_doctor": true, "updated_at": Utc::now().to_rfc3339() }),
            )
            .await?;

        info!("Payment on bill {} verified by doctor {:?}", bill_id, scope.doctor_id());
        updated.into_iter().next().ok_or(BillingError::NotFound)
    }

    fn require(scope: &CallerScope, allowed: &[Role]) -> Result<(), BillingError> {
        scope
            .require(allowed)
            .map_err(|_| BillingError::Forbidden("Access denied".to_string()))
    }
}
