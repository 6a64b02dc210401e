// libs/billing-cell/src/services/proof.rs
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::models::{BillingError, ProofUpload};

pub const PROOF_FIELD: &str = "payment_proof";
pub const PROOF_URL_PREFIX: &str = "/cover";

const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";
const MAX_FILE_NAME_LEN: usize = 100;

/// Strips path separators and anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|&c| c != '/' && c != '\\' && c != '\0')
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();

    let cleaned = cleaned.replace("..", "");
    let cleaned: String = cleaned.chars().take(MAX_FILE_NAME_LEN).collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        "payment-proof.pdf".to_string()
    } else {
        cleaned
    }
}

/// A single path component with nothing that could leave the upload dir.
fn is_stored_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}

/// Both the declared type and the leading bytes have to say PDF.
pub fn is_pdf(content_type: Option<&str>, bytes: &[u8]) -> bool {
    let declared = content_type
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
        .unwrap_or(false);

    declared && bytes.starts_with(PDF_MAGIC)
}

/// Pulls the `payment_proof` file out of a multipart body, ignoring other fields.
pub async fn read_proof_upload(mut multipart: Multipart) -> Result<ProofUpload, BillingError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BillingError::InvalidUpload(e.body_text()))?
    {
        if field.name() != Some(PROOF_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("payment-proof.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| BillingError::InvalidUpload(e.body_text()))?;

        debug!("Received {} bytes for {}", bytes.len(), file_name);
        return Ok(ProofUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(BillingError::InvalidUpload("No file uploaded".to_string()))
}

/// Writes payment proofs to the upload directory served under `/cover`.
pub struct PaymentProofStore {
    upload_dir: PathBuf,
}

impl PaymentProofStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Checks the upload, stores it as `<millis>-<name>` and returns its public path.
    pub async fn save(&self, upload: &ProofUpload) -> Result<String, BillingError> {
        if upload.bytes.is_empty() {
            return Err(BillingError::InvalidUpload("No file uploaded".to_string()));
        }
        if !is_pdf(upload.content_type.as_deref(), &upload.bytes) {
            warn!("Rejected non-PDF payment proof {}", upload.file_name);
            return Err(BillingError::InvalidUpload("Only PDF files are allowed".to_string()));
        }

        tokio::fs::create_dir_all(&self.upload_dir).await?;

        let stored_name = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            sanitize_file_name(&upload.file_name)
        );
        tokio::fs::write(self.upload_dir.join(&stored_name), &upload.bytes).await?;

        info!("Stored payment proof {}", stored_name);
        Ok(format!("{}/{}", PROOF_URL_PREFIX, stored_name))
    }

    /// Removes a stored proof by its public path. Missing files are ignored.
    pub async fn discard(&self, public_path: &str) {
        let Some(name) = public_path
            .strip_prefix(PROOF_URL_PREFIX)
            .map(|rest| rest.trim_start_matches('/'))
        else {
            return;
        };

        if !is_stored_name(name) {
            warn!("Refusing to remove payment proof outside upload dir: {}", public_path);
            return;
        }

        if let Err(e) = tokio::fs::remove_file(self.upload_dir.join(name)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove payment proof {}: {}", public_path, e);
            }
        }
    }
}
