// libs/billing-cell/src/services/invoice.rs
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_utils::validation::{is_blank, FieldErrors};

use crate::models::{
    BillStatus, BillingError, CreateBillRequest, InvoiceTotals, NewBill, PaymentMethod,
    ServiceLine, ServiceLineItem, UpdatePaymentRequest,
};

pub const PAYMENT_TERM_DAYS: i64 = 30;

/// Rounds to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Invoice arithmetic and the payment-status guard.
pub struct InvoiceService;

impl Default for InvoiceService {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_create_request(&self, request: &CreateBillRequest) -> Result<NewBill, BillingError> {
        let mut errors = FieldErrors::new();

        let patient_id = match request.patient_id.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("patient_id", "Patient ID is required");
                None
            }
            Some(raw) => {
                let parsed = Uuid::parse_str(raw).ok();
                errors.check(parsed.is_some(), "patient_id", "Patient ID is invalid");
                parsed
            }
        };

        let appointment_id = match request.appointment_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let parsed = Uuid::parse_str(raw).ok();
                errors.check(parsed.is_some(), "appointment_id", "Appointment ID is invalid");
                parsed
            }
        };

        let mut services = Vec::new();
        match &request.services {
            None => errors.add("services", "Services must be an array"),
            Some(lines) if lines.is_empty() => {
                errors.add("services", "At least one service is required")
            }
            Some(lines) => {
                for (index, line) in lines.iter().enumerate() {
                    let prefix = format!("services[{}]", index);

                    if is_blank(line.description.as_deref()) {
                        errors.add(&format!("{}.description", prefix), "Service description is required");
                    }

                    let quantity = line
                        .quantity
                        .filter(|q| q.is_finite() && q.fract() == 0.0 && *q >= 1.0 && *q <= u32::MAX as f64)
                        .map(|q| q as u32);
                    if quantity.is_none() {
                        errors.add(&format!("{}.quantity", prefix), "Quantity must be a whole number of at least 1");
                    }

                    let unit_price = line.unit_price.filter(|p| p.is_finite() && *p >= 0.0);
                    if unit_price.is_none() {
                        errors.add(&format!("{}.unit_price", prefix), "Unit price must be a non-negative number");
                    }

                    if let (Some(description), Some(quantity), Some(unit_price)) =
                        (line.description.as_deref(), quantity, unit_price)
                    {
                        services.push(ServiceLine {
                            description: description.trim().to_string(),
                            quantity,
                            unit_price,
                        });
                    }
                }
            }
        }

        let tax = request.tax.unwrap_or(0.0);
        errors.check(tax.is_finite() && tax >= 0.0, "tax", "Tax must be a non-negative number");

        let discount = request.discount.unwrap_or(0.0);
        errors.check(
            discount.is_finite() && discount >= 0.0,
            "discount",
            "Discount must be a non-negative number",
        );

        if errors.is_empty() {
            let gross: f64 = services.iter().map(|s| s.quantity as f64 * s.unit_price).sum::<f64>() + tax;
            errors.check(discount <= gross, "discount", "Discount cannot exceed the bill amount");
        }

        errors.finish().map_err(BillingError::Validation)?;

        let Some(patient_id) = patient_id else {
            return Err(BillingError::BadRequest("Patient ID is required".to_string()));
        };

        Ok(NewBill {
            patient_id,
            appointment_id,
            services,
            tax,
            discount,
        })
    }

    /// total = Σ(quantity × unit_price) + tax − discount, each step in cents.
    pub fn compute_totals(&self, services: &[ServiceLine], tax: f64, discount: f64) -> InvoiceTotals {
        let services: Vec<ServiceLineItem> = services
            .iter()
            .map(|line| ServiceLineItem {
                description: line.description.clone(),
                quantity: line.quantity,
                unit_price: round_cents(line.unit_price),
                total_price: round_cents(line.quantity as f64 * line.unit_price),
            })
            .collect();

        let subtotal = round_cents(services.iter().map(|s| s.total_price).sum());
        let tax = round_cents(tax);
        let discount = round_cents(discount);
        let total_amount = round_cents(subtotal + tax - discount);

        debug!("Invoice totals: subtotal {} tax {} discount {} total {}", subtotal, tax, discount, total_amount);

        InvoiceTotals {
            services,
            subtotal,
            tax,
            discount,
            total_amount,
        }
    }

    /// `INV-<millis>-<6 hex digits>`.
    pub fn generate_invoice_number(&self, now: DateTime<Utc>) -> String {
        let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
        format!("INV-{}-{:06X}", now.timestamp_millis(), suffix)
    }

    pub fn due_date(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + Duration::days(PAYMENT_TERM_DAYS)
    }

    /// Parses a payment update and returns the target status and method.
    pub fn validate_payment_update(
        &self,
        request: &UpdatePaymentRequest,
    ) -> Result<(BillStatus, Option<PaymentMethod>), BillingError> {
        let mut errors = FieldErrors::new();

        let status = request.status.as_deref().and_then(|s| s.parse::<BillStatus>().ok());
        errors.check(status.is_some(), "status", "Valid status is required");

        let method = match request.payment_method.as_deref() {
            None => None,
            Some(raw) => {
                let parsed = raw.parse::<PaymentMethod>().ok();
                errors.check(parsed.is_some(), "payment_method", "Valid payment method is required");
                parsed
            }
        };

        if status == Some(BillStatus::Paid) && request.payment_method.is_none() {
            errors.add("payment_method", "Payment method is required when marking a bill paid");
        }

        errors.finish().map_err(BillingError::Validation)?;

        let Some(status) = status else {
            return Err(BillingError::BadRequest("Valid status is required".to_string()));
        };

        Ok((status, method))
    }

    pub fn validate_transition(&self, current: BillStatus, next: BillStatus) -> Result<(), BillingError> {
        if current.can_move_to(next) {
            return Ok(());
        }

        warn!("Invalid bill transition attempted: {} -> {}", current, next);
        let message = if current.is_terminal() || current == next {
            format!("Bill is already {}", current)
        } else {
            format!("Bill cannot move from {} to {}", current, next)
        };

        Err(BillingError::InvalidStatusTransition { from: current, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use crate::models::ServiceLineRequest;

    fn line(description: &str, quantity: f64, unit_price: f64) -> ServiceLineRequest {
        ServiceLineRequest {
            description: Some(description.to_string()),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
        }
    }

    #[test]
    fn test_total_is_lines_plus_tax_minus_discount() {
        let invoice = InvoiceService::new();
        let lines = vec![
            ServiceLine { description: "Consultation".into(), quantity: 1, unit_price: 100.0 },
            ServiceLine { description: "Blood panel".into(), quantity: 3, unit_price: 12.5 },
        ];

        let totals = invoice.compute_totals(&lines, 10.0, 5.0);

        assert_eq!(totals.services[1].total_price, 37.5);
        assert_eq!(totals.subtotal, 137.5);
        assert_eq!(totals.total_amount, 142.5);
    }

    #[test]
    fn test_totals_are_rounded_to_cents() {
        let invoice = InvoiceService::new();
        let lines = vec![ServiceLine { description: "Dressing".into(), quantity: 3, unit_price: 0.1 }];

        let totals = invoice.compute_totals(&lines, 0.0, 0.0);
        assert_eq!(totals.subtotal, 0.3);
        assert_eq!(totals.total_amount, 0.3);
    }

    #[test]
    fn test_create_request_reports_each_bad_line() {
        let invoice = InvoiceService::new();
        let request = CreateBillRequest {
            patient_id: Some(Uuid::new_v4().to_string()),
            services: Some(vec![line("Consultation", 1.0, 100.0), line("", 0.5, -1.0)]),
            ..Default::default()
        };

        assert_matches!(invoice.validate_create_request(&request), Err(BillingError::Validation(errors)) => {
            let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
            assert_eq!(fields, vec!["services[1].description", "services[1].quantity", "services[1].unit_price"]);
        });
    }

    #[test]
    fn test_missing_services_and_patient() {
        let invoice = InvoiceService::new();
        assert_matches!(
            invoice.validate_create_request(&CreateBillRequest::default()),
            Err(BillingError::Validation(errors)) if errors.len() == 2
        );
    }

    #[test]
    fn test_discount_cannot_make_total_negative() {
        let invoice = InvoiceService::new();
        let request = CreateBillRequest {
            patient_id: Some(Uuid::new_v4().to_string()),
            services: Some(vec![line("Consultation", 1.0, 50.0)]),
            discount: Some(80.0),
            ..Default::default()
        };

        assert_matches!(
            invoice.validate_create_request(&request),
            Err(BillingError::Validation(errors)) if errors[0].field == "discount"
        );
    }

    #[test]
    fn test_invoice_number_format() {
        let invoice = InvoiceService::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let number = invoice.generate_invoice_number(now);

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts[0], "INV");
        assert_eq!(parts[1], "1704067200000");
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

        assert_eq!(invoice.due_date(now), Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_paid_requires_method() {
        let invoice = InvoiceService::new();
        let request = UpdatePaymentRequest {
            status: Some("paid".to_string()),
            payment_method: None,
        };

        assert_matches!(
            invoice.validate_payment_update(&request),
            Err(BillingError::Validation(errors)) if errors[0].field == "payment_method"
        );

        let request = UpdatePaymentRequest {
            status: Some("paid".to_string()),
            payment_method: Some("card".to_string()),
        };
        assert_eq!(
            invoice.validate_payment_update(&request).unwrap(),
            (BillStatus::Paid, Some(PaymentMethod::Card))
        );
    }

    #[test]
    fn test_terminal_bills_stay_put() {
        let invoice = InvoiceService::new();
        let err = invoice
            .validate_transition(BillStatus::Paid, BillStatus::Cancelled)
            .unwrap_err();
        assert_eq!(err.to_string(), "Bill is already paid");

        assert!(invoice.validate_transition(BillStatus::Overdue, BillStatus::Paid).is_ok());
    }
}
