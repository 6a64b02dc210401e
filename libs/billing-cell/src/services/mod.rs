pub mod billing;
pub mod invoice;
pub mod proof;

pub use billing::BillingService;
pub use invoice::InvoiceService;
pub use proof::PaymentProofStore;
