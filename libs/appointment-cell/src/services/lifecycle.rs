// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, info, warn};

use shared_models::auth::Role;

use crate::models::{AppointmentAction, AppointmentError, AppointmentStatus};

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validates `action` against the current status and returns the status
    /// the appointment moves to.
    pub fn validate_transition(
        &self,
        current_status: AppointmentStatus,
        action: AppointmentAction,
    ) -> Result<AppointmentStatus, AppointmentError> {
        debug!("Validating {} from {}", action, current_status);

        if !self.get_valid_actions(current_status).contains(&action) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, action);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                message: Self::rejection_message(action).to_string(),
            });
        }

        let next = action.target_status();
        info!("Status transition validated: {} -> {}", current_status, next);
        Ok(next)
    }

    pub fn get_valid_actions(&self, current_status: AppointmentStatus) -> Vec<AppointmentAction> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentAction::Approve,
                AppointmentAction::Reject,
                AppointmentAction::Cancel,
            ],
            AppointmentStatus::Approved | AppointmentStatus::Scheduled => vec![
                AppointmentAction::Complete,
                AppointmentAction::MarkNoShow,
                AppointmentAction::Cancel,
            ],
            // Terminal states
            AppointmentStatus::Rejected
            | AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => vec![],
        }
    }

    /// Who may perform an action on an appointment they are party to.
    pub fn allowed_roles(&self, action: AppointmentAction) -> &'static [Role] {
        match action {
            AppointmentAction::Approve
            | AppointmentAction::Reject
            | AppointmentAction::Complete
            | AppointmentAction::MarkNoShow => &[Role::Doctor],
            AppointmentAction::Cancel => &[Role::Patient, Role::Doctor, Role::Admin],
        }
    }

    fn rejection_message(action: AppointmentAction) -> &'static str {
        match action {
            AppointmentAction::Approve | AppointmentAction::Reject => "Appointment already processed",
            AppointmentAction::Complete => "Appointment not in correct state to complete",
            AppointmentAction::MarkNoShow => "Appointment not in correct state to mark as no-show",
            AppointmentAction::Cancel => "Appointment can no longer be cancelled",
        }
    }
}
