// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::{eq_filter, SupabaseClient};

use crate::models::{AppointmentError, AppointmentStatus};

#[derive(Debug, Deserialize)]
struct SlotHolder {
    id: Uuid,
}

/// Guards the (doctor, date, time) slot against double booking.
///
/// This is a read before the write; the `appointments_active_slot` partial
/// unique index closes the remaining race and surfaces as a store conflict.
pub struct SlotConflictService {
    supabase: Arc<SupabaseClient>,
}

impl SlotConflictService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub fn slot_query(
        doctor_id: Uuid,
        date: NaiveDate,
        time: &str,
        exclude_appointment_id: Option<Uuid>,
    ) -> String {
        let holding = AppointmentStatus::SLOT_HOLDING
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&time={}&status=in.({})&select=id",
            doctor_id,
            date.format("%Y-%m-%d"),
            eq_filter(time),
            holding
        );

        if let Some(exclude) = exclude_appointment_id {
            path.push_str(&format!("&id=neq.{}", exclude));
        }

        path
    }

    pub async fn ensure_slot_free(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: &str,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        debug!("Checking slot {} {} for doctor {}", date, time, doctor_id);

        let path = Self::slot_query(doctor_id, date, time, exclude_appointment_id);
        let holders: Vec<SlotHolder> = self.supabase.find_many(&path, auth_token).await?;

        if let Some(holder) = holders.first() {
            warn!(
                "Slot {} {} for doctor {} already held by appointment {}",
                date, time, doctor_id, holder.id
            );
            return Err(AppointmentError::SlotTaken);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_query_covers_every_slot_holding_status() {
        let doctor_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let path = SlotConflictService::slot_query(doctor_id, date, "09:00", None);

        assert!(path.contains(&format!("doctor_id=eq.{}", doctor_id)));
        assert!(path.contains("date=eq.2024-01-10"));
        assert!(path.contains("time=eq.09%3A00"));
        assert!(path.contains("status=in.(pending,approved,scheduled)"));
        assert!(!path.contains("id=neq."));
    }

    #[test]
    fn test_slot_query_excludes_the_appointment_being_moved() {
        let own = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let path = SlotConflictService::slot_query(Uuid::new_v4(), date, "10:30", Some(own));

        assert!(path.ends_with(&format!("&id=neq.{}", own)));
    }
}
