use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use shared_models::error::FieldError;

/// Collects field errors for a cell error type to carry as a 400 response.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Hands the collected errors to a cell-specific error type.
    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

pub fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Accepts a calendar date or a full RFC 3339 timestamp and keeps the date.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

fn time_slot_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("time slot pattern is valid")
    })
}

/// `HH:MM`, 24-hour clock.
pub fn is_time_slot(value: &str) -> bool {
    time_slot_regex().is_match(value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_iso_date_accepts_date_and_timestamp() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(parse_iso_date("2024-01-10"), Some(expected));
        assert_eq!(parse_iso_date("2024-01-10T09:00:00Z"), Some(expected));
        assert_eq!(parse_iso_date("10/01/2024"), None);
    }

    #[test]
    fn test_time_slots() {
        assert!(is_time_slot("09:00"));
        assert!(is_time_slot("23:59"));
        assert!(!is_time_slot("9:00"));
        assert!(!is_time_slot("24:00"));
        assert!(!is_time_slot("morning"));
    }

    #[test]
    fn test_field_errors_finish() {
        let mut errors = FieldErrors::new();
        errors.check(true, "reason", "Reason is required");
        assert!(errors.is_empty());

        errors.check(false, "time", "Time is required");
        assert_matches!(errors.finish(), Err(list) if list.len() == 1 && list[0].field == "time");
    }
}
