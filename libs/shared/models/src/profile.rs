use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user-level fields every embedded patient or doctor exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub name: String,
    pub email: String,
    pub contact_number: Option<String>,
}

/// Patient or doctor reference embedded in appointment and billing rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartySummary {
    pub id: Uuid,
    #[serde(default)]
    pub user: Option<ProfileSummary>,
}

/// PostgREST embed for the owning user of a `patients` or `doctors` row.
pub const USER_EMBED: &str = "user:profiles(name,email,contact_number)";
