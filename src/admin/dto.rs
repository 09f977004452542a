use serde::Serialize;

use crate::domain::format_datetime;
use crate::users::repo::User;

/// Roster row for the administration screen.
#[derive(Debug, Serialize)]
pub struct AdminUserDto {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub diabetes_type_label: Option<&'static str>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relation_label: Option<&'static str>,
    pub active: bool,
    pub created_at: String,
}

impl From<&User> for AdminUserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            phone: user.phone.clone(),
            diabetes_type_label: user.diabetes_type.map(|t| t.label()),
            emergency_contact_name: user.emergency_contact_name.clone(),
            emergency_contact_phone: user.emergency_contact_phone.clone(),
            emergency_contact_relation_label: user.emergency_contact_relation.map(|r| r.label()),
            active: user.active,
            created_at: format_datetime(user.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatabaseInfo {
    pub path: String,
    /// `None` when the data file has not been created yet.
    pub size_bytes: Option<u64>,
}
