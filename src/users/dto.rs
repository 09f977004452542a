use serde::Serialize;

use crate::domain::{format_datetime, DiabetesType, EmergencyRelation};
use crate::users::repo::User;

/// Full profile as shown on the account page.
#[derive(Debug, Serialize)]
pub struct AccountDto {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub diabetes_type: Option<DiabetesType>,
    pub diabetes_type_label: Option<&'static str>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relation: Option<EmergencyRelation>,
    pub emergency_contact_relation_label: Option<&'static str>,
    pub active: bool,
    pub created_at: String,
}

impl From<&User> for AccountDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            phone: user.phone.clone(),
            height: user.height,
            weight: user.weight,
            diabetes_type: user.diabetes_type,
            diabetes_type_label: user.diabetes_type.map(|t| t.label()),
            emergency_contact_name: user.emergency_contact_name.clone(),
            emergency_contact_phone: user.emergency_contact_phone.clone(),
            emergency_contact_relation: user.emergency_contact_relation,
            emergency_contact_relation_label: user.emergency_contact_relation.map(|r| r.label()),
            active: user.active,
            created_at: format_datetime(user.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountUpdated {
    pub message: String,
    pub user: AccountDto,
}
