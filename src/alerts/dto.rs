use serde::Serialize;

use crate::alerts::repo::Alert;
use crate::domain::{format_time_hm, AlertType};

#[derive(Debug, Serialize)]
pub struct AlertDto {
    pub id: i64,
    pub alert_type: AlertType,
    pub alert_type_label: &'static str,
    pub alert_time: String,
    /// Weekday slugs in Monday-first order; empty for dated alerts.
    pub days: Vec<&'static str>,
    pub alert_date: Option<String>,
}

impl From<&Alert> for AlertDto {
    fn from(a: &Alert) -> Self {
        Self {
            id: a.id,
            alert_type: a.alert_type,
            alert_type_label: a.alert_type.label(),
            alert_time: format_time_hm(a.alert_time),
            days: a.schedule.weekday_slugs(),
            alert_date: a.schedule.date_column(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlertSaved {
    pub message: String,
    pub alert: AlertDto,
}

/// Envelope consumed by the in-browser notification poller.
#[derive(Debug, Serialize)]
pub struct AlertsData {
    pub alerts: Vec<AlertDto>,
}
