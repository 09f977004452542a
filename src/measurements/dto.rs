use serde::{Deserialize, Serialize};

use crate::domain::{format_datetime, MeasurementContext};
use crate::measurements::repo::Measurement;

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeasurementDto {
    pub id: i64,
    pub measured_at: String,
    pub glucose_level: f64,
    pub measurement_context: Option<MeasurementContext>,
    pub context_label: &'static str,
    pub notes: Option<String>,
}

impl From<&Measurement> for MeasurementDto {
    fn from(m: &Measurement) -> Self {
        Self {
            id: m.id,
            measured_at: format_datetime(m.measured_at),
            glucose_level: m.glucose_level,
            measurement_context: m.context,
            context_label: m
                .context
                .map(|c| c.label())
                .unwrap_or(MeasurementContext::UNKNOWN_LABEL),
            notes: m.notes.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeasurementCreated {
    pub message: String,
    pub measurement: MeasurementDto,
}

/// Everything the glucose dashboard renders for one month, pre-shaped into
/// parallel label/value series.
#[derive(Debug, Serialize)]
pub struct GlucoseDashboard {
    pub month_key: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub latest_value: Option<f64>,
    pub count: usize,
    pub avg_7d: Option<f64>,
    pub min_val: Option<f64>,
    pub max_val: Option<f64>,
    pub month_avg: Option<f64>,
    pub month_min: Option<f64>,
    pub month_max: Option<f64>,
    pub daily_labels: Vec<String>,
    pub daily_avgs: Vec<f64>,
    pub context_labels: Vec<String>,
    pub context_avgs: Vec<f64>,
}
