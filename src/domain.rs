//! Domain vocabulary shared by the validator, the repos and the aggregator.
//!
//! Every category keeps its Portuguese slug (stored) and display label
//! (shown). Rows are decoded into these types once, at the repository
//! boundary.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]");
pub const DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
pub const DATETIME_SECONDS_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

pub fn format_date(d: Date) -> String {
    d.format(DATE_FORMAT).unwrap_or_default()
}

pub fn format_time_hm(t: Time) -> String {
    t.format(TIME_FORMAT).unwrap_or_default()
}

pub fn format_datetime(dt: PrimitiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).unwrap_or_default()
}

/// Wall-clock "now" with the same naive precision the records carry.
pub fn now_naive() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiabetesType {
    #[serde(rename = "tipo_1")]
    Tipo1,
    #[serde(rename = "tipo_2")]
    Tipo2,
    #[serde(rename = "pre_diabetes")]
    PreDiabetes,
    #[serde(rename = "gestacional")]
    Gestacional,
}

impl DiabetesType {
    pub const ALL: [DiabetesType; 4] = [
        DiabetesType::Tipo1,
        DiabetesType::Tipo2,
        DiabetesType::PreDiabetes,
        DiabetesType::Gestacional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiabetesType::Tipo1 => "tipo_1",
            DiabetesType::Tipo2 => "tipo_2",
            DiabetesType::PreDiabetes => "pre_diabetes",
            DiabetesType::Gestacional => "gestacional",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DiabetesType::Tipo1 => "Tipo 1",
            DiabetesType::Tipo2 => "Tipo 2",
            DiabetesType::PreDiabetes => "Pré-diabetes",
            DiabetesType::Gestacional => "Gestacional",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmergencyRelation {
    #[serde(rename = "pai")]
    Pai,
    #[serde(rename = "mae")]
    Mae,
    #[serde(rename = "cuidador")]
    Cuidador,
}

impl EmergencyRelation {
    pub const ALL: [EmergencyRelation; 3] = [
        EmergencyRelation::Pai,
        EmergencyRelation::Mae,
        EmergencyRelation::Cuidador,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyRelation::Pai => "pai",
            EmergencyRelation::Mae => "mae",
            EmergencyRelation::Cuidador => "cuidador",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EmergencyRelation::Pai => "Pai",
            EmergencyRelation::Mae => "Mãe",
            EmergencyRelation::Cuidador => "Cuidador",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

/// Activity categories in canonical order. The order matters: dashboard
/// series follow it and top-category ties are broken by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActivityCategory {
    #[serde(rename = "caminhada")]
    Caminhada,
    #[serde(rename = "natacao")]
    Natacao,
    #[serde(rename = "ciclismo")]
    Ciclismo,
    #[serde(rename = "musculacao")]
    Musculacao,
    #[serde(rename = "pilates")]
    Pilates,
}

impl ActivityCategory {
    pub const ALL: [ActivityCategory; 5] = [
        ActivityCategory::Caminhada,
        ActivityCategory::Natacao,
        ActivityCategory::Ciclismo,
        ActivityCategory::Musculacao,
        ActivityCategory::Pilates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::Caminhada => "caminhada",
            ActivityCategory::Natacao => "natacao",
            ActivityCategory::Ciclismo => "ciclismo",
            ActivityCategory::Musculacao => "musculacao",
            ActivityCategory::Pilates => "pilates",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActivityCategory::Caminhada => "Caminhada",
            ActivityCategory::Natacao => "Natação",
            ActivityCategory::Ciclismo => "Ciclismo",
            ActivityCategory::Musculacao => "Musculação",
            ActivityCategory::Pilates => "Pilates",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertType {
    #[serde(rename = "medicacao")]
    Medicacao,
    #[serde(rename = "refeicao")]
    Refeicao,
    #[serde(rename = "glicemia")]
    Glicemia,
    #[serde(rename = "exercicio")]
    Exercicio,
    #[serde(rename = "consulta")]
    Consulta,
}

impl AlertType {
    pub const ALL: [AlertType; 5] = [
        AlertType::Medicacao,
        AlertType::Refeicao,
        AlertType::Glicemia,
        AlertType::Exercicio,
        AlertType::Consulta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Medicacao => "medicacao",
            AlertType::Refeicao => "refeicao",
            AlertType::Glicemia => "glicemia",
            AlertType::Exercicio => "exercicio",
            AlertType::Consulta => "consulta",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertType::Medicacao => "Medicação",
            AlertType::Refeicao => "Refeição",
            AlertType::Glicemia => "Medição de Glicemia",
            AlertType::Exercicio => "Exercício físico",
            AlertType::Consulta => "Consulta médica",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementContext {
    #[serde(rename = "em_jejum")]
    EmJejum,
    #[serde(rename = "antes_refeicao")]
    AntesRefeicao,
    #[serde(rename = "2h_pos_refeicao")]
    PosRefeicao2h,
    #[serde(rename = "antes_dormir")]
    AntesDormir,
}

impl MeasurementContext {
    pub const ALL: [MeasurementContext; 4] = [
        MeasurementContext::EmJejum,
        MeasurementContext::AntesRefeicao,
        MeasurementContext::PosRefeicao2h,
        MeasurementContext::AntesDormir,
    ];

    /// Label used when a stored context no longer decodes.
    pub const UNKNOWN_LABEL: &'static str = "Sem contexto";

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementContext::EmJejum => "em_jejum",
            MeasurementContext::AntesRefeicao => "antes_refeicao",
            MeasurementContext::PosRefeicao2h => "2h_pos_refeicao",
            MeasurementContext::AntesDormir => "antes_dormir",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MeasurementContext::EmJejum => "Em Jejum",
            MeasurementContext::AntesRefeicao => "Antes da Refeição",
            MeasurementContext::PosRefeicao2h => "2h após a refeição",
            MeasurementContext::AntesDormir => "Antes de dormir",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

/// Weekdays in schedule order; the derived `Ord` keeps alert day sets sorted
/// Monday-first when collected into a `BTreeSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
            Weekday::Sun => "sun",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Weekday::Mon => "Segunda",
            Weekday::Tue => "Terça",
            Weekday::Wed => "Quarta",
            Weekday::Thu => "Quinta",
            Weekday::Fri => "Sexta",
            Weekday::Sat => "Sábado",
            Weekday::Sun => "Domingo",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

pub fn weekdays_to_csv(days: &BTreeSet<Weekday>) -> String {
    days.iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Tolerant read of the persisted `"mon,wed,fri"` column: unknown tokens are
/// dropped instead of failing the whole row.
pub fn weekdays_from_csv(raw: &str) -> BTreeSet<Weekday> {
    raw.split(',')
        .filter_map(|t| Weekday::from_slug(t.trim()))
        .collect()
}

/// An alert fires either on a weekly set of days or once on a calendar date,
/// never both, never neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertSchedule {
    Weekly(BTreeSet<Weekday>),
    Once(Date),
}

impl AlertSchedule {
    pub fn days_column(&self) -> String {
        match self {
            AlertSchedule::Weekly(days) => weekdays_to_csv(days),
            AlertSchedule::Once(_) => String::new(),
        }
    }

    pub fn date_column(&self) -> Option<String> {
        match self {
            AlertSchedule::Weekly(_) => None,
            AlertSchedule::Once(d) => Some(format_date(*d)),
        }
    }

    pub fn weekday_slugs(&self) -> Vec<&'static str> {
        match self {
            AlertSchedule::Weekly(days) => days.iter().map(|d| d.as_str()).collect(),
            AlertSchedule::Once(_) => Vec::new(),
        }
    }

    pub fn date(&self) -> Option<Date> {
        match self {
            AlertSchedule::Weekly(_) => None,
            AlertSchedule::Once(d) => Some(*d),
        }
    }
}

/// A calendar month key (`YYYY-MM`), kept as the first day of that month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthKey(Date);

impl MonthKey {
    pub fn parse(s: &str) -> Option<Self> {
        let (year, month) = s.split_once('-')?;
        let year: i32 = year.parse().ok()?;
        let month: u8 = month.parse().ok()?;
        let month = Month::try_from(month).ok()?;
        Date::from_calendar_date(year, month, 1).ok().map(MonthKey)
    }

    pub fn of(date: Date) -> Self {
        MonthKey(date.replace_day(1).unwrap_or(date))
    }

    pub fn contains(&self, date: Date) -> bool {
        date.year() == self.0.year() && date.month() == self.0.month()
    }

    pub fn first_day(&self) -> Date {
        self.0
    }

    pub fn start(&self) -> PrimitiveDateTime {
        PrimitiveDateTime::new(self.0, Time::MIDNIGHT)
    }

    pub fn next(&self) -> MonthKey {
        let (year, month) = match self.0.month() {
            Month::December => (self.0.year() + 1, Month::January),
            m => (self.0.year(), m.next()),
        };
        MonthKey(Date::from_calendar_date(year, month, 1).unwrap_or(self.0))
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.0.year(), self.0.month() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn weekday_csv_round_trip() {
        let days: BTreeSet<Weekday> = [Weekday::Fri, Weekday::Mon, Weekday::Wed]
            .into_iter()
            .collect();
        let csv = weekdays_to_csv(&days);
        assert_eq!(csv, "mon,wed,fri");
        assert_eq!(weekdays_from_csv(&csv), days);
    }

    #[test]
    fn weekday_csv_drops_unknown_tokens() {
        let days = weekdays_from_csv("mon,someday,,fri");
        assert_eq!(days.len(), 2);
        assert!(days.contains(&Weekday::Mon));
        assert!(days.contains(&Weekday::Fri));
    }

    #[test]
    fn month_key_parse_and_bounds() {
        let key = MonthKey::parse("2024-01").expect("valid key");
        assert_eq!(key.label(), "2024-01");
        assert!(key.contains(date!(2024 - 01 - 31)));
        assert!(!key.contains(date!(2024 - 02 - 01)));
        assert_eq!(key.next().label(), "2024-02");
        assert_eq!(MonthKey::parse("2024-12").map(|k| k.next().label()), Some("2025-01".into()));
    }

    #[test]
    fn month_key_rejects_garbage() {
        assert!(MonthKey::parse("2024").is_none());
        assert!(MonthKey::parse("2024-13").is_none());
        assert!(MonthKey::parse("janeiro").is_none());
    }

    #[test]
    fn slugs_resolve_to_labels() {
        assert_eq!(
            ActivityCategory::from_slug("caminhada").map(|c| c.label()),
            Some("Caminhada")
        );
        assert_eq!(
            MeasurementContext::from_slug("2h_pos_refeicao").map(|c| c.label()),
            Some("2h após a refeição")
        );
        assert_eq!(AlertType::from_slug("glicemia").map(|t| t.label()), Some("Medição de Glicemia"));
        assert!(DiabetesType::from_slug("tipo_3").is_none());
    }

    #[test]
    fn schedule_columns_are_mutually_exclusive() {
        let weekly = AlertSchedule::Weekly([Weekday::Mon, Weekday::Wed].into_iter().collect());
        assert_eq!(weekly.days_column(), "mon,wed");
        assert_eq!(weekly.date_column(), None);

        let once = AlertSchedule::Once(date!(2024 - 02 - 15));
        assert_eq!(once.days_column(), "");
        assert_eq!(once.date_column().as_deref(), Some("2024-02-15"));
    }
}
