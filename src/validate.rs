//! Form validation and normalization.
//!
//! Every function here is pure: raw form fields (strings) go in, either a
//! typed record or the full list of violated constraints comes out. Nothing
//! short-circuits after the first error, so the client can show all messages
//! at once. Checks that need the store (uniqueness, current-password) happen
//! in the handlers and are appended to the same error list.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use time::{Date, PrimitiveDateTime, Time};

use crate::domain::{
    ActivityCategory, AlertSchedule, AlertType, DiabetesType, EmergencyRelation,
    MeasurementContext, Weekday, DATE_FORMAT, TIME_FORMAT,
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Strips everything that is not an ASCII digit.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Brazilian numbers: DDD + 8 or 9 digits.
pub fn phone_is_valid(digits: &str) -> bool {
    matches!(digits.len(), 10 | 11)
}

/// Empty input means "not provided"; anything present must be a positive
/// number. Accepts a decimal comma.
pub fn parse_positive_float(raw: &str) -> Result<Option<f64>, ()> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.replace(',', ".").parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(Some(v)),
        _ => Err(()),
    }
}

pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), DATE_FORMAT).ok()
}

pub fn parse_time_hm(raw: &str) -> Option<Time> {
    Time::parse(raw.trim(), TIME_FORMAT).ok()
}

pub fn parse_datetime(date: &str, time: &str) -> Option<PrimitiveDateTime> {
    Some(PrimitiveDateTime::new(parse_date(date)?, parse_time_hm(time)?))
}

fn optional_phone(raw: &str, message: &str, errors: &mut Vec<String>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let digits = normalize_phone(raw);
    if phone_is_valid(&digits) {
        Some(digits)
    } else {
        errors.push(message.to_string());
        None
    }
}

fn optional_measure(raw: &str, message: &str, errors: &mut Vec<String>) -> Option<f64> {
    match parse_positive_float(raw) {
        Ok(v) => v,
        Err(()) => {
            errors.push(message.to_string());
            None
        }
    }
}

// ---- profile (registration / account edit) ----

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub diabetes_type: String,
    #[serde(default)]
    pub emergency_contact_name: String,
    #[serde(default)]
    pub emergency_contact_phone: String,
    #[serde(default)]
    pub emergency_contact_relation: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub diabetes_type: String,
    #[serde(default)]
    pub emergency_contact_name: String,
    #[serde(default)]
    pub emergency_contact_phone: String,
    #[serde(default)]
    pub emergency_contact_relation: String,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Normalized profile fields shared by registration and account edit.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub diabetes_type: Option<DiabetesType>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relation: Option<EmergencyRelation>,
}

#[derive(Debug)]
pub struct NewUser {
    pub profile: ProfileUpdate,
    pub password: String,
}

#[derive(Debug)]
pub struct AccountUpdate {
    pub profile: ProfileUpdate,
    /// Present only when the user is changing their password; the handler
    /// must re-verify `current_password` against the stored hash first.
    pub new_password: Option<String>,
}

#[allow(clippy::too_many_arguments)]
fn validate_profile(
    name: &str,
    email: &str,
    username: &str,
    phone: &str,
    height: &str,
    weight: &str,
    diabetes_type: &str,
    emergency_name: &str,
    emergency_phone: &str,
    emergency_relation: &str,
    errors: &mut Vec<String>,
) -> ProfileUpdate {
    let name = name.trim().to_string();
    if name.is_empty() {
        errors.push("Informe o nome.".into());
    }

    let email = email.trim().to_lowercase();
    if email.is_empty() {
        errors.push("Informe o e-mail.".into());
    } else if !is_valid_email(&email) {
        errors.push("E-mail inválido.".into());
    }

    let username = username.trim().to_lowercase();
    if username.is_empty() {
        errors.push("Informe o login.".into());
    }

    let phone = optional_phone(
        phone,
        "Telefone inválido: use DDD e número (10 ou 11 dígitos).",
        errors,
    );
    let height = optional_measure(height, "Altura deve ser um número maior que zero.", errors);
    let weight = optional_measure(weight, "Peso deve ser um número maior que zero.", errors);

    let diabetes_type = match diabetes_type.trim() {
        "" => None,
        slug => match DiabetesType::from_slug(slug) {
            Some(v) => Some(v),
            None => {
                errors.push("Tipo de diabetes inválido.".into());
                None
            }
        },
    };

    let emergency_contact_name = match emergency_name.trim() {
        "" => None,
        n => Some(n.to_string()),
    };
    let emergency_contact_phone = optional_phone(
        emergency_phone,
        "Telefone do contato de emergência inválido: use DDD e número (10 ou 11 dígitos).",
        errors,
    );
    let emergency_contact_relation = match emergency_relation.trim() {
        "" => None,
        slug => match EmergencyRelation::from_slug(slug) {
            Some(v) => Some(v),
            None => {
                errors.push("Relação do contato de emergência inválida.".into());
                None
            }
        },
    };

    ProfileUpdate {
        name,
        email,
        username,
        phone,
        height,
        weight,
        diabetes_type,
        emergency_contact_name,
        emergency_contact_phone,
        emergency_contact_relation,
    }
}

pub fn validate_register(form: &RegisterForm) -> Result<NewUser, Vec<String>> {
    let mut errors = Vec::new();
    let profile = validate_profile(
        &form.name,
        &form.email,
        &form.username,
        &form.phone,
        &form.height,
        &form.weight,
        &form.diabetes_type,
        &form.emergency_contact_name,
        &form.emergency_contact_phone,
        &form.emergency_contact_relation,
        &mut errors,
    );

    if form.password.len() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "A senha deve ter pelo menos {MIN_PASSWORD_LEN} caracteres."
        ));
    }

    if errors.is_empty() {
        Ok(NewUser {
            profile,
            password: form.password.clone(),
        })
    } else {
        Err(errors)
    }
}

pub fn validate_account(form: &AccountForm) -> Result<AccountUpdate, Vec<String>> {
    let mut errors = Vec::new();
    let profile = validate_profile(
        &form.name,
        &form.email,
        &form.username,
        &form.phone,
        &form.height,
        &form.weight,
        &form.diabetes_type,
        &form.emergency_contact_name,
        &form.emergency_contact_phone,
        &form.emergency_contact_relation,
        &mut errors,
    );

    let new_password = if form.new_password.is_empty() && form.confirm_password.is_empty() {
        None
    } else {
        if form.new_password.len() < MIN_PASSWORD_LEN {
            errors.push(format!(
                "A nova senha deve ter pelo menos {MIN_PASSWORD_LEN} caracteres."
            ));
        }
        if form.new_password != form.confirm_password {
            errors.push("As senhas não coincidem.".into());
        }
        if form.current_password.is_empty() {
            errors.push("Informe a senha atual para alterá-la.".into());
        }
        Some(form.new_password.clone())
    };

    if errors.is_empty() {
        Ok(AccountUpdate {
            profile,
            new_password,
        })
    } else {
        Err(errors)
    }
}

pub fn validate_password_reset(new_password: &str, confirm_password: &str) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if new_password.len() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "A nova senha deve ter pelo menos {MIN_PASSWORD_LEN} caracteres."
        ));
    }
    if new_password != confirm_password {
        errors.push("As senhas não coincidem.".into());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ---- measurements ----

#[derive(Debug, Deserialize)]
pub struct MeasurementForm {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub glucose_level: String,
    #[serde(default)]
    pub measurement_context: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug)]
pub struct NewMeasurement {
    pub measured_at: PrimitiveDateTime,
    pub glucose_level: f64,
    pub context: MeasurementContext,
    pub notes: Option<String>,
}

pub fn validate_measurement(form: &MeasurementForm) -> Result<NewMeasurement, Vec<String>> {
    let mut errors = Vec::new();

    let measured_at = parse_datetime(&form.date, &form.time);
    if measured_at.is_none() {
        errors.push("Data ou hora da medição inválida.".into());
    }

    let glucose_level = match parse_positive_float(&form.glucose_level) {
        Ok(Some(v)) => Some(v),
        Ok(None) => {
            errors.push("Informe a glicemia.".into());
            None
        }
        Err(()) => {
            errors.push("Glicemia deve ser um número maior que zero.".into());
            None
        }
    };

    let context = MeasurementContext::from_slug(form.measurement_context.trim());
    if context.is_none() {
        errors.push("Contexto de medição inválido.".into());
    }

    match (measured_at, glucose_level, context) {
        (Some(measured_at), Some(glucose_level), Some(context)) if errors.is_empty() => {
            Ok(NewMeasurement {
                measured_at,
                glucose_level,
                context,
                notes: match form.notes.trim() {
                    "" => None,
                    n => Some(n.to_string()),
                },
            })
        }
        _ => Err(errors),
    }
}

// ---- activities ----

#[derive(Debug, Deserialize)]
pub struct ActivityForm {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub duration_minutes: String,
}

#[derive(Debug)]
pub struct NewActivity {
    pub category: ActivityCategory,
    pub performed_at: PrimitiveDateTime,
    pub duration_minutes: i64,
}

pub fn validate_activity(form: &ActivityForm) -> Result<NewActivity, Vec<String>> {
    let mut errors = Vec::new();

    let category = ActivityCategory::from_slug(form.category.trim());
    if category.is_none() {
        errors.push("Categoria de atividade inválida.".into());
    }

    let performed_at = parse_datetime(&form.date, &form.time);
    if performed_at.is_none() {
        errors.push("Data ou hora da atividade inválida.".into());
    }

    let duration_minutes = match form.duration_minutes.trim().parse::<i64>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            errors.push("Duração deve ser um número inteiro de minutos maior que zero.".into());
            None
        }
    };

    match (category, performed_at, duration_minutes) {
        (Some(category), Some(performed_at), Some(duration_minutes)) if errors.is_empty() => {
            Ok(NewActivity {
                category,
                performed_at,
                duration_minutes,
            })
        }
        _ => Err(errors),
    }
}

// ---- alerts ----

#[derive(Debug, Deserialize)]
pub struct AlertForm {
    #[serde(default)]
    pub alert_type: String,
    #[serde(default)]
    pub alert_time: String,
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub alert_date: String,
}

#[derive(Debug)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub alert_time: Time,
    pub schedule: AlertSchedule,
}

/// Exactly one of {non-empty weekday set, calendar date} must be present.
pub fn validate_alert_schedule(days: &[String], date: &str) -> Result<AlertSchedule, Vec<String>> {
    let mut errors = Vec::new();

    let mut weekdays: BTreeSet<Weekday> = BTreeSet::new();
    for slug in days {
        match Weekday::from_slug(slug.trim()) {
            Some(d) => {
                weekdays.insert(d);
            }
            None => errors.push(format!("Dia da semana inválido: {}.", slug.trim())),
        }
    }

    let date = date.trim();
    let parsed_date = if date.is_empty() {
        None
    } else {
        match parse_date(date) {
            Some(d) => Some(d),
            None => {
                errors.push("Data do alerta inválida.".into());
                None
            }
        }
    };

    let has_days = !days.is_empty();
    let has_date = !date.is_empty();
    match (has_days, has_date) {
        (true, true) => {
            errors.push("Escolha dias da semana ou uma data específica, não ambos.".into())
        }
        (false, false) => {
            errors.push("Escolha pelo menos um dia da semana ou uma data específica.".into())
        }
        _ => {}
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    if let Some(d) = parsed_date {
        Ok(AlertSchedule::Once(d))
    } else {
        Ok(AlertSchedule::Weekly(weekdays))
    }
}

pub fn validate_alert(form: &AlertForm) -> Result<NewAlert, Vec<String>> {
    let mut errors = Vec::new();

    let alert_type = AlertType::from_slug(form.alert_type.trim());
    if alert_type.is_none() {
        errors.push("Tipo de alerta inválido.".into());
    }

    let alert_time = parse_time_hm(&form.alert_time);
    if alert_time.is_none() {
        errors.push("Horário do alerta inválido.".into());
    }

    let schedule = match validate_alert_schedule(&form.days, &form.alert_date) {
        Ok(s) => Some(s),
        Err(e) => {
            errors.extend(e);
            None
        }
    };

    match (alert_type, alert_time, schedule) {
        (Some(alert_type), Some(alert_time), Some(schedule)) if errors.is_empty() => Ok(NewAlert {
            alert_type,
            alert_time,
            schedule,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    #[test]
    fn phone_keeps_only_digits() {
        assert_eq!(normalize_phone("(11) 98765-4321"), "11987654321");
        assert_eq!(normalize_phone("+55 11 8765-4321"), "551187654321");
        assert_eq!(normalize_phone("abc"), "");
    }

    #[test]
    fn phone_validity_depends_only_on_length() {
        assert!(phone_is_valid(&normalize_phone("(11) 8765-4321"))); // 10
        assert!(phone_is_valid(&normalize_phone("(11) 98765-4321"))); // 11
        assert!(!phone_is_valid(&normalize_phone("8765-4321"))); // 8
        assert!(!phone_is_valid(&normalize_phone("+55 11 98765-4321"))); // 13
    }

    #[test]
    fn positive_float_rules() {
        assert_eq!(parse_positive_float(""), Ok(None));
        assert_eq!(parse_positive_float("   "), Ok(None));
        assert_eq!(parse_positive_float("95.5"), Ok(Some(95.5)));
        assert_eq!(parse_positive_float("95,5"), Ok(Some(95.5)));
        assert_eq!(parse_positive_float("abc"), Err(()));
        assert_eq!(parse_positive_float("0"), Err(()));
        assert_eq!(parse_positive_float("-3"), Err(()));
    }

    #[test]
    fn datetime_parsing() {
        assert_eq!(
            parse_datetime("2024-01-15", "08:00"),
            Some(datetime!(2024-01-15 08:00))
        );
        assert!(parse_datetime("15/01/2024", "08:00").is_none());
        assert!(parse_datetime("2024-01-15", "8h").is_none());
        assert!(parse_datetime("2024-02-30", "08:00").is_none());
    }

    #[test]
    fn alert_schedule_requires_exactly_one_of_days_or_date() {
        // neither
        assert!(validate_alert_schedule(&[], "").is_err());
        // both
        assert!(validate_alert_schedule(&["mon".into()], "2024-02-15").is_err());
        // days only
        let weekly = validate_alert_schedule(&["mon".into(), "wed".into()], "")
            .expect("weekly schedule valid");
        assert_eq!(weekly.weekday_slugs(), vec!["mon", "wed"]);
        // date only
        let once = validate_alert_schedule(&[], "2024-02-15").expect("dated schedule valid");
        assert_eq!(once.date(), Some(date!(2024 - 02 - 15)));
    }

    #[test]
    fn alert_schedule_rejects_unknown_weekday() {
        let err = validate_alert_schedule(&["mon".into(), "someday".into()], "")
            .expect_err("unknown weekday must fail");
        assert!(err.iter().any(|m| m.contains("someday")));
    }

    #[test]
    fn register_collects_every_error_in_one_pass() {
        let form = RegisterForm {
            name: "".into(),
            email: "not-an-email".into(),
            username: "".into(),
            password: "123".into(),
            phone: "123".into(),
            height: "-1".into(),
            weight: "abc".into(),
            diabetes_type: "tipo_9".into(),
            emergency_contact_name: "".into(),
            emergency_contact_phone: "".into(),
            emergency_contact_relation: "primo".into(),
        };
        let errors = validate_register(&form).expect_err("invalid form");
        assert!(errors.len() >= 8, "expected all violations, got {errors:?}");
    }

    #[test]
    fn register_normalizes_fields() {
        let form = RegisterForm {
            name: "  João Silva ".into(),
            email: " Joao@Email.com ".into(),
            username: " Joao ".into(),
            password: "secret1".into(),
            phone: "(11) 98765-4321".into(),
            height: "1,75".into(),
            weight: "80".into(),
            diabetes_type: "tipo_2".into(),
            emergency_contact_name: "Maria Silva".into(),
            emergency_contact_phone: "(11) 98765-4322".into(),
            emergency_contact_relation: "mae".into(),
        };
        let user = validate_register(&form).expect("valid form");
        assert_eq!(user.profile.name, "João Silva");
        assert_eq!(user.profile.email, "joao@email.com");
        assert_eq!(user.profile.username, "joao");
        assert_eq!(user.profile.phone.as_deref(), Some("11987654321"));
        assert_eq!(user.profile.height, Some(1.75));
        assert_eq!(user.profile.diabetes_type, Some(DiabetesType::Tipo2));
        assert_eq!(
            user.profile.emergency_contact_relation,
            Some(EmergencyRelation::Mae)
        );
    }

    #[test]
    fn account_password_change_needs_current_password() {
        let form = AccountForm {
            name: "Ana".into(),
            email: "ana@email.com".into(),
            username: "ana".into(),
            phone: "".into(),
            height: "".into(),
            weight: "".into(),
            diabetes_type: "".into(),
            emergency_contact_name: "".into(),
            emergency_contact_phone: "".into(),
            emergency_contact_relation: "".into(),
            current_password: "".into(),
            new_password: "novasenha".into(),
            confirm_password: "novasenha".into(),
        };
        let errors = validate_account(&form).expect_err("missing current password");
        assert!(errors.iter().any(|m| m.contains("senha atual")));
    }

    #[test]
    fn account_without_password_change_skips_password_rules() {
        let form = AccountForm {
            name: "Ana".into(),
            email: "ana@email.com".into(),
            username: "ana".into(),
            phone: "".into(),
            height: "".into(),
            weight: "".into(),
            diabetes_type: "".into(),
            emergency_contact_name: "".into(),
            emergency_contact_phone: "".into(),
            emergency_contact_relation: "".into(),
            current_password: "".into(),
            new_password: "".into(),
            confirm_password: "".into(),
        };
        let update = validate_account(&form).expect("valid form");
        assert!(update.new_password.is_none());
    }

    #[test]
    fn measurement_validation() {
        let form = MeasurementForm {
            date: "2024-01-15".into(),
            time: "08:00".into(),
            glucose_level: "95".into(),
            measurement_context: "em_jejum".into(),
            notes: "  Medição matinal  ".into(),
        };
        let m = validate_measurement(&form).expect("valid measurement");
        assert_eq!(m.measured_at, datetime!(2024-01-15 08:00));
        assert_eq!(m.glucose_level, 95.0);
        assert_eq!(m.context, MeasurementContext::EmJejum);
        assert_eq!(m.notes.as_deref(), Some("Medição matinal"));

        let bad = MeasurementForm {
            date: "2024-01-15".into(),
            time: "".into(),
            glucose_level: "-10".into(),
            measurement_context: "depois_do_cafe".into(),
            notes: "".into(),
        };
        let errors = validate_measurement(&bad).expect_err("invalid measurement");
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn activity_validation() {
        let form = ActivityForm {
            category: "caminhada".into(),
            date: "2024-01-15".into(),
            time: "07:00".into(),
            duration_minutes: "30".into(),
        };
        let a = validate_activity(&form).expect("valid activity");
        assert_eq!(a.category, ActivityCategory::Caminhada);
        assert_eq!(a.duration_minutes, 30);

        let bad = ActivityForm {
            category: "corrida".into(),
            date: "2024-01-15".into(),
            time: "07:00".into(),
            duration_minutes: "0".into(),
        };
        assert_eq!(validate_activity(&bad).expect_err("invalid").len(), 2);
    }

    #[test]
    fn alert_validation_builds_schedule() {
        let form = AlertForm {
            alert_type: "medicacao".into(),
            alert_time: "08:00".into(),
            days: vec!["mon".into(), "fri".into()],
            alert_date: "".into(),
        };
        let alert = validate_alert(&form).expect("valid alert");
        assert_eq!(alert.alert_type, AlertType::Medicacao);
        assert_eq!(alert.alert_time, time!(08:00));
        assert_eq!(alert.schedule.weekday_slugs(), vec!["mon", "fri"]);
    }

    #[test]
    fn password_reset_rules() {
        assert!(validate_password_reset("novasenha", "novasenha").is_ok());
        assert_eq!(
            validate_password_reset("123", "456").expect_err("short and mismatched").len(),
            2
        );
    }
}
