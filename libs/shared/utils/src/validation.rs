use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use shared_models::error::{AppError, ValidationErrors};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .unwrap_or_else(|_| unreachable!("email pattern is a valid regex"))
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Parses a wall-clock time in `HH:MM` form.
pub fn parse_hh_mm(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Accepts both `HH:MM` and the `HH:MM:SS` form Postgres returns for `time` columns.
pub fn parse_stored_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Query-string booleans: `true/false`, `1/0`, `yes/no`, `on/off`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Trimmed, non-empty view of an optional string field.
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Collects per-field messages while a request is checked.
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.has(field)
    }

    /// Records `message` when the value is missing or blank; returns the trimmed value otherwise.
    pub fn required<'a>(&mut self, field: &str, value: Option<&'a str>, message: &str) -> Option<&'a str> {
        let value = present(value);
        if value.is_none() {
            self.add(field, message);
        }
        value
    }

    pub fn max_length(&mut self, field: &str, value: Option<&str>, max: usize, message: &str) {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.add(field, message);
        }
    }

    pub fn min_length(&mut self, field: &str, value: Option<&str>, min: usize, message: &str) {
        if value.is_some_and(|v| v.chars().count() < min) {
            self.add(field, message);
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>, message: &str) {
        if present(value).is_some_and(|v| !is_valid_email(v)) {
            self.add(field, message);
        }
    }

    pub fn date(&mut self, field: &str, value: Option<&str>, message: &str) -> Option<NaiveDate> {
        let value = present(value)?;
        let parsed = parse_date(value);
        if parsed.is_none() {
            self.add(field, message);
        }
        parsed
    }

    pub fn time(&mut self, field: &str, value: Option<&str>, message: &str) -> Option<NaiveTime> {
        let value = present(value)?;
        let parsed = parse_hh_mm(value);
        if parsed.is_none() {
            self.add(field, message);
        }
        parsed
    }

    /// Parses an optional numeric query/form value; blank means absent.
    pub fn number<T: FromStr>(&mut self, field: &str, value: Option<&str>, message: &str) -> Option<T> {
        let value = present(value)?;
        let parsed = value.parse().ok();
        if parsed.is_none() {
            self.add(field, message);
        }
        parsed
    }

    pub fn boolean(&mut self, field: &str, value: Option<&str>, message: &str) -> Option<bool> {
        let value = present(value)?;
        let parsed = parse_bool(value);
        if parsed.is_none() {
            self.add(field, message);
        }
        parsed
    }

    pub fn range<T: PartialOrd + Copy>(
        &mut self,
        field: &str,
        value: Option<T>,
        min: T,
        max: Option<T>,
        message: &str,
    ) {
        if let Some(v) = value {
            if v < min || max.is_some_and(|max| v > max) {
                self.add(field, message);
            }
        }
    }

    pub fn finish(self) -> Result<(), AppError> {
        self.errors.into_result()
    }

    pub fn into_errors(self) -> ValidationErrors {
        self.errors
    }
}
