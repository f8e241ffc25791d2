//! Validation and normalization gate.
//!
//! Pure, deterministic functions that turn raw candidate slot values into
//! normalized values or typed rejections. No I/O, no clock reads: relative
//! dates resolve against a reference date passed in by the caller.
//!
//! Rejection never panics; every failure is a [`ValidationError`] the
//! dialogue machine converts into a clarification prompt. Ambiguous inputs
//! with a single best reading come back as a normalized candidate flagged
//! `needs_confirmation` instead of an error.

mod date;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Rejection of a raw candidate value.
///
/// Local to a single slot and always recoverable: the machine re-prompts,
/// it never surfaces these as system errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'{field}' is out of range: {reason}")]
    OutOfRange { field: String, reason: String },

    #[error("'{field}' has the wrong format: {reason}")]
    WrongFormat { field: String, reason: String },

    #[error("'{field}' is ambiguous: {reason}")]
    Ambiguous { field: String, reason: String },
}

impl ValidationError {
    /// Creates an out-of-range error.
    pub fn out_of_range(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a wrong-format error.
    pub fn wrong_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::WrongFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an ambiguity error for input with no single best reading.
    pub fn ambiguous(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::Ambiguous {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// The type of a slot, carrying its validation rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotType {
    /// Calendar date. Accepts ISO, US numeric, month-name, and relative
    /// forms; weekday names normalize to the next occurrence and require
    /// confirmation.
    Date,
    /// Time of day, normalized to 24h `HH:MM`.
    TimeOfDay,
    /// US phone number, normalized to `+1XXXXXXXXXX`.
    Phone,
    /// Membership of a closed set of canonical lowercase options.
    Choice { options: Vec<String> },
    /// Integer within an inclusive range.
    Integer { min: i64, max: i64 },
    /// Trimmed free text within an inclusive character-length range.
    Text { min_len: usize, max_len: usize },
}

/// A value that passed the gate, in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum NormalizedValue {
    Date(NaiveDate),
    TimeOfDay(NaiveTime),
    Phone(String),
    Keyword(String),
    Integer(i64),
    Text(String),
}

impl NormalizedValue {
    /// Converts the value to its JSON payload representation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            NormalizedValue::Integer(n) => serde_json::Value::from(*n),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for NormalizedValue {
    /// Canonical string form. Re-validating this string returns the same
    /// value unchanged, which is what makes the gate idempotent.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            NormalizedValue::TimeOfDay(t) => write!(f, "{}", t.format("%H:%M")),
            NormalizedValue::Phone(s)
            | NormalizedValue::Keyword(s)
            | NormalizedValue::Text(s) => write!(f, "{}", s),
            NormalizedValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    /// The normalized value.
    pub value: NormalizedValue,
    /// True when the normalization resolved an ambiguity (e.g. a weekday
    /// name) and the user must confirm it before the slot becomes valid.
    pub needs_confirmation: bool,
}

impl Validated {
    pub(crate) fn accepted(value: NormalizedValue) -> Self {
        Self {
            value,
            needs_confirmation: false,
        }
    }

    pub(crate) fn tentative(value: NormalizedValue) -> Self {
        Self {
            value,
            needs_confirmation: true,
        }
    }
}

/// Validates and normalizes a raw candidate for a slot.
///
/// `reference` anchors relative date forms ("tomorrow", weekday names) so
/// the function stays deterministic under test.
pub fn validate(
    slot_type: &SlotType,
    field: &str,
    raw: &str,
    reference: NaiveDate,
) -> Result<Validated, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::wrong_format(field, "no value given"));
    }

    match slot_type {
        SlotType::Date => date::parse(field, trimmed, reference),
        SlotType::TimeOfDay => parse_time(field, trimmed),
        SlotType::Phone => parse_phone(field, trimmed),
        SlotType::Choice { options } => parse_choice(field, trimmed, options),
        SlotType::Integer { min, max } => parse_integer(field, trimmed, *min, *max),
        SlotType::Text { min_len, max_len } => parse_text(field, trimmed, *min_len, *max_len),
    }
}

fn parse_time(field: &str, raw: &str) -> Result<Validated, ValidationError> {
    let lowered = raw.to_lowercase();
    let compact: String = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    if compact == "noon" {
        return Ok(Validated::accepted(NormalizedValue::TimeOfDay(
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        )));
    }
    if compact == "midnight" {
        return Ok(Validated::accepted(NormalizedValue::TimeOfDay(
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        )));
    }

    // Canonical 24h form passes through unchanged.
    if let Ok(t) = NaiveTime::parse_from_str(&compact, "%H:%M") {
        return Ok(Validated::accepted(NormalizedValue::TimeOfDay(t)));
    }

    // 12h forms: "3pm", "3 pm", "3:30 pm".
    let (body, pm) = if let Some(stripped) = compact.strip_suffix("pm") {
        (stripped.trim().to_string(), Some(true))
    } else if let Some(stripped) = compact.strip_suffix("am") {
        (stripped.trim().to_string(), Some(false))
    } else {
        (compact.clone(), None)
    };

    let (hour_part, minute_part) = match body.split_once(':') {
        Some((h, m)) => (h.trim(), m.trim()),
        None => (body.trim(), "0"),
    };

    let hour: u32 = hour_part
        .parse()
        .map_err(|_| ValidationError::wrong_format(field, format!("'{}' is not a time", raw)))?;
    let minute: u32 = minute_part
        .parse()
        .map_err(|_| ValidationError::wrong_format(field, format!("'{}' is not a time", raw)))?;

    match pm {
        Some(is_pm) => {
            if hour == 0 || hour > 12 || minute > 59 {
                return Err(ValidationError::out_of_range(
                    field,
                    format!("'{}' is not a valid 12-hour time", raw),
                ));
            }
            let hour24 = match (hour, is_pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, false) => h,
                (h, true) => h + 12,
            };
            Ok(Validated::accepted(NormalizedValue::TimeOfDay(
                NaiveTime::from_hms_opt(hour24, minute, 0).unwrap(),
            )))
        }
        None if body.contains(':') => {
            // A colon form that failed the 24h parse is simply invalid.
            Err(ValidationError::out_of_range(
                field,
                format!("'{}' is not a valid time of day", raw),
            ))
        }
        // A bare hour could be morning or afternoon.
        None => Err(ValidationError::ambiguous(
            field,
            format!("'{}' could be AM or PM", raw),
        )),
    }
}

fn parse_phone(field: &str, raw: &str) -> Result<Validated, ValidationError> {
    if raw.chars().any(|c| c.is_alphabetic()) {
        return Err(ValidationError::wrong_format(
            field,
            format!("'{}' is not a phone number", raw),
        ));
    }

    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let canonical = match digits.len() {
        10 => format!("+1{}", digits),
        11 if digits.starts_with('1') => format!("+{}", digits),
        _ => {
            return Err(ValidationError::wrong_format(
                field,
                format!("expected a 10-digit US number, got {} digits", digits.len()),
            ))
        }
    };
    Ok(Validated::accepted(NormalizedValue::Phone(canonical)))
}

fn parse_choice(field: &str, raw: &str, options: &[String]) -> Result<Validated, ValidationError> {
    let lowered = raw.to_lowercase();
    if let Some(option) = options.iter().find(|o| o.as_str() == lowered) {
        return Ok(Validated::accepted(NormalizedValue::Keyword(option.clone())));
    }
    Err(ValidationError::wrong_format(
        field,
        format!("'{}' is not one of: {}", raw, options.join(", ")),
    ))
}

fn parse_integer(field: &str, raw: &str, min: i64, max: i64) -> Result<Validated, ValidationError> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let n: i64 = cleaned
        .trim()
        .parse()
        .map_err(|_| ValidationError::wrong_format(field, format!("'{}' is not a number", raw)))?;
    if n < min || n > max {
        return Err(ValidationError::out_of_range(
            field,
            format!("{} is outside {}..={}", n, min, max),
        ));
    }
    Ok(Validated::accepted(NormalizedValue::Integer(n)))
}

fn parse_text(
    field: &str,
    raw: &str,
    min_len: usize,
    max_len: usize,
) -> Result<Validated, ValidationError> {
    let count = raw.chars().count();
    if count < min_len {
        return Err(ValidationError::out_of_range(
            field,
            format!("needs at least {} characters", min_len),
        ));
    }
    if count > max_len {
        return Err(ValidationError::out_of_range(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }
    Ok(Validated::accepted(NormalizedValue::Text(raw.to_string())))
}
