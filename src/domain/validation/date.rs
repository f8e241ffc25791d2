//! Date coercion for the validation gate.
//!
//! Accepted forms, in the order tried:
//! - ISO `YYYY-MM-DD` (the canonical form, passes through unchanged)
//! - US numeric `MM/DD/YYYY`
//! - month name, with or without a year ("March 5, 2026", "March 5")
//! - relative words ("today", "tomorrow")
//! - weekday names ("friday", "next friday") — resolve to the next
//!   occurrence after the reference date and require confirmation, since
//!   a bare weekday can mean this week or next.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use super::{NormalizedValue, Validated, ValidationError};

pub(super) fn parse(
    field: &str,
    raw: &str,
    reference: NaiveDate,
) -> Result<Validated, ValidationError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Validated::accepted(NormalizedValue::Date(date)));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Ok(Validated::accepted(NormalizedValue::Date(date)));
    }

    let lowered = raw.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let phrase = words.join(" ");

    match phrase.as_str() {
        "today" => {
            return Ok(Validated::accepted(NormalizedValue::Date(reference)));
        }
        "tomorrow" => {
            let date = reference
                .checked_add_days(Days::new(1))
                .ok_or_else(|| ValidationError::out_of_range(field, "date overflow"))?;
            return Ok(Validated::accepted(NormalizedValue::Date(date)));
        }
        _ => {}
    }

    if let Some(weekday) = parse_weekday(&phrase) {
        let date = next_occurrence(reference, weekday);
        return Ok(Validated::tentative(NormalizedValue::Date(date)));
    }

    if let Some(result) = parse_month_name(field, &phrase, reference) {
        return result;
    }

    // Bare numeric pairs ("5/6") have no single reading: month/day or
    // day/month, and no year.
    if phrase
        .chars()
        .all(|c| c.is_ascii_digit() || c == '/' || c == '-')
        && phrase.contains(['/', '-'])
    {
        return Err(ValidationError::ambiguous(
            field,
            format!("'{}' needs a year and an unambiguous month/day order", raw),
        ));
    }

    Err(ValidationError::wrong_format(
        field,
        format!("could not read '{}' as a date", raw),
    ))
}

fn parse_weekday(phrase: &str) -> Option<Weekday> {
    let name = phrase.strip_prefix("next ").unwrap_or(phrase);
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// The next date strictly after `reference` falling on `weekday`.
fn next_occurrence(reference: NaiveDate, weekday: Weekday) -> NaiveDate {
    let today = reference.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut ahead = (target - today).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    reference + Days::new(ahead as u64)
}

fn parse_month_name(
    field: &str,
    phrase: &str,
    reference: NaiveDate,
) -> Option<Result<Validated, ValidationError>> {
    let cleaned = phrase.replace(',', " ");
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.len() < 2 || words.len() > 3 {
        return None;
    }

    let month = month_number(words[0])?;
    let day: u32 = words[1].parse().ok()?;
    let year: i32 = match words.get(2) {
        Some(y) => y.parse().ok()?,
        None => reference.year(),
    };

    Some(
        NaiveDate::from_ymd_opt(year, month, day)
            .map(|date| Validated::accepted(NormalizedValue::Date(date)))
            .ok_or_else(|| {
                ValidationError::out_of_range(
                    field,
                    format!("'{}' is not a calendar date", phrase),
                )
            }),
    )
}

fn month_number(word: &str) -> Option<u32> {
    let month = match word {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}
