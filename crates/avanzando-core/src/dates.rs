//! Date parsing helpers shared by request validation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::{CoreError, CoreResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const INVALID_DATE: &str = "Formato de fecha inválido. Use YYYY-MM-DD";

/// Parses a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(input: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| CoreError::validation(INVALID_DATE))
}

/// Parses an optional date; empty strings count as absent.
pub fn parse_optional_date(input: Option<&str>) -> CoreResult<Option<NaiveDate>> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value).map(Some),
    }
}

/// Parses either a bare date (midnight) or an ISO-8601 date-time.
///
/// Offsets are normalised to UTC before the offset is dropped.
pub fn parse_date_time(input: &str) -> CoreResult<NaiveDateTime> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, DATE_FORMAT) {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(input) {
        return Ok(with_offset.with_timezone(&Utc).naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .ok_or_else(|| {
            CoreError::validation("Formato de fecha inválido. Use YYYY-MM-DD o ISO-8601")
        })
}

pub fn parse_optional_date_time(input: Option<&str>) -> CoreResult<Option<NaiveDateTime>> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date_time(value).map(Some),
    }
}

#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
