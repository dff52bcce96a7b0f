use chrono::{Datelike, NaiveDate};

use crate::errors::FormatError;

const ISO_FORMAT: &str = "%Y-%m-%d";
const DAY_FIRST_FORMAT: &str = "%d.%m.%Y";

/// Parses `YYYY-MM-DD` or `DD.MM.YYYY` into a calendar date.
///
/// Empty (or whitespace-only) input is `Ok(None)`: the date is simply absent.
/// A `-` selects the ISO form and a `.` the day-first form; anything else,
/// or a date that does not exist on the calendar, is a `FormatError`.
pub fn parse_date(text: &str) -> Result<Option<NaiveDate>, FormatError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let (format, expected_lens) = if text.contains('-') {
        (ISO_FORMAT, [4, 2, 2])
    } else if text.contains('.') {
        (DAY_FIRST_FORMAT, [2, 2, 4])
    } else {
        return Err(FormatError::UnknownFormat(text.to_string()));
    };

    let separator = if format == ISO_FORMAT { '-' } else { '.' };
    if !has_digit_groups(text, separator, expected_lens) {
        return Err(FormatError::UnknownFormat(text.to_string()));
    }

    NaiveDate::parse_from_str(text, format)
        .map(Some)
        .map_err(|_| FormatError::InvalidDate(text.to_string()))
}

/// Checks the shape `digits{a} sep digits{b} sep digits{c}` so that chrono's
/// lenient parsing never accepts signs, spaces or short years.
fn has_digit_groups(text: &str, separator: char, lens: [usize; 3]) -> bool {
    let groups: Vec<&str> = text.split(separator).collect();
    groups.len() == 3
        && groups
            .iter()
            .zip(lens)
            .all(|(g, len)| g.len() == len && g.bytes().all(|b| b.is_ascii_digit()))
}

/// Re-anchors `original`'s month and day into `target_year`.
///
/// February 29 falls back to February 28 when `target_year` is not a leap
/// year. No other month/day can fail to exist in another year.
pub fn anniversary_in(original: NaiveDate, target_year: i32) -> NaiveDate {
    original
        .with_year(target_year)
        .or_else(|| NaiveDate::from_ymd_opt(target_year, 2, 28))
        .unwrap_or(original)
}

/// `15.09.1950`, or `—` when absent.
pub fn format_full(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format(DAY_FIRST_FORMAT).to_string(),
        None => "—".to_string(),
    }
}

/// `15.09`
pub fn format_day_month(date: NaiveDate) -> String {
    date.format("%d.%m").to_string()
}
