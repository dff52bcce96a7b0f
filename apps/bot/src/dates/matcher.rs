use chrono::{Datelike, Days, NaiveDate};

use crate::dates::normalizer::anniversary_in;
use crate::models::record::{Record, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Birth,
    Death,
}

impl EventKind {
    /// Russian label used in reminder lines.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Birth => "дата рождения",
            EventKind::Death => "дата смерти",
        }
    }
}

/// One anniversary of one record, derived per scan and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub record_id: RecordId,
    pub kind: EventKind,
    /// The anniversary re-anchored into the lookahead day's year.
    pub date: NaiveDate,
    /// `date.year - original.year`; zero for same-year events, negative for
    /// dates entered in the future.
    pub elapsed_years: i32,
}

/// The single day an anniversary must fall on to be reported today.
/// `None` only if the addition overflows chrono's calendar range.
pub fn lookahead_day(today: NaiveDate, lead_days: u32) -> Option<NaiveDate> {
    today.checked_add_days(Days::new(u64::from(lead_days)))
}

/// True iff `original`'s anniversary falls exactly on `today + lead_days`.
///
/// This is an exact-day match, so a given anniversary is reported on one
/// trigger day per year and never on two.
pub fn is_upcoming(original: Option<NaiveDate>, today: NaiveDate, lead_days: u32) -> bool {
    let (Some(original), Some(target)) = (original, lookahead_day(today, lead_days)) else {
        return false;
    };
    let anniv = anniversary_in(original, target.year());
    anniv.month() == target.month() && anniv.day() == target.day()
}

/// Builds the occurrence for one of a record's dates, if it is upcoming.
pub fn occurrence_for(
    record: &Record,
    kind: EventKind,
    today: NaiveDate,
    lead_days: u32,
) -> Option<Occurrence> {
    let original = match kind {
        EventKind::Birth => record.birth,
        EventKind::Death => record.death,
    };
    if !is_upcoming(original, today, lead_days) {
        return None;
    }
    let original = original?;
    let target = lookahead_day(today, lead_days)?;
    let date = anniversary_in(original, target.year());
    Some(Occurrence {
        record_id: record.id,
        kind,
        date,
        elapsed_years: date.year() - original.year(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(birth: Option<NaiveDate>, death: Option<NaiveDate>) -> Record {
        Record {
            id: 1,
            owner: 42,
            full_name: "A".to_string(),
            birth,
            death,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_exact_lookahead_day_matches() {
        let today = ymd(2024, 1, 1);
        assert!(is_upcoming(Some(ymd(1990, 1, 4)), today, 3));
        assert!(is_upcoming(Some(ymd(2031, 1, 4)), today, 3));
        assert!(!is_upcoming(Some(ymd(1990, 1, 5)), today, 3));
        assert!(!is_upcoming(Some(ymd(1990, 1, 3)), today, 3));
    }

    #[test]
    fn test_absent_date_never_matches() {
        assert!(!is_upcoming(None, ymd(2024, 1, 1), 3));
    }

    #[test]
    fn test_lookahead_crosses_year_boundary() {
        let today = ymd(2023, 12, 30);
        assert!(is_upcoming(Some(ymd(1990, 1, 2)), today, 3));
        let occ = occurrence_for(&record(Some(ymd(1990, 1, 2)), None), EventKind::Birth, today, 3)
            .unwrap();
        assert_eq!(occ.date, ymd(2024, 1, 2));
        assert_eq!(occ.elapsed_years, 34);
    }

    #[test]
    fn test_zero_lead_matches_today() {
        assert!(is_upcoming(Some(ymd(1970, 5, 9)), ymd(2025, 5, 9), 0));
    }

    #[test]
    fn test_leap_day_matches_feb_28_in_common_year() {
        let leap = Some(ymd(2000, 2, 29));
        assert!(is_upcoming(leap, ymd(2021, 2, 25), 3));
        assert!(!is_upcoming(leap, ymd(2021, 2, 26), 3));
    }

    #[test]
    fn test_leap_day_matches_only_feb_29_in_leap_year() {
        let leap = Some(ymd(2000, 2, 29));
        assert!(is_upcoming(leap, ymd(2024, 2, 26), 3));
        assert!(!is_upcoming(leap, ymd(2024, 2, 25), 3));
        assert!(is_upcoming(Some(ymd(2000, 2, 28)), ymd(2024, 2, 25), 3));
    }

    #[test]
    fn test_occurrence_for_each_kind() {
        let today = ymd(2024, 1, 1);
        let r = record(Some(ymd(1950, 1, 4)), Some(ymd(2010, 1, 4)));
        let birth = occurrence_for(&r, EventKind::Birth, today, 3).unwrap();
        let death = occurrence_for(&r, EventKind::Death, today, 3).unwrap();
        assert_eq!(birth.elapsed_years, 74);
        assert_eq!(death.elapsed_years, 14);
        assert_eq!(death.kind, EventKind::Death);
        assert!(occurrence_for(&r, EventKind::Birth, today, 4).is_none());
    }

    #[test]
    fn test_same_year_event_has_zero_elapsed() {
        let occ = occurrence_for(&record(Some(ymd(2024, 1, 4)), None), EventKind::Birth, ymd(2024, 1, 1), 3)
            .unwrap();
        assert_eq!(occ.elapsed_years, 0);
    }
}
