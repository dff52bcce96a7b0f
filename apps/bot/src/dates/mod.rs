//! Calendar logic behind reminders: parsing user-entered dates, re-anchoring
//! anniversaries into a target year and matching them against the lookahead day.

pub mod matcher;
pub mod normalizer;

pub use matcher::{lookahead_day, occurrence_for, EventKind, Occurrence};
pub use normalizer::{format_day_month, format_full, parse_date};
