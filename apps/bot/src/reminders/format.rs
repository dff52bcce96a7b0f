use crate::dates::{format_day_month, Occurrence};
use crate::models::record::{Record, MAX_NAME_CHARS};
use crate::reminders::ReminderSettings;
use crate::telegram::escape_html;

/// Russian plural of "day" for `n`: 1 день, 2 дня, 5 дней, 21 день.
pub fn days_word(n: u32) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=14) => "дней",
        (1, _) => "день",
        (2..=4, _) => "дня",
        _ => "дней",
    }
}

/// One reminder line for one occurrence.
pub fn format_line(record: &Record, occurrence: &Occurrence, settings: &ReminderSettings) -> String {
    let when = match settings.lead_days {
        0 => "сегодня".to_string(),
        n => format!("через {n} {}", days_word(n)),
    };
    format!(
        "Напоминание: {when} — {} <b>{}</b> (дата: {}){}.",
        occurrence.kind.label(),
        escape_html(&display_name(&record.full_name)),
        format_day_month(occurrence.date),
        anniversary_suffix(occurrence.elapsed_years, settings.show_zero_anniversary),
    )
}

/// Names stored before the length cap existed are cut so the line, and its
/// `<b>` markup, always fits in one message.
fn display_name(name: &str) -> String {
    if name.chars().count() <= MAX_NAME_CHARS {
        name.to_string()
    } else {
        let mut cut: String = name.chars().take(MAX_NAME_CHARS).collect();
        cut.push('…');
        cut
    }
}

fn anniversary_suffix(elapsed_years: i32, show_zero: bool) -> String {
    if elapsed_years > 0 || (elapsed_years == 0 && show_zero) {
        format!(" — {elapsed_years}-я годовщина")
    } else {
        String::new()
    }
}
