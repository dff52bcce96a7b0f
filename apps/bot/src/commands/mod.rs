//! Chat command surface: `/add`, `/list`, `/remove`, `/help`, `/start`.

pub mod handlers;
pub mod poller;

use thiserror::Error;

use crate::errors::{FormatError, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// Everything after `/add`, unparsed.
    Add(String),
    List,
    /// Everything after `/remove`, unparsed.
    Remove(String),
}

/// Malformed command input; the message is shown to the user verbatim.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Укажите: ФИО; дата рождения; дата смерти")]
    MissingPayload,

    #[error("Нужно не больше трёх полей: ФИО; дата рождения; дата смерти")]
    TooManyFields,

    #[error("ФИО не должно быть пустым")]
    EmptyName,

    #[error("ФИО слишком длинное (не больше {max} символов)")]
    NameTooLong { max: usize },

    #[error("Даты должны быть в формате YYYY-MM-DD или DD.MM.YYYY")]
    BadDate(#[from] FormatError),

    #[error("Укажите ID: /remove 12")]
    BadId,

    #[error("Хранилище недоступно, попробуйте позже")]
    Store(#[from] StoreError),
}

/// Recognizes a bot command, accepting the `/cmd@botname` form.
/// Returns `None` for plain text and unknown commands.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.find(char::is_whitespace) {
        Some(i) => (&rest[..i], rest[i..].trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);

    match name {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        "add" => Some(Command::Add(args.to_string())),
        "list" => Some(Command::List),
        "remove" => Some(Command::Remove(args.to_string())),
        _ => None,
    }
}
