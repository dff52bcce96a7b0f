use crate::commands::{Command, CommandError};
use crate::dates::{format_full, parse_date};
use crate::models::record::{NewRecord, OwnerKey, RecordId, MAX_NAME_CHARS};
use crate::reminders::format::days_word;
use crate::store::RecordStore;
use crate::telegram::escape_html;

const ADD_EXAMPLE: &str = "<code>/add Иванов Иван Иванович; 1950-09-15; 2010-06-02</code>";

pub fn help_text(lead_days: u32) -> String {
    format!(
        "Я буду напоминать за <b>{lead_days}</b> {} до дат рождения и смерти.\n\n\
         Команды:\n\
         <b>/add</b> ФИО; YYYY-MM-DD; YYYY-MM-DD — добавить запись\n\
         Пример: <code>/add Иванова Мария Петровна; 1948-11-02; 2001-04-10</code>\n\
         Допустим и такой ввод: <code>/add Иванов И.И.; 15.09.1950; 02.06.2010</code>\n\
         Любую из дат можно оставить пустой.\n\n\
         <b>/list</b> — показать список с ID\n\
         <b>/remove</b> ID — удалить запись\n\
         <b>/help</b> — эта подсказка",
        days_word(lead_days)
    )
}

/// Executes `command` for `owner` and returns the reply text. Never fails:
/// malformed input and store errors become user-visible messages.
pub async fn handle_command(
    store: &dyn RecordStore,
    lead_days: u32,
    owner: OwnerKey,
    command: Command,
) -> String {
    match command {
        Command::Start => format!("Здравствуйте!\n{}", help_text(lead_days)),
        Command::Help => help_text(lead_days),
        Command::Add(payload) => match add(store, owner, &payload).await {
            Ok(reply) => reply,
            Err(e) => format!("Ошибка: {e}\n\nПример:\n{ADD_EXAMPLE}"),
        },
        Command::List => list(store, owner).await.unwrap_or_else(|e| format!("Ошибка: {e}")),
        Command::Remove(arg) => remove(store, owner, &arg)
            .await
            .unwrap_or_else(|e| e.to_string()),
    }
}

/// Splits `ФИО; birth; death` (newlines count as separators). Missing or
/// empty date fields are absent dates; a non-empty field must parse.
pub fn parse_add_args(payload: &str) -> Result<NewRecord, CommandError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(CommandError::MissingPayload);
    }

    let normalized = payload.replace('\n', ";");
    let parts: Vec<&str> = normalized.split(';').map(str::trim).collect();
    if parts.len() > 3 {
        return Err(CommandError::TooManyFields);
    }

    let full_name = parts[0];
    if full_name.is_empty() {
        return Err(CommandError::EmptyName);
    }
    if full_name.chars().count() > MAX_NAME_CHARS {
        return Err(CommandError::NameTooLong {
            max: MAX_NAME_CHARS,
        });
    }
    let field = |i: usize| parts.get(i).copied().unwrap_or("");

    Ok(NewRecord {
        full_name: full_name.to_string(),
        birth: parse_date(field(1))?,
        death: parse_date(field(2))?,
    })
}

async fn add(store: &dyn RecordStore, owner: OwnerKey, payload: &str) -> Result<String, CommandError> {
    let record = parse_add_args(payload)?;
    let reply_tail = format!(
        "<b>{}</b>\nРождение: {}\nСмерть: {}",
        escape_html(&record.full_name),
        format_full(record.birth),
        format_full(record.death)
    );
    let id = store.add_record(owner, record).await?;
    tracing::info!("Owner {owner} added record {id}");
    Ok(format!("Добавлено (ID: <b>{id}</b>): {reply_tail}"))
}

async fn list(store: &dyn RecordStore, owner: OwnerKey) -> Result<String, CommandError> {
    let records = store.list_records(owner).await?;
    if records.is_empty() {
        return Ok("Список пуст. Добавьте с помощью /add".to_string());
    }

    let mut lines = vec!["<b>ID</b> | <b>ФИО</b> | <b>Рождение</b> | <b>Смерть</b>".to_string()];
    lines.extend(records.iter().map(|r| {
        format!(
            "{} | {} | {} | {}",
            r.id,
            escape_html(&r.full_name),
            format_full(r.birth),
            format_full(r.death)
        )
    }));
    Ok(lines.join("\n"))
}

async fn remove(store: &dyn RecordStore, owner: OwnerKey, arg: &str) -> Result<String, CommandError> {
    let id = parse_record_id(arg)?;
    let removed = store.remove_record(owner, id).await?;
    if removed {
        tracing::info!("Owner {owner} removed record {id}");
    }
    Ok(if removed { "Удалено" } else { "Запись не найдена" }.to_string())
}

fn parse_record_id(arg: &str) -> Result<RecordId, CommandError> {
    let arg = arg.trim();
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::BadId);
    }
    arg.parse().map_err(|_| CommandError::BadId)
}
