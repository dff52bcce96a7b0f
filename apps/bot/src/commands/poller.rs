use std::time::Duration;

use tracing::{debug, info, warn};

use crate::commands::handlers::handle_command;
use crate::commands::parse_command;
use crate::state::AppState;
use crate::telegram::Update;

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(5);

/// Long-polls Telegram for messages and answers recognized commands.
/// Runs until the process exits; runs alongside the scheduler.
pub async fn run_command_poller(state: AppState) {
    let mut offset = 0;
    info!("Command poller started");

    loop {
        let updates = match state
            .telegram
            .get_updates(offset, state.config.poll_timeout)
            .await
        {
            Ok(updates) => updates,
            Err(e) => {
                warn!("getUpdates failed: {e}");
                tokio::time::sleep(POLL_ERROR_PAUSE).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            dispatch(&state, update).await;
        }
    }
}

async fn dispatch(state: &AppState, update: Update) {
    let Some(message) = update.message else {
        return;
    };
    let Some(command) = message.text.as_deref().and_then(parse_command) else {
        return;
    };
    let owner = message.chat.id;
    debug!("Chat {owner} sent {command:?}");

    let reply = handle_command(
        state.store.as_ref(),
        state.config.days_before,
        owner,
        command,
    )
    .await;

    if let Err(e) = state.telegram.send_message(owner, &reply).await {
        warn!("Failed to reply to chat {owner}: {e}");
    }
}
