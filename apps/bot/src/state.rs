use std::sync::Arc;

use crate::config::Config;
use crate::store::RecordStore;
use crate::telegram::TelegramClient;

/// Shared application state for the command poller and the health route.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub telegram: TelegramClient,
    pub config: Config,
}
