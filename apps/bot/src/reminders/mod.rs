pub mod format;
pub mod scan;

pub use scan::{ReminderSettings, ScanEngine, ScanReport};
