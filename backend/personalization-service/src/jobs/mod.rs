pub mod conversation_archiver;

pub use conversation_archiver::{start_conversation_archiver, DEFAULT_SCAN_INTERVAL};
