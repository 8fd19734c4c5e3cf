//! Inbound message hooks
//!
//! Called once per chat message, after the sender has registered a name and
//! before the message is broadcast. This is the extension point for things
//! like persistence; the relay itself keeps no history.

use std::sync::Mutex;
use tracing::info;

pub trait MessageHook: Send + Sync {
    fn on_message_received(&self, sender_name: &str, message: &str);
}

/// Does nothing. The default when no hook is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl MessageHook for NoopHook {
    fn on_message_received(&self, _sender_name: &str, _message: &str) {}
}

/// Logs every inbound message at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHook;

impl MessageHook for LoggingHook {
    fn on_message_received(&self, sender_name: &str, message: &str) {
        info!("[Message Received] From {}: {}", sender_name, message);
    }
}

/// Keeps every `(sender_name, message)` pair it sees, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingHook {
    seen: Mutex<Vec<(String, String)>>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        match self.seen.lock() {
            Ok(seen) => seen.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MessageHook for RecordingHook {
    fn on_message_received(&self, sender_name: &str, message: &str) {
        let entry = (sender_name.to_string(), message.to_string());
        match self.seen.lock() {
            Ok(mut seen) => seen.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
