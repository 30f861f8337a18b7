//! Usage analytics: fire-and-forget event logging.
//!
//! Events are appended as JSON lines to `~/.axon/events.jsonl`, one object
//! per line with an ISO-8601 UTC `ts` and a `type` field. All I/O and
//! serialization failures are swallowed and logged at debug level so a
//! logging failure never affects callers.

use chrono::Utc;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

use crate::config::AXON_DIR;

/// Append a JSON event line to the events file. Never raises.
pub fn log_event(event_type: &str, fields: &[(&str, Value)]) {
    if let Err(e) = try_log_event(event_type, fields) {
        debug!("Failed to log analytics event: {e}");
    }
}

fn try_log_event(event_type: &str, fields: &[(&str, Value)]) -> std::io::Result<()> {
    let mut event = Map::new();
    event.insert("ts".into(), Value::String(Utc::now().to_rfc3339()));
    event.insert("type".into(), Value::String(event_type.to_string()));
    for (key, value) in fields {
        event.insert((*key).to_string(), value.clone());
    }

    let path = events_path().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "home directory unavailable")
    })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(&Value::Object(event))?;
    writeln!(file, "{line}")
}

fn events_path() -> Option<PathBuf> {
    Some(dirs::home_dir()?.join(AXON_DIR).join("events.jsonl"))
}
