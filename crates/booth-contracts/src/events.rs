use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Everything a booth session reports to its `events.jsonl`. The variant
/// name becomes the line's `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoothEvent {
    ScreenChanged {
        to: String,
    },
    PhotoCaptured {
        source: CaptureSource,
    },
    SelectionChanged {
        category: String,
        choice: String,
    },
    ProviderSkipped {
        provider: String,
        reason: String,
    },
    ProviderAttempted {
        provider: String,
        request: String,
    },
    ProviderFailed {
        provider: String,
        error: String,
    },
    TransformCompleted {
        provider: String,
        request: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        public_url: Option<String>,
    },
    RepublishFailed {
        provider: String,
        error: String,
    },
    EmailSent {
        to: String,
    },
    SessionReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    Camera,
    Upload,
}

#[derive(Serialize)]
struct EventLine<'a> {
    #[serde(flatten)]
    event: &'a BoothEvent,
    session_id: &'a str,
    ts: String,
}

/// Append-only session log: one compact JSON object per line, each stamped
/// with the session id and an RFC3339 timestamp. Clones share one sink.
#[derive(Clone)]
pub struct SessionLog {
    session_id: Arc<str>,
    sink: Arc<Mutex<BufWriter<File>>>,
}

impl SessionLog {
    /// Opens (creating parent directories as needed) the log file in append
    /// mode and holds it for the lifetime of the session.
    pub fn create(path: impl AsRef<Path>, session_id: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed creating {}", parent.display()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed opening {}", path.display()))?;
        Ok(Self {
            session_id: session_id.into().into(),
            sink: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record(&self, event: BoothEvent) -> Result<()> {
        let line = serde_json::to_string(&EventLine {
            event: &event,
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        })?;
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| anyhow::anyhow!("session log lock poisoned"))?;
        sink.write_all(line.as_bytes())?;
        sink.write_all(b"\n")?;
        sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::Value;

    use super::{BoothEvent, CaptureSource, SessionLog};

    #[test]
    fn records_tagged_lines_with_session_envelope() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = SessionLog::create(&path, "session-7")?;

        log.record(BoothEvent::ScreenChanged {
            to: "camera".to_string(),
        })?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(parsed["type"], "screen_changed");
        assert_eq!(parsed["to"], "camera");
        assert_eq!(parsed["session_id"], "session-7");
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn events_append_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = SessionLog::create(&path, "session-7")?;

        log.record(BoothEvent::PhotoCaptured {
            source: CaptureSource::Camera,
        })?;
        log.record(BoothEvent::SessionReset)?;

        let content = fs::read_to_string(&path)?;
        let types: Vec<String> = content
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
            .collect();
        assert_eq!(types, vec!["photo_captured", "session_reset"]);
        Ok(())
    }

    #[test]
    fn clones_share_one_sink() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = SessionLog::create(&path, "session-7")?;
        let shared = log.clone();

        log.record(BoothEvent::EmailSent {
            to: "guest@example.com".to_string(),
        })?;
        shared.record(BoothEvent::SessionReset)?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(content.lines().count(), 2);
        Ok(())
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = SessionLog::create(&path, "session-7")?;

        log.record(BoothEvent::TransformCompleted {
            provider: "google".to_string(),
            request: "abcd1234".to_string(),
            public_url: None,
        })?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(parsed.get("public_url"), None);
        assert_eq!(parsed["provider"], "google");
        Ok(())
    }
}
