use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AnalyticsConfig;
use crate::error::Result;

pub type EventParams = Map<String, Value>;

/// Destination for usage events. Implementations must never block the caller
/// for long and must never fail observably.
pub trait AnalyticsSink: Send + Sync {
    fn track_event(&self, name: &str, params: EventParams);

    /// Record a virtual page view for a screen
    fn track_page_view(&self, screen_name: &str) {
        let mut params = EventParams::new();
        params.insert("page_title".to_string(), json!(screen_name));
        params.insert("page_path".to_string(), json!(format!("/{}", screen_name)));
        self.track_event("page_view", params);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn track_event(&self, _name: &str, _params: EventParams) {}
}

/// Writes events to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn track_event(&self, name: &str, params: EventParams) {
        let params = Value::Object(params);
        info!(target: "pawsignal::analytics", event = name, params = %params);
    }
}

/// Appends one JSON object per event to a file
pub struct JsonLinesAnalytics {
    file: Mutex<File>,
    session_id: Uuid,
}

impl JsonLinesAnalytics {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let session_id = Uuid::new_v4();
        info!("Analytics events appended to {} (session {})", path.display(), session_id);

        Ok(Self {
            file: Mutex::new(file),
            session_id,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl AnalyticsSink for JsonLinesAnalytics {
    fn track_event(&self, name: &str, params: EventParams) {
        let record = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "session_id": self.session_id.to_string(),
            "event": name,
            "params": params,
        });

        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{}", record) {
            warn!("Dropping analytics event '{}': {}", name, e);
        }
    }
}

/// Build the sink selected by configuration. Falls back to the log when the
/// event file cannot be opened.
pub fn from_config(config: &AnalyticsConfig) -> Arc<dyn AnalyticsSink> {
    if !config.enabled {
        return Arc::new(NoopAnalytics);
    }

    match &config.log_path {
        Some(path) => match JsonLinesAnalytics::open(path) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                warn!("Cannot open analytics file {}: {}, logging events instead", path, e);
                Arc::new(TracingAnalytics)
            }
        },
        None => Arc::new(TracingAnalytics),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, EventParams)>>,
    }

    impl AnalyticsSink for RecordingSink {
        fn track_event(&self, name: &str, params: EventParams) {
            self.events.lock().push((name.to_string(), params));
        }
    }

    #[test]
    fn test_page_view_params() {
        let sink = RecordingSink::default();
        sink.track_page_view("signal");

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "page_view");
        assert_eq!(events[0].1["page_title"], "signal");
        assert_eq!(events[0].1["page_path"], "/signal");
    }

    #[test]
    fn test_json_lines_sink_appends_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");

        let sink = JsonLinesAnalytics::open(&path).unwrap();
        let mut params = EventParams::new();
        params.insert("signal_id".to_string(), json!("red"));
        sink.track_event("flash_started", params);
        sink.track_page_view("home");

        let contents = std::fs::read_to_string(&path).unwrap();
        let records: Vec<Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["event"], "flash_started");
        assert_eq!(records[0]["params"]["signal_id"], "red");
        assert_eq!(records[1]["event"], "page_view");
        assert_eq!(records[0]["session_id"], sink.session_id().to_string());
    }

    #[test]
    fn test_tracing_sink_accepts_events() {
        let mut params = EventParams::new();
        params.insert("signal_id".to_string(), json!("blue"));
        params.insert("trigger".to_string(), json!("shake"));

        TracingAnalytics.track_event("flash_started", params);
        TracingAnalytics.track_page_view("signal");
    }

    #[test]
    fn test_enabled_config_without_file_logs_events() {
        let config = AnalyticsConfig {
            enabled: true,
            log_path: None,
        };

        from_config(&config).track_page_view("home");
    }

    #[test]
    fn test_disabled_config_uses_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let config = AnalyticsConfig {
            enabled: false,
            log_path: Some(path.display().to_string()),
        };

        from_config(&config).track_page_view("home");
        assert!(!path.exists());
    }
}
