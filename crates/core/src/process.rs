//! Monitored-process records: the discoverable process list and the
//! current selection.

use serde::{Deserialize, Serialize};

use crate::de;

/// A JVM process the backend can attach to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessInfo {
    #[serde(deserialize_with = "de::id_string")]
    pub pid: String,
    #[serde(deserialize_with = "de::null_as_default")]
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(deserialize_with = "de::opt_float", skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(deserialize_with = "de::opt_float", skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
}

impl ProcessInfo {
    /// Display name, falling back to `name` and then to the pid.
    pub fn label(&self) -> String {
        if !self.display_name.is_empty() {
            return self.display_name.clone();
        }
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("pid {}", self.pid),
        }
    }
}

/// Decode a process-list payload entry by entry. Malformed entries are
/// skipped; a payload that is not a list yields an empty list.
pub fn parse_process_list(value: serde_json::Value) -> Vec<ProcessInfo> {
    de::list(Some(&value), "processes", |item| ProcessInfo::deserialize(item).ok())
}

/// The process the user chose to monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSelection {
    pub pid: String,
    pub name: String,
}

impl ProcessSelection {
    pub fn new(pid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pid: pid.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ProcessSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (PID: {})", self.name, self.pid)
    }
}

/// Response of `GET /api/monitor/current` and payload of the `monitor`
/// push topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorStatus {
    #[serde(deserialize_with = "de::opt_id_string")]
    pub pid: Option<String>,
    pub process_name: Option<String>,
    #[serde(deserialize_with = "de::null_as_default")]
    pub monitoring: bool,
    pub message: Option<String>,
    #[serde(deserialize_with = "de::opt_id_string")]
    pub previous_pid: Option<String>,
}

impl MonitorStatus {
    /// The selection this status describes, if a process is attached.
    pub fn selection(&self) -> Option<ProcessSelection> {
        let pid = self.pid.clone()?;
        let name = self.process_name.clone().unwrap_or_else(|| "Unknown".to_string());
        Some(ProcessSelection { pid, name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_string_pids() {
        let list = parse_process_list(json!([
            {"pid": 1234, "displayName": "app.jar", "name": "app.jar", "cpuUsage": 3.5},
            {"pid": "99", "displayName": "Other"}
        ]));
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].pid, "1234");
        assert_eq!(list[0].cpu_usage, Some(3.5));
        assert_eq!(list[1].pid, "99");
    }

    #[test]
    fn bad_process_list_is_empty() {
        assert!(parse_process_list(json!({"pid": 1})).is_empty());
    }

    #[test]
    fn bad_entry_does_not_empty_the_list() {
        let list = parse_process_list(json!([
            {"pid": 1, "displayName": "a"},
            {"pid": 2, "displayName": ["not", "a", "name"]},
            42,
            {"pid": 3, "memoryUsage": "12.5"}
        ]));
        let pids: Vec<&str> = list.iter().map(|p| p.pid.as_str()).collect();
        assert_eq!(pids, vec!["1", "3"]);
        assert_eq!(list[1].memory_usage, Some(12.5));
    }

    #[test]
    fn label_fallbacks() {
        let mut info = ProcessInfo {
            pid: "5".into(),
            ..Default::default()
        };
        assert_eq!(info.label(), "pid 5");
        info.name = Some("svc".into());
        assert_eq!(info.label(), "svc");
        info.display_name = "Service".into();
        assert_eq!(info.label(), "Service");
    }

    #[test]
    fn monitor_status_selection() {
        let status: MonitorStatus = serde_json::from_value(json!({
            "pid": 42, "processName": "demo", "monitoring": true
        }))
        .unwrap();
        assert_eq!(status.selection(), Some(ProcessSelection::new("42", "demo")));
        assert_eq!(status.selection().unwrap().to_string(), "demo (PID: 42)");

        let idle: MonitorStatus = serde_json::from_value(json!({"pid": null})).unwrap();
        assert!(idle.selection().is_none());
    }
}
