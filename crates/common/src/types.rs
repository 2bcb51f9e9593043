//! Types shared by the vCloud Director and Cloud Avenue APIs

use serde::{Deserialize, Serialize};

/// Reference to another vCD entity (`{"name": ..., "id": "urn:vcloud:..."}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl EntityRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            id: id.into(),
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// One page of a cloudapi collection
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub result_total: u64,
    #[serde(default)]
    pub page_count: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub page_size: u64,
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

/// Wrapper used by cloudapi bodies that are just a list (`{"values": [...]}`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Values<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

impl<T> Values<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }
}

/// vCloud Director async task
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub error: Option<TaskError>,
    #[serde(default)]
    pub owner: Option<EntityRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskError {
    #[serde(default)]
    pub major_error_code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Queued,
    PreRunning,
    Running,
    Success,
    Error,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Error | TaskStatus::Aborted)
    }
}

/// Cloud Avenue async job
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: JobStatus,
    #[serde(default)]
    pub actions: Vec<JobAction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAction {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Pending,
    InProgress,
    Done,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Body returned by Cloud Avenue calls that start a job
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: String,
}

impl Job {
    /// First failed action detail, falling back to the description.
    pub fn failure_message(&self) -> String {
        self.actions
            .iter()
            .find(|a| a.status.eq_ignore_ascii_case("FAILED"))
            .map(|a| format!("{}: {}", a.name, a.details))
            .unwrap_or_else(|| self.description.clone())
    }
}

/// Extracts the bare UUID from a vCD URN (`urn:vcloud:vdcGroup:<uuid>`).
pub fn urn_uuid(urn: &str) -> &str {
    urn.rsplit(':').next().unwrap_or(urn)
}

/// True for `urn:vcloud:<kind>:<uuid>` identifiers.
pub fn is_urn(value: &str, kind: &str) -> bool {
    let mut parts = value.splitn(4, ':');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some("urn"), Some("vcloud"), Some(k), Some(uuid)) if k == kind && !uuid.is_empty()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urn_helpers() {
        let urn = "urn:vcloud:vdcGroup:2e4f1d1c-0000-4b4b-9f33-5c0d5a5b5b5b";
        assert_eq!(urn_uuid(urn), "2e4f1d1c-0000-4b4b-9f33-5c0d5a5b5b5b");
        assert!(is_urn(urn, "vdcGroup"));
        assert!(!is_urn(urn, "vdc"));
        assert!(!is_urn("my-vdc-group", "vdcGroup"));
        assert!(!is_urn("urn:vcloud:vdcGroup:", "vdcGroup"));
    }

    #[test]
    fn test_task_status_parsing() {
        let task: Task = serde_json::from_str(
            r#"{"id":"urn:vcloud:task:1","status":"preRunning","operation":"Creating"}"#,
        )
        .unwrap();
        assert_eq!(task.status, TaskStatus::PreRunning);
        assert!(!task.status.is_terminal());

        let task: Task = serde_json::from_str(r#"{"status":"somethingNew"}"#).unwrap();
        assert_eq!(task.status, TaskStatus::Unknown);
    }

    #[test]
    fn test_job_failure_message() {
        let job: Job = serde_json::from_str(
            r#"{"name":"CREATE_VDC","description":"vdc creation","status":"FAILED",
                "actions":[{"name":"check","status":"DONE","details":""},
                           {"name":"create","status":"FAILED","details":"quota exceeded"}]}"#,
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_message(), "create: quota exceeded");
    }
}
