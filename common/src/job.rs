use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::codec::DecodeError;

/// Marker the job server puts in the result of a lookup for an unknown id.
pub const NO_SUCH_JOB: &str = "No such job ID";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        JobId(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        JobId(id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Started,
    Running,
    Finished,
    Ok,
    Error,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Started | Self::Running)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished | Self::Ok)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Ok | Self::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Started => "STARTED",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Structured failure reported by a job that ended in `ERROR`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub message: String,
    #[serde(default)]
    pub error_class: Option<String>,
    #[serde(default)]
    pub stack: Vec<String>,
}

/// The `result` field of a job record.
///
/// The server puts whatever the job returned here, or an error description
/// when the job failed. Nothing is flattened: an error result keeps the
/// payload it was parsed from, and callers convert on demand.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JobResult {
    #[default]
    Absent,
    Error { error: JobError, raw: Value },
    Raw(Value),
}

impl JobResult {
    fn classify(status: Option<JobStatus>, value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => JobResult::Absent,
            Some(value) if status == Some(JobStatus::Error) => {
                match serde_json::from_value::<JobError>(value.clone()) {
                    Ok(error) => JobResult::Error { error, raw: value },
                    Err(_) => JobResult::Raw(value),
                }
            }
            Some(value) => JobResult::Raw(value),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, JobResult::Absent)
    }

    /// The payload exactly as the server sent it.
    pub fn raw(&self) -> Option<&Value> {
        match self {
            JobResult::Absent => None,
            JobResult::Error { raw, .. } => Some(raw),
            JobResult::Raw(value) => Some(value),
        }
    }

    pub fn to_value(&self) -> Option<Value> {
        self.raw().cloned()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireJobInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    contents: Option<String>,
    #[serde(flatten)]
    extend_attributes: HashMap<String, Value>,
}

/// One job as reported by `GET /jobs`, `GET /jobs/{id}` or `POST /jobs`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "WireJobInfo", into = "WireJobInfo")]
pub struct JobInfo {
    job_id: Option<JobId>,
    status: Option<JobStatus>,
    context: Option<String>,
    class_path: Option<String>,
    duration: Option<String>,
    start_time: Option<String>,
    result: JobResult,
    contents: Option<String>,
    extend_attributes: HashMap<String, Value>,
}

impl From<WireJobInfo> for JobInfo {
    fn from(wire: WireJobInfo) -> Self {
        JobInfo {
            result: JobResult::classify(wire.status, wire.result),
            job_id: wire.job_id,
            status: wire.status,
            context: wire.context,
            class_path: wire.class_path,
            duration: wire.duration,
            start_time: wire.start_time,
            contents: None,
            extend_attributes: wire.extend_attributes,
        }
    }
}

impl From<JobInfo> for WireJobInfo {
    fn from(info: JobInfo) -> Self {
        WireJobInfo {
            result: info.result.to_value(),
            job_id: info.job_id,
            status: info.status,
            context: info.context,
            class_path: info.class_path,
            duration: info.duration,
            start_time: info.start_time,
            contents: info.contents,
            extend_attributes: info.extend_attributes,
        }
    }
}

impl JobInfo {
    /// Builds a record for a response that carried no job payload, only
    /// text. Used when the server answers 404 for a job id.
    pub fn from_contents(contents: impl Into<String>, job_id: Option<JobId>) -> Self {
        JobInfo {
            job_id,
            contents: Some(contents.into()),
            ..Default::default()
        }
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    /// Sets the id only when the payload did not carry one.
    pub fn ensure_job_id(&mut self, job_id: impl Into<JobId>) {
        if self.job_id.is_none() {
            self.job_id = Some(job_id.into());
        }
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.status
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn class_path(&self) -> Option<&str> {
        self.class_path.as_deref()
    }

    pub fn duration(&self) -> Option<&str> {
        self.duration.as_deref()
    }

    pub fn start_time(&self) -> Option<&str> {
        self.start_time.as_deref()
    }

    /// Start time parsed as RFC 3339, `None` if absent or unparseable.
    pub fn started_at(&self) -> Option<DateTime<FixedOffset>> {
        self.start_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    pub fn result(&self) -> &JobResult {
        &self.result
    }

    /// Raw response text for records built with [`JobInfo::from_contents`].
    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    pub fn extend_attributes(&self) -> &HashMap<String, Value> {
        &self.extend_attributes
    }

    pub fn put_extend_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.extend_attributes.insert(key.into(), value);
    }

    pub fn contains_extend_attributes(&self) -> bool {
        !self.extend_attributes.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.status.map_or(false, |s| s.is_running())
    }

    pub fn is_finished(&self) -> bool {
        self.status.map_or(false, |s| s.is_finished())
    }

    pub fn is_error(&self) -> bool {
        self.status == Some(JobStatus::Error)
    }

    /// True when the server reported `ERROR` and the result text names an
    /// unknown job id. This is a text match on whatever the server wrote.
    ///
    /// A record built from a bare 404 has no status and therefore reports
    /// `false` here; see [`JobInfo::is_not_found`].
    pub fn job_not_exists(&self) -> bool {
        self.is_error()
            && self
                .result_as_string()
                .map_or(false, |text| text.contains(NO_SUCH_JOB))
    }

    /// True for records synthesized from a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.status.is_none() && self.contents.is_some()
    }

    /// No further polling will change this record.
    pub fn is_terminal(&self) -> bool {
        self.status.map_or(self.is_not_found(), |s| s.is_terminal())
    }

    /// Converts the result into a caller-chosen type. An absent result is
    /// presented as JSON `null`, so `Option<T>` targets decode to `None`.
    pub fn result_as<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let value = self.result.to_value().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|source| DecodeError::Json {
            what: "job result",
            source,
        })
    }

    /// The error record, or `None` when the job is not in `ERROR`.
    pub fn result_as_error(&self) -> Result<Option<JobError>, DecodeError> {
        if !self.is_error() {
            return Ok(None);
        }
        match &self.result {
            JobResult::Absent => Ok(None),
            JobResult::Error { error, .. } => Ok(Some(error.clone())),
            JobResult::Raw(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| DecodeError::Json {
                    what: "job error",
                    source,
                }),
        }
    }

    /// Compact JSON rendering of the result.
    pub fn result_as_string(&self) -> Option<String> {
        self.result.raw().map(|v| v.to_string())
    }
}

impl std::fmt::Display for JobInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// Configuration a job ran with, as returned by `GET /jobs/{id}/config`.
/// Values are passed through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobConfig {
    configs: HashMap<String, Value>,
}

impl JobConfig {
    pub fn configs(&self) -> &HashMap<String, Value> {
        &self.configs
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.configs.get(key)
    }

    pub fn put_config_item(&mut self, key: impl Into<String>, value: Value) {
        self.configs.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(status: JobStatus, result: Value) -> JobInfo {
        serde_json::from_value(json!({
            "jobId": "j1",
            "status": status,
            "result": result,
        }))
        .unwrap()
    }

    #[test]
    fn test_running_states() {
        for status in [JobStatus::Started, JobStatus::Running] {
            let info = job(status, Value::Null);
            assert!(info.is_running());
            assert!(!info.is_finished());
            assert!(!info.is_error());
            assert!(!info.is_terminal());
        }
    }

    #[test]
    fn test_finished_states() {
        for status in [JobStatus::Finished, JobStatus::Ok] {
            let info = job(status, json!({"a": 4}));
            assert!(info.is_finished());
            assert!(!info.is_running());
            assert!(!info.is_error());
            assert!(info.is_terminal());
        }
    }

    #[test]
    fn test_job_not_exists_matches_result_text() {
        let missing = job(JobStatus::Error, json!("No such job ID 1234"));
        assert!(missing.job_not_exists());

        let failed = job(JobStatus::Error, json!("job crashed"));
        assert!(!failed.job_not_exists());

        // Same text without ERROR status does not count.
        let odd = job(JobStatus::Ok, json!("No such job ID 1234"));
        assert!(!odd.job_not_exists());
    }

    #[test]
    fn test_result_as_error() {
        let failed = job(
            JobStatus::Error,
            json!({"message": "boom", "errorClass": "X", "stack": ["a", "b"]}),
        );
        let error = failed.result_as_error().unwrap().unwrap();
        assert_eq!(error.message, "boom");
        assert_eq!(error.error_class.as_deref(), Some("X"));
        assert_eq!(error.stack, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(failed.result(), JobResult::Error { .. }));

        let ok = job(JobStatus::Ok, json!({"message": "boom", "errorClass": "X"}));
        assert_eq!(ok.result_as_error().unwrap(), None);
    }

    #[test]
    fn test_error_result_keeps_extra_fields() {
        let failed = job(
            JobStatus::Error,
            json!({"message": "boom", "errorClass": "X", "stack": ["a"], "causingClass": "Y"}),
        );
        assert_eq!(failed.result_as_error().unwrap().unwrap().message, "boom");

        let text = failed.result_as_string().unwrap();
        assert!(text.contains("causingClass"));
        let raw: HashMap<String, Value> = failed.result_as().unwrap();
        assert_eq!(raw["causingClass"], json!("Y"));

        let reencoded = serde_json::to_value(&failed).unwrap();
        assert_eq!(reencoded["result"]["causingClass"], json!("Y"));
    }

    #[test]
    fn test_error_without_class() {
        let failed = job(JobStatus::Error, json!({"message": "boom"}));
        let error = failed.result_as_error().unwrap().unwrap();
        assert_eq!(error.message, "boom");
        assert_eq!(error.error_class, None);
        assert!(error.stack.is_empty());
    }

    #[test]
    fn test_malformed_error_result_is_deferred() {
        // Decoding succeeds; only the typed conversion fails.
        let failed = job(JobStatus::Error, json!({"unexpected": true}));
        assert!(matches!(failed.result(), JobResult::Raw(_)));
        assert!(failed.result_as_error().is_err());
        assert_eq!(
            failed.result_as_string().as_deref(),
            Some(r#"{"unexpected":true}"#)
        );
    }

    #[test]
    fn test_result_as_user_type() {
        let info = job(JobStatus::Ok, json!({"a": 4, "b": 1}));
        let counts: HashMap<String, u32> = info.result_as().unwrap();
        assert_eq!(counts["a"], 4);

        let running = job(JobStatus::Running, Value::Null);
        assert!(running.result().is_absent());
        let nothing: Option<HashMap<String, u32>> = running.result_as().unwrap();
        assert!(nothing.is_none());
    }

    #[test]
    fn test_from_contents_has_no_status() {
        let info = JobInfo::from_contents("no such job", Some(JobId::from("abc")));
        assert_eq!(info.job_id(), Some(&JobId::from("abc")));
        assert_eq!(info.status(), None);
        assert_eq!(info.contents(), Some("no such job"));
        assert!(!info.job_not_exists());
        assert!(info.is_not_found());
        assert!(info.is_terminal());
    }

    #[test]
    fn test_unknown_fields_become_extend_attributes() {
        let info: JobInfo = serde_json::from_str(
            r#"{"jobId":"j1","status":"KILLED","context":"ctx","owner":"alice"}"#,
        )
        .unwrap();
        assert_eq!(info.status(), Some(JobStatus::Unknown));
        assert_eq!(info.context(), Some("ctx"));
        assert!(info.contains_extend_attributes());
        assert_eq!(info.extend_attributes()["owner"], json!("alice"));
    }

    #[test]
    fn test_ensure_job_id_keeps_existing() {
        let mut info = job(JobStatus::Ok, Value::Null);
        info.ensure_job_id("other");
        assert_eq!(info.job_id(), Some(&JobId::from("j1")));

        let mut bare: JobInfo = serde_json::from_str(r#"{"status":"OK"}"#).unwrap();
        bare.ensure_job_id("j2");
        assert_eq!(bare.job_id(), Some(&JobId::from("j2")));
    }

    #[test]
    fn test_started_at() {
        let info: JobInfo = serde_json::from_str(
            r#"{"jobId":"j1","status":"RUNNING","startTime":"2018-05-03T20:25:00.000+08:00"}"#,
        )
        .unwrap();
        assert!(info.started_at().is_some());
    }
}
