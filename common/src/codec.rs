//! Decoding of job server response bodies.
//!
//! Bodies are read fully before they get here. Failures on the top-level
//! shape are reported; the `result` of a job is kept opaque (see
//! [`crate::JobResult`]).

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::artifact::{DataFile, JarInfo};
use crate::job::{JobConfig, JobInfo};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed {what} payload: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid upload time {value:?} for binary {name}")]
    Timestamp {
        name: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

fn decode<T: DeserializeOwned>(what: &'static str, body: &str) -> Result<T, DecodeError> {
    serde_json::from_str(body).map_err(|source| DecodeError::Json { what, source })
}

/// `/jars` lists `name -> time`, `/binaries` lists
/// `name -> {"binary-type", "upload-time"}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireArtifact {
    Uploaded(String),
    Binary {
        #[serde(rename = "binary-type")]
        binary_type: Option<String>,
        #[serde(rename = "upload-time")]
        upload_time: String,
    },
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).or_else(|err| {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc().fixed_offset())
            .map_err(|_| err)
    })
}

/// Artifact catalog, sorted by name.
pub fn decode_jars(body: &str) -> Result<Vec<JarInfo>, DecodeError> {
    let catalog: BTreeMap<String, WireArtifact> = decode("binary catalog", body)?;
    catalog
        .into_iter()
        .map(|(name, artifact)| {
            let (binary_type, value) = match artifact {
                WireArtifact::Uploaded(time) => (None, time),
                WireArtifact::Binary {
                    binary_type,
                    upload_time,
                } => (binary_type, upload_time),
            };
            match parse_timestamp(&value) {
                Ok(uploaded_at) => Ok(JarInfo {
                    name,
                    uploaded_at,
                    binary_type,
                }),
                Err(source) => Err(DecodeError::Timestamp {
                    name,
                    value,
                    source,
                }),
            }
        })
        .collect()
}

pub fn decode_contexts(body: &str) -> Result<Vec<String>, DecodeError> {
    decode("context list", body)
}

pub fn decode_jobs(body: &str) -> Result<Vec<JobInfo>, DecodeError> {
    decode("job list", body)
}

/// A single job record. The caller injects the job id when the payload
/// lacks one.
pub fn decode_job_info(body: &str) -> Result<JobInfo, DecodeError> {
    decode("job info", body)
}

pub fn decode_job_config(body: &str) -> Result<JobConfig, DecodeError> {
    decode("job config", body)
}

pub fn decode_data_files(body: &str) -> Result<Vec<String>, DecodeError> {
    decode("data file list", body)
}

#[derive(Deserialize)]
struct DataUpload {
    result: DataFile,
}

pub fn decode_data_upload(body: &str) -> Result<DataFile, DecodeError> {
    decode::<DataUpload>("data upload", body).map(|upload| upload.result)
}

/// Generic `{"status": ..., "result": ...}` envelope returned by context
/// and binary mutations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusEnvelope {
    pub status: String,
    #[serde(default)]
    pub result: Value,
}

pub fn decode_status(body: &str) -> Result<StatusEnvelope, DecodeError> {
    decode("status", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobId, JobStatus};

    #[test]
    fn test_decode_jars() {
        let jars = decode_jars(
            r#"{"wordcount":"2014-10-07T10:48:51.237-07:00","demo":"2018-05-03T20:25:00.000+08:00"}"#,
        )
        .unwrap();
        assert_eq!(jars.len(), 2);
        assert_eq!(jars[0].name, "demo");
        assert_eq!(jars[1].name, "wordcount");
        assert_eq!(jars[1].binary_type, None);
        assert_eq!(jars[1].uploaded_at.to_rfc3339(), "2014-10-07T10:48:51.237-07:00");
    }

    #[test]
    fn test_decode_binaries() {
        let jars = decode_jars(
            r#"{"sql-app":{"binary-type":"Jar","upload-time":"2016-04-06T13:52:20.546Z"},
                "py-app":{"binary-type":"Egg","upload-time":"2016-04-06T13:52:21.001"}}"#,
        )
        .unwrap();
        assert_eq!(jars[0].name, "py-app");
        assert_eq!(jars[0].binary_type.as_deref(), Some("Egg"));
        assert_eq!(jars[1].binary_type.as_deref(), Some("Jar"));
    }

    #[test]
    fn test_decode_jars_bad_timestamp() {
        let err = decode_jars(r#"{"app":"yesterday"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Timestamp { ref name, .. } if name == "app"));
    }

    #[test]
    fn test_malformed_bodies_fail() {
        assert!(decode_contexts("not json").is_err());
        assert!(decode_jobs(r#"{"jobId":"j1"}"#).is_err());
        assert!(decode_job_config("[1,2]").is_err());
    }

    #[test]
    fn test_decode_contexts_keeps_order() {
        let contexts = decode_contexts(r#"["b-ctx","a-ctx","c-ctx"]"#).unwrap();
        assert_eq!(contexts, vec!["b-ctx", "a-ctx", "c-ctx"]);
    }

    #[test]
    fn test_decode_jobs() {
        let jobs = decode_jobs(
            r#"[{"jobId":"j1","status":"RUNNING","context":"ctx","classPath":"Foo","duration":"Job not done yet","startTime":"2018-05-03T20:25:00.000+08:00"},
                {"jobId":"j2","status":"FINISHED","result":{"a":4}}]"#,
        )
        .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id(), Some(&JobId::from("j1")));
        assert!(jobs[0].is_running());
        assert_eq!(jobs[0].class_path(), Some("Foo"));
        assert!(jobs[0].result().is_absent());
        assert_eq!(jobs[1].status(), Some(JobStatus::Finished));
        assert_eq!(jobs[1].result_as_string().as_deref(), Some(r#"{"a":4}"#));
    }

    #[test]
    fn test_decode_job_config() {
        let config =
            decode_job_config(r#"{"input.string":"a b c","spark":{"master":"local[4]"}}"#).unwrap();
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("input.string"), Some(&Value::from("a b c")));
    }

    #[test]
    fn test_decode_data_upload() {
        let file = decode_data_upload(
            r#"{"result":{"filename":"/tmp/spark-jobserver/upload/input-2016-04-06T13_52_20.json"}}"#,
        )
        .unwrap();
        assert!(file.filename.starts_with("/tmp/spark-jobserver/upload/input"));
    }

    #[test]
    fn test_decode_status() {
        let status = decode_status(r#"{"status":"SUCCESS","result":"Context initialized"}"#).unwrap();
        assert_eq!(status.status, "SUCCESS");
        assert_eq!(status.result, Value::from("Context initialized"));
    }
}
