//! Blocking client for the job server REST API.
//!
//! Every method performs one HTTP round trip. Read endpoints turn an
//! unexpected status into [`ClientError::Remote`]; mutations (uploads,
//! deletes, context creation) log it and return `false` so callers can treat
//! "already exists" or "already gone" as ordinary outcomes.

use common::{codec, keys, BinaryType, DataFile, JarInfo, JobConfig, JobId, JobInfo, Params};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::{ArtifactRoute, TransportConfig};
use crate::error::ClientError;

pub type Result<T> = std::result::Result<T, ClientError>;

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=UTF-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// A fully read response.
struct Reply {
    url: Url,
    status: StatusCode,
    body: String,
}

impl Reply {
    fn into_error(self) -> ClientError {
        log::error!("Job server {} responded {} {}", self.url, self.status.as_u16(), self.body);
        ClientError::Remote {
            url: self.url.to_string(),
            status: self.status.as_u16(),
            body: self.body,
        }
    }

    /// Outcome of a mutation: `true` on 200, otherwise logged and `false`.
    fn succeeded(self) -> bool {
        if self.status == StatusCode::OK {
            if let Ok(envelope) = codec::decode_status(&self.body) {
                log::debug!("{}: {} {}", self.url, envelope.status, envelope.result);
            }
            true
        } else {
            log::error!("Job server {} responded {} {}", self.url, self.status.as_u16(), self.body);
            false
        }
    }
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ClientError::validation(format!("The given {} is empty", what)));
    }
    Ok(())
}

fn query_pairs(params: &Params) -> Vec<(&str, String)> {
    params.iter().map(|(k, v)| (k.as_str(), v.to_string())).collect()
}

#[derive(Debug)]
pub struct JobServerClient {
    base_url: String,
    artifact_route: ArtifactRoute,
    http: Client,
}

impl JobServerClient {
    /// The URL is not checked here; a malformed one surfaces as a
    /// [`ClientError::Transport`] on the first call.
    pub fn new(url: &str, transport: &TransportConfig) -> Result<Self> {
        let mut base_url = url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        // No idle connections are kept: each call opens and releases its own.
        let mut builder = Client::builder()
            .connect_timeout(transport.connect_timeout())
            .timeout(transport.timeout())
            .pool_max_idle_per_host(0);
        if let Some(agent) = &transport.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::transport("Failed to build HTTP client", e))?;

        Ok(Self {
            base_url,
            artifact_route: transport.artifact_route,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn artifact_route(&self) -> ArtifactRoute {
        self.artifact_route
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ClientError::transport(format!("Malformed job server url {}", self.base_url), e)
        })?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Transport {
                message: format!("Job server url {} cannot take a path", self.base_url),
                source: None,
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self.http.request(method, self.endpoint(segments)?))
    }

    fn send(&self, request: RequestBuilder) -> Result<Reply> {
        let request = request.build()?;
        let url = request.url().clone();
        log::debug!("{} {}", request.method(), url);

        let response = self.http.execute(request)?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ClientError::transport(format!("Failed to read response from {}", url), e))?;
        let body = body.trim().to_string();
        log::trace!("{} {} {}", url, status.as_u16(), body);

        Ok(Reply { url, status, body })
    }

    /// Lists uploaded binaries, sorted by name.
    pub fn get_jars(&self) -> Result<Vec<JarInfo>> {
        let reply = self.send(self.request(Method::GET, &[self.artifact_route.segment()])?)?;
        if reply.status != StatusCode::OK {
            return Err(reply.into_error());
        }
        Ok(codec::decode_jars(&reply.body)?)
    }

    /// Uploads a binary under `name`. The reader is consumed and dropped
    /// whatever the outcome.
    pub fn upload_binary<R: Read>(
        &self,
        mut data: R,
        name: &str,
        binary_type: BinaryType,
    ) -> Result<bool> {
        require(name, "binary name")?;
        let mut bytes = Vec::new();
        data.read_to_end(&mut bytes)
            .map_err(|e| ClientError::transport("Failed to read binary data", e))?;
        if bytes.is_empty() {
            return Err(ClientError::validation(format!("No data to upload for binary {}", name)));
        }

        let request = self
            .request(Method::POST, &[self.artifact_route.segment(), name])?
            .header(CONTENT_TYPE, binary_type.content_type())
            .body(bytes);
        Ok(self.send(request)?.succeeded())
    }

    pub fn upload_jar<R: Read>(&self, data: R, name: &str) -> Result<bool> {
        self.upload_binary(data, name, BinaryType::Jar)
    }

    /// Uploads a `.jar`, `.egg` or `.whl` file, typed by its extension.
    pub fn upload_binary_file(&self, path: impl AsRef<Path>, name: &str) -> Result<bool> {
        let path = path.as_ref();
        let binary_type = BinaryType::from_path(path).ok_or_else(|| {
            ClientError::validation(format!("{} is not a jar, egg or wheel file", path.display()))
        })?;
        require(name, "binary name")?;

        let file = File::open(path).map_err(|e| {
            log::error!("Failed to open binary {}: {}", path.display(), e);
            ClientError::transport(format!("Failed to open binary {}", path.display()), e)
        })?;
        self.upload_binary(file, name, binary_type)
    }

    pub fn delete_binary(&self, name: &str) -> Result<bool> {
        require(name, "binary name")?;
        let reply = self.send(self.request(Method::DELETE, &[self.artifact_route.segment(), name])?)?;
        Ok(reply.succeeded())
    }

    pub fn get_contexts(&self) -> Result<Vec<String>> {
        let reply = self.send(self.request(Method::GET, &["contexts"])?)?;
        if reply.status != StatusCode::OK {
            return Err(reply.into_error());
        }
        Ok(codec::decode_contexts(&reply.body)?)
    }

    /// Creates a context. A name collision is reported as `Ok(false)`.
    pub fn create_context(&self, name: &str, params: &Params) -> Result<bool> {
        require(name, "context name")?;
        let request = self
            .request(Method::POST, &["contexts", name])?
            .query(&query_pairs(params));
        Ok(self.send(request)?.succeeded())
    }

    pub fn delete_context(&self, name: &str) -> Result<bool> {
        require(name, "context name")?;
        let reply = self.send(self.request(Method::DELETE, &["contexts", name])?)?;
        Ok(reply.succeeded())
    }

    /// Stops every context and restarts only those in the server config.
    pub fn reset_contexts(&self) -> Result<bool> {
        let request = self
            .request(Method::PUT, &["contexts"])?
            .query(&[("reset", "reboot")]);
        Ok(self.send(request)?.succeeded())
    }

    pub fn get_jobs(&self) -> Result<Vec<JobInfo>> {
        let reply = self.send(self.request(Method::GET, &["jobs"])?)?;
        if reply.status != StatusCode::OK {
            return Err(reply.into_error());
        }
        Ok(codec::decode_jobs(&reply.body)?)
    }

    /// Starts a job. `params` must name the binary (`appName`) and the
    /// entry class (`classPath`); all entries go on the query string. `data`
    /// becomes the job input, sent as UTF-8 text.
    ///
    /// The server answers 200 for synchronous runs and 202 when the job was
    /// accepted and keeps running.
    pub fn submit_job(&self, data: Option<&str>, params: &Params) -> Result<JobInfo> {
        if params.is_empty() {
            return Err(ClientError::validation("The given params is empty"));
        }
        if !params.contains_key(keys::APP_NAME) || !params.contains_key(keys::CLASS_PATH) {
            return Err(ClientError::validation(format!(
                "The given params should contain {} and {}",
                keys::APP_NAME,
                keys::CLASS_PATH
            )));
        }

        let mut request = self
            .request(Method::POST, &["jobs"])?
            .query(&query_pairs(params));
        if let Some(data) = data {
            request = request
                .header(CONTENT_TYPE, TEXT_PLAIN_UTF8)
                .body(data.to_string());
        }

        let reply = self.send(request)?;
        match reply.status {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(codec::decode_job_info(&reply.body)?),
            _ => Err(reply.into_error()),
        }
    }

    /// Reads the job input from `data` and submits it. The reader is
    /// consumed and dropped whatever the outcome.
    ///
    /// Input is sent as UTF-8 text. Byte sequences that are not valid UTF-8
    /// are replaced with U+FFFD rather than rejected; only a failing read is
    /// an error.
    pub fn submit_job_reader<R: Read>(&self, mut data: R, params: &Params) -> Result<JobInfo> {
        let mut input = Vec::new();
        data.read_to_end(&mut input)
            .map_err(|e| ClientError::transport("Failed to read job input", e))?;
        self.submit_job(Some(&String::from_utf8_lossy(&input)), params)
    }

    pub fn submit_job_file(&self, path: impl AsRef<Path>, params: &Params) -> Result<JobInfo> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ClientError::transport(format!("Failed to open job input {}", path.display()), e)
        })?;
        self.submit_job_reader(file, params)
    }

    /// Current state of a job.
    ///
    /// A 404 is not an error: it yields a record with no status that keeps
    /// the response text and the requested id (see [`JobInfo::is_not_found`]).
    pub fn get_job_result(&self, job_id: &str) -> Result<JobInfo> {
        require(job_id, "job id")?;
        let reply = self.send(self.request(Method::GET, &["jobs", job_id])?)?;
        match reply.status {
            StatusCode::OK => {
                let mut info = codec::decode_job_info(&reply.body)?;
                info.ensure_job_id(job_id);
                Ok(info)
            }
            StatusCode::NOT_FOUND => Ok(JobInfo::from_contents(reply.body, Some(JobId::from(job_id)))),
            _ => Err(reply.into_error()),
        }
    }

    pub fn get_config(&self, job_id: &str) -> Result<JobConfig> {
        require(job_id, "job id")?;
        let reply = self.send(self.request(Method::GET, &["jobs", job_id, "config"])?)?;
        if reply.status != StatusCode::OK {
            return Err(reply.into_error());
        }
        Ok(codec::decode_job_config(&reply.body)?)
    }

    pub fn kill_job(&self, job_id: &str) -> Result<bool> {
        require(job_id, "job id")?;
        let reply = self.send(self.request(Method::DELETE, &["jobs", job_id])?)?;
        Ok(reply.succeeded())
    }

    /// Server-side paths of uploaded data files.
    pub fn get_data_files(&self) -> Result<Vec<String>> {
        let reply = self.send(self.request(Method::GET, &["data"])?)?;
        if reply.status != StatusCode::OK {
            return Err(reply.into_error());
        }
        Ok(codec::decode_data_files(&reply.body)?)
    }

    /// Uploads a data file. The server stores it under `prefix` plus a
    /// timestamp and returns the full path.
    pub fn upload_data<R: Read>(&self, mut data: R, prefix: &str) -> Result<DataFile> {
        require(prefix, "data file prefix")?;
        let mut bytes = Vec::new();
        data.read_to_end(&mut bytes)
            .map_err(|e| ClientError::transport("Failed to read data file", e))?;

        let request = self
            .request(Method::POST, &["data", prefix])?
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(bytes);
        let reply = self.send(request)?;
        if reply.status != StatusCode::OK {
            return Err(reply.into_error());
        }
        Ok(codec::decode_data_upload(&reply.body)?)
    }

    pub fn delete_data(&self, filename: &str) -> Result<bool> {
        require(filename, "data file name")?;
        let reply = self.send(self.request(Method::DELETE, &["data", filename])?)?;
        Ok(reply.succeeded())
    }
}
