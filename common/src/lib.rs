pub mod artifact;
pub mod codec;
pub mod job;
pub mod params;

pub use artifact::{BinaryType, DataFile, JarInfo};
pub use codec::{DecodeError, StatusEnvelope};
pub use job::{JobConfig, JobError, JobId, JobInfo, JobResult, JobStatus, NO_SUCH_JOB};
pub use params::{keys, params, parse_param, ContextConf, Field, Mapping, ParamValue, Params, SubmitConf};

pub const DEFAULT_URL: &str = "http://localhost:8090/";

pub const DEFAULT_CONFIG_PATH: &str = "/etc/jobserver/client.yaml";
// Relative to $HOME
pub const USER_CONFIG_PATH: &str = ".config/jobserver/client.yaml";
