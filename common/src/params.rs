//! Flattening of typed configuration into the key/value parameters the job
//! server takes on its query string.
//!
//! Each configuration type lists its fields in a static table. A field is
//! sent under its own name unless the table gives it a wire name, which is
//! how e.g. `driverPath` ends up as `spark.yarn.jars`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter names the job server understands directly.
pub mod keys {
    pub const APP_NAME: &str = "appName";
    pub const CLASS_PATH: &str = "classPath";
    pub const CONTEXT: &str = "context";
    pub const SYNC: &str = "sync";
    pub const TIMEOUT: &str = "timeout";
    pub const NUM_CPU_CORES: &str = "num-cpu-cores";
    pub const MEMORY_PER_NODE: &str = "memory-per-node";
    pub const CONTEXT_FACTORY: &str = "context-factory";
    pub const YARN_JARS: &str = "spark.yarn.jars";
    pub const EXECUTOR_LIBRARY_PATH: &str = "spark.executor.extraLibraryPath";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            ParamValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}

impl From<i32> for ParamValue {
    fn from(n: i32) -> Self {
        ParamValue::Int(n.into())
    }
}

impl From<u32> for ParamValue {
    fn from(n: u32) -> Self {
        ParamValue::Int(n.into())
    }
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        ParamValue::Float(x)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

/// Wire name to value. Ordered so encoded query strings are stable.
pub type Params = BTreeMap<String, ParamValue>;

/// Builds a [`Params`] from `(key, value)` pairs.
pub fn params<K, V, I>(pairs: I) -> Params
where
    K: Into<String>,
    V: Into<ParamValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Parses `key=value` as given on a command line.
pub fn parse_param(s: &str) -> Option<(String, ParamValue)> {
    let (key, value) = s.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), ParamValue::Str(value.trim().to_string())))
}

/// One row of a configuration type's field table.
pub struct Field<T: 'static> {
    pub name: &'static str,
    pub wire: Option<&'static str>,
    pub get: fn(&T) -> Option<ParamValue>,
    /// Returns `false` when the value cannot be coerced to the field type.
    pub set: fn(&mut T, &ParamValue) -> bool,
}

impl<T: 'static> Field<T> {
    pub fn wire_name(&self) -> &'static str {
        self.wire.unwrap_or(self.name)
    }
}

pub trait Mapping: Default + Sized + 'static {
    const FIELDS: &'static [Field<Self>];

    /// Every present field under its wire name. Absent fields are omitted.
    fn to_params(&self) -> Params {
        let mut out = Params::new();
        for field in Self::FIELDS {
            if let Some(value) = (field.get)(self) {
                out.insert(field.wire_name().to_string(), value);
            }
        }
        out
    }

    /// Reads known wire names back into a value. Entries that do not fit
    /// their field are skipped with a warning.
    fn from_params(params: &Params) -> Self {
        let mut conf = Self::default();
        for field in Self::FIELDS {
            if let Some(value) = params.get(field.wire_name()) {
                if !(field.set)(&mut conf, value) {
                    log::warn!(
                        "Skipping parameter {} ({}): cannot use value {:?}",
                        field.wire_name(),
                        field.name,
                        value
                    );
                }
            }
        }
        conf
    }
}

fn set_string(slot: &mut Option<String>, value: &ParamValue) -> bool {
    *slot = Some(value.to_string());
    true
}

fn set_i64(slot: &mut i64, value: &ParamValue) -> bool {
    match value.as_i64() {
        Some(n) => {
            *slot = n;
            true
        }
        None => false,
    }
}

fn set_bool(slot: &mut bool, value: &ParamValue) -> bool {
    match value.as_bool() {
        Some(b) => {
            *slot = b;
            true
        }
        None => false,
    }
}

fn get_string(slot: &Option<String>) -> Option<ParamValue> {
    slot.clone().map(ParamValue::Str)
}

pub const DEFAULT_SUBMIT_TIMEOUT: i64 = 500_000;

/// Parameters for `POST /jobs`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitConf {
    pub app_name: Option<String>,
    pub class_path: Option<String>,
    pub context: Option<String>,
    pub sync: bool,
    pub timeout: i64,
    pub context_factory: Option<String>,
    pub driver_path: Option<String>,
    pub executor_path: Option<String>,
}

impl Default for SubmitConf {
    fn default() -> Self {
        Self {
            app_name: None,
            class_path: None,
            context: None,
            sync: false,
            timeout: DEFAULT_SUBMIT_TIMEOUT,
            context_factory: None,
            driver_path: None,
            executor_path: None,
        }
    }
}

impl Mapping for SubmitConf {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: keys::APP_NAME,
            wire: None,
            get: |c| get_string(&c.app_name),
            set: |c, v| set_string(&mut c.app_name, v),
        },
        Field {
            name: keys::CLASS_PATH,
            wire: None,
            get: |c| get_string(&c.class_path),
            set: |c, v| set_string(&mut c.class_path, v),
        },
        Field {
            name: keys::CONTEXT,
            wire: None,
            get: |c| get_string(&c.context),
            set: |c, v| set_string(&mut c.context, v),
        },
        Field {
            name: keys::SYNC,
            wire: None,
            get: |c| Some(ParamValue::Bool(c.sync)),
            set: |c, v| set_bool(&mut c.sync, v),
        },
        Field {
            name: keys::TIMEOUT,
            wire: None,
            get: |c| Some(ParamValue::Int(c.timeout)),
            set: |c, v| set_i64(&mut c.timeout, v),
        },
        Field {
            name: "contextFactory",
            wire: Some(keys::CONTEXT_FACTORY),
            get: |c| get_string(&c.context_factory),
            set: |c, v| set_string(&mut c.context_factory, v),
        },
        Field {
            name: "driverPath",
            wire: Some(keys::YARN_JARS),
            get: |c| get_string(&c.driver_path),
            set: |c, v| set_string(&mut c.driver_path, v),
        },
        Field {
            name: "executorPath",
            wire: Some(keys::EXECUTOR_LIBRARY_PATH),
            get: |c| get_string(&c.executor_path),
            set: |c, v| set_string(&mut c.executor_path, v),
        },
    ];
}

impl SubmitConf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn class_path(mut self, class_path: impl Into<String>) -> Self {
        self.class_path = Some(class_path.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn timeout(mut self, timeout: i64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn context_factory(mut self, factory: impl Into<String>) -> Self {
        self.context_factory = Some(factory.into());
        self
    }

    pub fn driver_path(mut self, path: impl Into<String>) -> Self {
        self.driver_path = Some(path.into());
        self
    }

    pub fn executor_path(mut self, path: impl Into<String>) -> Self {
        self.executor_path = Some(path.into());
        self
    }
}

/// Parameters for `POST /contexts/{name}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextConf {
    pub num_cpu_cores: Option<i64>,
    pub memory_per_node: Option<String>,
    pub context_factory: Option<String>,
    pub driver_path: Option<String>,
}

impl Mapping for ContextConf {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "numCpuCores",
            wire: Some(keys::NUM_CPU_CORES),
            get: |c| c.num_cpu_cores.map(ParamValue::Int),
            set: |c, v| match v.as_i64() {
                Some(n) => {
                    c.num_cpu_cores = Some(n);
                    true
                }
                None => false,
            },
        },
        Field {
            name: "memoryPerNode",
            wire: Some(keys::MEMORY_PER_NODE),
            get: |c| get_string(&c.memory_per_node),
            set: |c, v| set_string(&mut c.memory_per_node, v),
        },
        Field {
            name: "contextFactory",
            wire: Some(keys::CONTEXT_FACTORY),
            get: |c| get_string(&c.context_factory),
            set: |c, v| set_string(&mut c.context_factory, v),
        },
        Field {
            name: "driverPath",
            wire: Some(keys::YARN_JARS),
            get: |c| get_string(&c.driver_path),
            set: |c, v| set_string(&mut c.driver_path, v),
        },
    ];
}

impl ContextConf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_cpu_cores(mut self, cores: i64) -> Self {
        self.num_cpu_cores = Some(cores);
        self
    }

    pub fn memory_per_node(mut self, memory: impl Into<String>) -> Self {
        self.memory_per_node = Some(memory.into());
        self
    }

    pub fn context_factory(mut self, factory: impl Into<String>) -> Self {
        self.context_factory = Some(factory.into());
        self
    }

    pub fn driver_path(mut self, path: impl Into<String>) -> Self {
        self.driver_path = Some(path.into());
        self
    }
}
