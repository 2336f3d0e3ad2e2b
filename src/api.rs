//! Talk to the NMS management API
//!
//! Every NMS call is a JSON `POST` of `{"object", "method", "params"}`
//! answered by `{"result", "error"}`. Transport failures are retried, an
//! `error` in an otherwise good response is not.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::thread::sleep;
use std::time::Duration;

use reqwest::Error as ReqwestError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{ConfigError, HostConfig};
use crate::known_errors::Fault;

/// The port NMV listens on unless told otherwise
pub const DEFAULT_API_PORT: u16 = 2000;

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The request never got a good HTTP response
    Connection(String),
    /// Gave up after retrying connection failures
    Unreachable { url: String, last: String },
    /// The appliance answered with an error
    Application(String),
    /// The answer was not shaped like we expected
    Decode(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ApiError::Connection(ref e) => write!(f, "{}", e),
            ApiError::Unreachable { ref url, .. } => {
                write!(f, "Unable to connect to API at {}", url)
            }
            ApiError::Application(ref e) => write!(f, "API error occured: {}", e),
            ApiError::Decode(ref e) => write!(f, "Unexpected API response: {}", e),
        }
    }
}

impl From<ReqwestError> for ApiError {
    fn from(e: ReqwestError) -> Self {
        ApiError::Connection(e.to_string())
    }
}

/// Something that can make a single NMS call
pub trait ManagementApi {
    /// Where calls go, for error messages
    fn url(&self) -> &str;

    /// Make one call, without retrying
    fn invoke(&self, object: &str, method: &str, params: &[Value]) -> Result<Value, ApiError>;
}

/// How often, and how patiently, to retry connection failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retry {
    pub attempts: u8,
    pub sleep: Duration,
}

impl Default for Retry {
    fn default() -> Retry {
        Retry {
            attempts: 2,
            sleep: Duration::from_millis(500),
        }
    }
}

/// Make a call, retrying only if the appliance couldn't be reached
pub fn invoke_with_retry<A: ManagementApi + ?Sized>(
    api: &A,
    retry: Retry,
    object: &str,
    method: &str,
    params: &[Value],
) -> Result<Value, ApiError> {
    let mut attempts = 0;
    let mut retry_sleep = retry.sleep;
    loop {
        match api.invoke(object, method, params) {
            Err(ApiError::Connection(e)) => {
                attempts += 1;
                warn!(url = api.url(), object, method, error = %e, attempts, "API call failed");
                if attempts >= retry.attempts {
                    return Err(ApiError::Unreachable {
                        url: api.url().to_owned(),
                        last: e,
                    });
                }
                sleep(retry_sleep);
                retry_sleep *= 2;
            }
            other => return other,
        }
    }
}

/// The response envelope of every call
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Value,
}

/// `null`, `""` and `{}` all mean "no error"
fn is_error(error: &Value) -> bool {
    match *error {
        Value::Null => false,
        Value::String(ref s) => !s.is_empty(),
        Value::Object(ref o) => !o.is_empty(),
        Value::Array(ref a) => !a.is_empty(),
        Value::Bool(b) => b,
        Value::Number(_) => true,
    }
}

fn describe_error(error: &Value) -> String {
    match *error {
        Value::String(ref s) => s.clone(),
        Value::Object(ref o) => match o.get("message").and_then(Value::as_str) {
            Some(message) => message.to_owned(),
            None => error.to_string(),
        },
        _ => error.to_string(),
    }
}

/// The HTTP client for one appliance
pub struct NexentaApi {
    url: String,
    user: String,
    pass: String,
    client: reqwest::blocking::Client,
}

impl NexentaApi {
    /// Build a client from the host's `api_*` options
    pub fn new(host: &HostConfig, ip: &str) -> Result<NexentaApi, ConfigError> {
        let (user, pass) = match (host.option("api_user"), host.option("api_pass")) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => (user, pass),
            _ => {
                return Err(ConfigError::Connection(format!(
                    "No connection info configured for {}",
                    host.name()
                )))
            }
        };
        let protocol = if host.is_on("api_ssl") { "https" } else { "http" };
        let port = match host.option("api_port") {
            Some(port) => port.parse::<u16>().map_err(|_| {
                ConfigError::Connection(format!(
                    "Invalid api_port '{}' configured for {}",
                    port,
                    host.name()
                ))
            })?,
            None => DEFAULT_API_PORT,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(host.is_on("api_insecure"))
            .build()
            .map_err(|e| ConfigError::Connection(format!("Unable to build API client: {}", e)))?;
        Ok(NexentaApi {
            url: format!("{}://{}:{}/rest/nms/", protocol, url_host(ip), port),
            user: user.to_owned(),
            pass: pass.to_owned(),
            client,
        })
    }
}

/// IPv6 addresses need brackets inside a URL
fn url_host(ip: &str) -> String {
    if ip.contains(':') {
        format!("[{}]", ip)
    } else {
        ip.to_owned()
    }
}

impl ManagementApi for NexentaApi {
    fn url(&self) -> &str {
        &self.url
    }

    fn invoke(&self, object: &str, method: &str, params: &[Value]) -> Result<Value, ApiError> {
        let body = json!({ "object": object, "method": method, "params": params });
        debug!(url = %self.url, object, method, "calling NMS");
        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.pass))
            .json(&body)
            .send()?
            .error_for_status()?;
        let text = response.text()?;
        let parsed: ApiResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::Decode(format!("{}: {}", e, text)))?;
        if is_error(&parsed.error) {
            return Err(ApiError::Application(describe_error(&parsed.error)));
        }
        Ok(parsed.result)
    }
}

/// Appliance memory, in megabytes
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemStat {
    #[serde(default)]
    pub ram_total: f64,
    #[serde(default)]
    pub ram_free: f64,
    #[serde(default)]
    pub ram_paging: f64,
}

/// The NMS calls the checks make, with their results decoded
pub struct Nms<'a, A: ManagementApi + ?Sized> {
    api: &'a A,
    retry: Retry,
}

impl<'a, A: ManagementApi + ?Sized> Nms<'a, A> {
    pub fn new(api: &'a A, retry: Retry) -> Nms<'a, A> {
        Nms { api, retry }
    }

    fn call<T: DeserializeOwned>(
        &self,
        object: &str,
        method: &str,
        params: &[Value],
    ) -> Result<T, ApiError> {
        let value = invoke_with_retry(self.api, self.retry, object, method, params)?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::Decode(format!("{}.{}: {}", object, method, e)))
    }

    /// Every folder on the appliance
    pub fn folder_names(&self) -> Result<Vec<String>, ApiError> {
        self.call("folder", "get_names", &[json!("")])
    }

    /// The properties of one folder, rendered as strings
    pub fn folder_props(&self, folder: &str) -> Result<HashMap<String, String>, ApiError> {
        let props: HashMap<String, Value> =
            self.call("folder", "get_child_props", &[json!(folder), json!("")])?;
        Ok(props
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                Value::Number(n) => Some((key, n.to_string())),
                _ => None,
            })
            .collect())
    }

    /// The names of every fault trigger
    pub fn trigger_names(&self) -> Result<Vec<String>, ApiError> {
        self.call(
            "reporter",
            "get_names_by_prop",
            &[json!("type"), json!("trigger"), json!("")],
        )
    }

    /// The current faults of one trigger, by fault id
    pub fn trigger_faults(&self, trigger: &str) -> Result<BTreeMap<String, Fault>, ApiError> {
        let faults: Option<BTreeMap<String, Fault>> =
            self.call("trigger", "get_faults", &[json!(trigger)])?;
        Ok(faults.unwrap_or_default())
    }

    pub fn memstat(&self) -> Result<MemStat, ApiError> {
        self.call("appliance", "get_memstat", &[json!("")])
    }
}
