//! Request description, validation and the service registry

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::HttpConfig;

use super::error::{FetchError, FetchResult};

/// Registry name of the Discord webhook service
pub const DISCORD: &str = "DISCORD";

/// HTTP methods accepted by the outbound client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
        }
    }

    /// Methods that must not carry a request body
    pub fn is_read_only(&self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(FetchError::UnknownMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = FetchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}

/// Static mapping from a logical service name to its base address
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, String>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry containing the services the alert sinks talk to
    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new().with_service(DISCORD, &config.discord_api_base)
    }

    pub fn with_service(mut self, name: impl Into<String>, base_url: impl AsRef<str>) -> Self {
        self.register(name, base_url);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, base_url: impl AsRef<str>) {
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();
        self.services.insert(name.into(), base_url);
    }

    pub fn base_url(&self, name: &str) -> Option<&str> {
        self.services.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// One logical call against a registered service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub service: String,
    #[serde(rename = "url")]
    pub path: String,
    pub method: Method,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl Request {
    pub fn new(service: impl Into<String>, path: impl Into<String>, method: Method) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
            method,
            headers: None,
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach any serializable value as the JSON body.
    pub fn json<T: Serialize>(self, body: &T) -> FetchResult<Self> {
        let value = serde_json::to_value(body)?;
        Ok(self.body(value))
    }

    /// Validate and normalize the request against `registry`.
    ///
    /// Nothing is sent when this fails.
    pub fn prepare(self, registry: &ServiceRegistry) -> FetchResult<PreparedRequest> {
        let Some(base_url) = registry.base_url(&self.service) else {
            return Err(FetchError::UnknownService(self.service));
        };

        let trimmed = self.path.trim();
        if trimmed.is_empty() {
            return Err(FetchError::EmptyPath);
        }

        let path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };

        let headers = match &self.headers {
            Some(headers) => to_header_map(headers)?,
            None => {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers
            }
        };

        let body = match &self.body {
            Some(_) if self.method.is_read_only() => {
                return Err(FetchError::BodyNotAllowed(self.method));
            }
            Some(body) => Some(serde_json::to_vec(body)?),
            None => None,
        };

        Ok(PreparedRequest {
            url: format!("{base_url}{path}"),
            service: self.service,
            method: self.method,
            path,
            headers,
            body,
        })
    }
}

fn to_header_map(headers: &BTreeMap<String, String>) -> FetchResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::InvalidHeader(format!("{name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// A validated request, ready to be transmitted any number of times
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub service: String,
    pub method: Method,
    /// Normalized path, always starting with `/`
    pub path: String,
    pub url: String,
    pub headers: HeaderMap,
    /// Serialized JSON body; copied into every attempt
    pub body: Option<Vec<u8>>,
}
