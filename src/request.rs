//! Request descriptors: the method and URL pattern a contract answers.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Standard HTTP verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown HTTP method: {0:?}")]
pub struct ParseMethodError(String);

impl FromStr for HttpMethod {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "HEAD" => HttpMethod::Head,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "OPTIONS" => HttpMethod::Options,
            "TRACE" => HttpMethod::Trace,
            "CONNECT" => HttpMethod::Connect,
            _ => return Err(ParseMethodError(s.to_string())),
        };
        Ok(method)
    }
}

/// URL pattern a contract is routed by.
///
/// The core only stores and exposes it; [`crate::router`] compiles it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPattern {
    Exact(String),
    Prefix(String),
    Regex(String),
    Glob(String),
    /// `/users/{id}` or `/users/:id`
    Template(String),
}

impl UrlPattern {
    /// Template if the path carries `{name}` or `:name` placeholders, exact otherwise.
    pub fn infer(path: &str) -> Self {
        let templated = path.contains('{') || path.split('/').any(|segment| segment.starts_with(':'));
        if templated {
            UrlPattern::Template(path.to_string())
        } else {
            UrlPattern::Exact(path.to_string())
        }
    }

    /// The pattern text as written.
    pub fn as_str(&self) -> &str {
        match self {
            UrlPattern::Exact(p)
            | UrlPattern::Prefix(p)
            | UrlPattern::Regex(p)
            | UrlPattern::Glob(p)
            | UrlPattern::Template(p) => p,
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected inbound request of a contract. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: HttpMethod,
    url_pattern: UrlPattern,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url_pattern: UrlPattern) -> Self {
        Self {
            method,
            url_pattern,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url_pattern(&self) -> &UrlPattern {
        &self.url_pattern
    }
}
