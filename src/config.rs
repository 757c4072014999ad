//! Contract documents and stub server settings.
//!
//! Defines the on-disk shape of contracts (JSON or YAML), the example
//! responses they declare, and the settings of the stub server.

use crate::request::{HttpMethod, UrlPattern};
use crate::router::CompiledPattern;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Top-level configuration: settings plus inline contract documents.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StubConfig {
    /// Contract documents served by the stub server
    #[serde(default)]
    pub contracts: Vec<ContractDocument>,

    /// Global settings
    #[serde(default)]
    pub settings: StubSettings,
}

impl StubConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let status = self.settings.response_not_found_status;
        if !(100..=599).contains(&status) {
            anyhow::bail!("Invalid response_not_found_status: {}", status);
        }
        for (i, contract) in self.contracts.iter().enumerate() {
            contract
                .validate()
                .map_err(|e| anyhow::anyhow!("Contract {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// A single contract document: one request shape and its examples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractDocument {
    /// Optional name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Request schema
    pub schema: SchemaDefinition,

    /// Example responses with the conditions under which they apply
    #[serde(default)]
    pub examples: Vec<ExampleDefinition>,
}

/// Serialization format of a contract file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick a format from a file extension; anything but `json` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

impl ContractDocument {
    /// Parse one or more documents from a string.
    ///
    /// A top-level list holds several documents, anything else is one.
    pub fn parse_all(content: &str, format: DocumentFormat) -> anyhow::Result<Vec<Self>> {
        let docs: Vec<Self> = match format {
            DocumentFormat::Json => match serde_json::from_str::<serde_json::Value>(content)? {
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        serde_json::from_value(item)
                            .map_err(|e| anyhow::anyhow!("Contract {}: {}", i, e))
                    })
                    .collect::<anyhow::Result<_>>()?,
                value => vec![serde_json::from_value(value)
                    .map_err(|e| anyhow::anyhow!("Contract 0: {}", e))?],
            },
            DocumentFormat::Yaml => match serde_yaml::from_str::<serde_yaml::Value>(content)? {
                serde_yaml::Value::Sequence(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        serde_yaml::from_value(item)
                            .map_err(|e| anyhow::anyhow!("Contract {}: {}", i, e))
                    })
                    .collect::<anyhow::Result<_>>()?,
                value => vec![serde_yaml::from_value(value)
                    .map_err(|e| anyhow::anyhow!("Contract 0: {}", e))?],
            },
        };
        for (i, doc) in docs.iter().enumerate() {
            doc.validate()
                .map_err(|e| anyhow::anyhow!("Contract {}: {}", i, e))?;
        }
        Ok(docs)
    }

    /// Load every document from a contract file.
    pub fn load_file(path: &Path) -> anyhow::Result<Vec<Self>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read contract file {}", path.display()))?;
        Self::parse_all(&content, DocumentFormat::from_path(path))
            .with_context(|| format!("invalid contract file {}", path.display()))
    }

    /// Load every document from a contract file without blocking the runtime.
    pub async fn load_file_async(path: &Path) -> anyhow::Result<Vec<Self>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read contract file {}", path.display()))?;
        Self::parse_all(&content, DocumentFormat::from_path(path))
            .with_context(|| format!("invalid contract file {}", path.display()))
    }

    /// Validate the document.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.schema.request.validate()?;
        if self.examples.is_empty() {
            anyhow::bail!("Contract declares no examples");
        }
        for (i, example) in self.examples.iter().enumerate() {
            example
                .validate()
                .map_err(|e| anyhow::anyhow!("Example {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// Schema section of a contract document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Expected request shape
    pub request: RequestDefinition,
}

/// Expected request: method and URL pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestDefinition {
    /// HTTP method
    #[serde(alias = "http_method")]
    pub method: String,

    /// URL pattern used to route requests to this contract
    #[serde(alias = "url", alias = "url_pattern")]
    pub path: PathDefinition,
}

impl RequestDefinition {
    /// Validate the request definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.method.parse::<HttpMethod>()?;
        CompiledPattern::compile(&self.path.to_url_pattern())?;
        Ok(())
    }
}

/// URL pattern as written in a document: a bare string or a typed matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathDefinition {
    /// `/users/{id}` or `/users/:id` is a template, anything else exact
    Plain(String),
    /// Explicitly typed matcher
    Typed(PathMatcher),
}

impl PathDefinition {
    /// Resolve into the pattern stored on the request descriptor.
    pub fn to_url_pattern(&self) -> UrlPattern {
        match self {
            PathDefinition::Plain(path) => UrlPattern::infer(path),
            PathDefinition::Typed(matcher) => match matcher {
                PathMatcher::Exact { value } => UrlPattern::Exact(value.clone()),
                PathMatcher::Prefix { value } => UrlPattern::Prefix(value.clone()),
                PathMatcher::Regex { pattern } => UrlPattern::Regex(pattern.clone()),
                PathMatcher::Glob { pattern } => UrlPattern::Glob(pattern.clone()),
                PathMatcher::Template { template } => UrlPattern::Template(template.clone()),
            },
        }
    }
}

/// Path matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathMatcher {
    /// Exact path match
    Exact { value: String },
    /// Path prefix match
    Prefix { value: String },
    /// Regex pattern match
    Regex { pattern: String },
    /// Glob pattern match
    Glob { pattern: String },
    /// Path with parameters (e.g., /users/{id})
    Template { template: String },
}

/// One example: request conditions plus the response to return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExampleDefinition {
    /// Conditions the request must satisfy
    #[serde(default)]
    pub request: ExampleConditions,

    /// Response to return
    #[serde(default)]
    pub response: ResponseDefinition,
}

impl ExampleDefinition {
    /// Validate the conditions and the response.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.request.validate()?;
        self.response.validate()
    }
}

/// Required params and headers of an example.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ExampleConditions {
    /// Required params; scalars compare by their string form
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,

    /// Required headers; names compare case-insensitively, values as params do
    #[serde(default)]
    pub headers: BTreeMap<String, serde_json::Value>,
}

impl ExampleConditions {
    /// Header names must stay distinct once case is ignored.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashMap::new();
        for name in self.headers.keys() {
            if let Some(previous) = seen.insert(name.to_ascii_lowercase(), name) {
                anyhow::bail!(
                    "Duplicate header condition: {:?} and {:?} differ only in case",
                    previous,
                    name
                );
            }
        }
        Ok(())
    }
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Response body
    #[serde(default)]
    pub body: Option<BodyDefinition>,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: HashMap::new(),
            body: None,
        }
    }
}

impl ResponseDefinition {
    /// Validate the response definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.status < 100 || self.status > 599 {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        if let Some(body) = &self.body {
            body.to_response_body().to_bytes()?;
        }
        Ok(())
    }
}

/// Body as written in a document: typed, or any raw JSON value.
///
/// An object is typed only when it has a known `type` plus `content` and
/// nothing else; any other object is a raw JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyDefinition {
    Typed(ResponseBody),
    Raw(serde_json::Value),
}

impl BodyDefinition {
    /// Resolve into a concrete body. Raw strings are text, other raw values JSON.
    pub fn to_response_body(&self) -> ResponseBody {
        match self {
            BodyDefinition::Typed(body) => body.clone(),
            BodyDefinition::Raw(serde_json::Value::String(content)) => ResponseBody::Text {
                content: content.clone(),
            },
            BodyDefinition::Raw(content) => ResponseBody::Json {
                content: content.clone(),
            },
        }
    }
}

/// Response body configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ResponseBody {
    /// Plain text body
    Text { content: String },
    /// JSON body
    Json { content: serde_json::Value },
    /// Base64 encoded binary
    Base64 { content: String },
}

impl ResponseBody {
    /// Get the body content as bytes.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        match self {
            ResponseBody::Text { content } => Ok(content.as_bytes().to_vec()),
            ResponseBody::Json { content } => Ok(serde_json::to_vec(content)?),
            ResponseBody::Base64 { content } => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .map_err(|e| anyhow::anyhow!("Invalid base64: {}", e))
            }
        }
    }

    /// Get content type for this body.
    pub fn content_type(&self) -> &'static str {
        match self {
            ResponseBody::Text { .. } => "text/plain",
            ResponseBody::Json { .. } => "application/json",
            ResponseBody::Base64 { .. } => "application/octet-stream",
        }
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StubSettings {
    /// Log every request answered from a contract
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests no contract or example could answer
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Content type used when neither the example nor its body sets one
    #[serde(default = "default_content_type")]
    pub default_content_type: String,

    /// Status returned when a contract has no example for the request
    #[serde(default = "default_not_found_status")]
    pub response_not_found_status: u16,
}

fn default_true() -> bool {
    true
}

fn default_content_type() -> String {
    "application/json".to_string()
}

fn default_not_found_status() -> u16 {
    404
}

impl Default for StubSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            default_content_type: default_content_type(),
            response_not_found_status: default_not_found_status(),
        }
    }
}
