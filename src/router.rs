//! Request routing.
//!
//! Routes an incoming method and path to the contract whose URL pattern
//! accepts it, and extracts path parameters along the way.

use crate::contract::Contract;
use crate::error::RouterError;
use crate::request::UrlPattern;
use regex::Regex;
use std::collections::HashMap;

/// Result of routing a request.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// The contract owning the route
    pub contract: &'a Contract,
    /// Parameters extracted from template placeholders or named captures
    pub path_params: HashMap<String, String>,
}

/// A URL pattern compiled for matching.
#[derive(Debug)]
pub enum CompiledPattern {
    Exact(String),
    Prefix(String),
    Regex(Regex),
    Glob(globset::GlobMatcher),
    Template(PathTemplate),
}

impl CompiledPattern {
    pub fn compile(pattern: &UrlPattern) -> Result<Self, RouterError> {
        let invalid = |reason: String| RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };
        let compiled = match pattern {
            UrlPattern::Exact(value) => CompiledPattern::Exact(value.clone()),
            UrlPattern::Prefix(value) => CompiledPattern::Prefix(value.clone()),
            UrlPattern::Regex(pattern) => {
                CompiledPattern::Regex(Regex::new(pattern).map_err(|e| invalid(e.to_string()))?)
            }
            UrlPattern::Glob(pattern) => {
                let glob = globset::Glob::new(pattern).map_err(|e| invalid(e.to_string()))?;
                CompiledPattern::Glob(glob.compile_matcher())
            }
            UrlPattern::Template(template) => {
                CompiledPattern::Template(PathTemplate::parse(template).map_err(invalid)?)
            }
        };
        Ok(compiled)
    }

    /// Match a path, returning extracted parameters on success.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        match self {
            CompiledPattern::Exact(value) => (path == value).then(HashMap::new),
            CompiledPattern::Prefix(value) => path.starts_with(value.as_str()).then(HashMap::new),
            CompiledPattern::Regex(regex) => {
                let captures = regex.captures(path)?;
                let mut params = HashMap::new();
                for name in regex.capture_names().flatten() {
                    if let Some(m) = captures.name(name) {
                        params.insert(name.to_string(), m.as_str().to_string());
                    }
                }
                Some(params)
            }
            CompiledPattern::Glob(glob) => glob.is_match(path).then(HashMap::new),
            CompiledPattern::Template(template) => template.matches(path),
        }
    }
}

/// Path template with `{name}` or `:name` placeholders.
#[derive(Debug)]
pub struct PathTemplate {
    segments: Vec<TemplateSegment>,
}

#[derive(Debug)]
enum TemplateSegment {
    Literal(String),
    Param(String),
}

impl PathTemplate {
    fn parse(template: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            let colon_param =
                ch == ':' && (current.ends_with('/') || (current.is_empty() && segments.is_empty()));
            if ch == '{' || colon_param {
                if !current.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut current)));
                }
                let mut name = String::new();
                if ch == '{' {
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err("unclosed '{' in template".to_string()),
                        }
                    }
                } else {
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                if name.is_empty() {
                    return Err("empty parameter name in template".to_string());
                }
                if matches!(segments.last(), Some(TemplateSegment::Param(_))) {
                    return Err("adjacent parameters in template".to_string());
                }
                segments.push(TemplateSegment::Param(name));
            } else {
                current.push(ch);
            }
        }

        if !current.is_empty() {
            segments.push(TemplateSegment::Literal(current));
        }

        Ok(Self { segments })
    }

    fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let mut remaining = path;

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                TemplateSegment::Literal(lit) => {
                    remaining = remaining.strip_prefix(lit.as_str())?;
                }
                TemplateSegment::Param(name) => {
                    // A parameter never spans a '/', and stops at the next literal
                    let segment_end = remaining.find('/').unwrap_or(remaining.len());
                    let end_pos = match self.segments.get(i + 1) {
                        Some(TemplateSegment::Literal(next_lit)) => {
                            remaining[..segment_end]
                                .find(next_lit.as_str())
                                .unwrap_or(segment_end)
                        }
                        _ => segment_end,
                    };

                    if end_pos == 0 {
                        return None;
                    }

                    params.insert(name.clone(), remaining[..end_pos].to_string());
                    remaining = &remaining[end_pos..];
                }
            }
        }

        // Must consume entire path
        remaining.is_empty().then_some(params)
    }
}

struct Route {
    contract: Contract,
    pattern: CompiledPattern,
}

/// Routes requests to contracts in declaration order.
pub struct ContractRouter {
    routes: Vec<Route>,
}

impl ContractRouter {
    /// Compile every contract's URL pattern.
    pub fn new(contracts: Vec<Contract>) -> Result<Self, RouterError> {
        let routes = contracts
            .into_iter()
            .map(|contract| -> Result<Route, RouterError> {
                let pattern = CompiledPattern::compile(contract.url_pattern())?;
                Ok(Route { contract, pattern })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { routes })
    }

    /// Find the first contract accepting the method and path.
    pub fn route(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().find_map(|route| {
            if !route
                .contract
                .http_method()
                .as_str()
                .eq_ignore_ascii_case(method)
            {
                return None;
            }
            route.pattern.matches(path).map(|path_params| RouteMatch {
                contract: &route.contract,
                path_params,
            })
        })
    }

    /// Routed contracts in declaration order.
    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.routes.iter().map(|route| &route.contract)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Parse a query string (or form body) into key-value pairs.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        if let Some((key, value)) = part.split_once('=') {
            params.insert(urlencoding_decode(key), urlencoding_decode(value));
        } else {
            params.insert(urlencoding_decode(part), String::new());
        }
    }

    params
}

/// Percent-decoding with `+` as space; invalid escapes are kept literally.
fn urlencoding_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let escaped = bytes
                    .get(i + 1..i + 3)
                    .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match escaped {
                    Some(byte) => {
                        decoded.push(byte);
                        i += 3;
                    }
                    _ => {
                        decoded.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            b => {
                decoded.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&decoded).into_owned()
}
