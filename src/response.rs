//! Example responses and specificity-ordered matching.
//!
//! Each example declares the params and headers a request must carry for it
//! to apply. A [`ResponseSet`] keeps its examples sorted by how many
//! conditions they declare, most first, so the most specific applicable
//! example always wins and a condition-free example acts as the fallback.

use crate::config::{ExampleDefinition, ResponseBody};
use crate::stats::{ContractId, ResponseId};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// String form of a document value, used for both conditions and request params.
///
/// Strings are taken verbatim, `null` is empty and everything else is its JSON text.
pub fn condition_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_conditions(conditions: &BTreeMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    conditions
        .iter()
        .map(|(name, value)| (name.clone(), condition_value(value)))
        .collect()
}

/// What to send back when an example is selected.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePayload {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<ResponseBody>,
}

impl ResponsePayload {
    /// A body-less payload with the given status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Shorthand for a plain text body.
    pub fn text(status: u16, content: impl Into<String>) -> Self {
        Self::status(status).with_body(ResponseBody::Text {
            content: content.into(),
        })
    }
}

/// One example response and the conditions under which it applies.
#[derive(Debug, Clone)]
pub struct ResponseCandidate {
    id: ResponseId,
    param_conditions: BTreeMap<String, String>,
    header_conditions: BTreeMap<String, String>,
    payload: ResponsePayload,
}

impl ResponseCandidate {
    /// Header condition names are stored lower-cased.
    pub fn new(
        id: ResponseId,
        param_conditions: BTreeMap<String, String>,
        header_conditions: BTreeMap<String, String>,
        payload: ResponsePayload,
    ) -> Self {
        let header_conditions = header_conditions
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        Self {
            id,
            param_conditions,
            header_conditions,
            payload,
        }
    }

    pub fn from_example(id: ResponseId, example: &ExampleDefinition) -> Self {
        let params = string_conditions(&example.request.params);
        let headers = string_conditions(&example.request.headers);
        let response = &example.response;
        let payload = ResponsePayload {
            status: response.status,
            headers: response
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            body: response.body.as_ref().map(|b| b.to_response_body()),
        };
        Self::new(id, params, headers, payload)
    }

    pub fn id(&self) -> ResponseId {
        self.id
    }

    pub fn param_conditions(&self) -> &BTreeMap<String, String> {
        &self.param_conditions
    }

    pub fn header_conditions(&self) -> &BTreeMap<String, String> {
        &self.header_conditions
    }

    pub fn payload(&self) -> &ResponsePayload {
        &self.payload
    }

    /// Specificity: number of declared conditions.
    pub fn conditions_count(&self) -> usize {
        self.param_conditions.len() + self.header_conditions.len()
    }

    /// Every declared param is present with an equal value.
    pub fn params_match(&self, params: &HashMap<String, String>) -> bool {
        self.param_conditions
            .iter()
            .all(|(name, expected)| params.get(name) == Some(expected))
    }

    /// Every declared header is present with an equal value; names ignore case.
    pub fn headers_match(&self, headers: &HashMap<String, String>) -> bool {
        self.header_conditions.iter().all(|(name, expected)| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .is_some_and(|(_, v)| v == expected)
        })
    }

    pub fn matches(&self, params: &HashMap<String, String>, headers: &HashMap<String, String>) -> bool {
        self.params_match(params) && self.headers_match(headers)
    }
}

/// Example responses of a contract, most specific first.
#[derive(Debug, Clone, Default)]
pub struct ResponseSet {
    candidates: Vec<ResponseCandidate>,
}

impl ResponseSet {
    /// Sort once by descending specificity; equal counts keep their given order.
    pub fn new(mut candidates: Vec<ResponseCandidate>) -> Self {
        candidates.sort_by_key(|c| Reverse(c.conditions_count()));
        Self { candidates }
    }

    /// Build from document examples; ids follow declaration order.
    pub fn from_examples(contract: ContractId, examples: &[ExampleDefinition]) -> Self {
        let candidates = examples
            .iter()
            .enumerate()
            .map(|(index, example)| {
                ResponseCandidate::from_example(ResponseId::new(contract, index), example)
            })
            .collect();
        Self::new(candidates)
    }

    /// First candidate, in specificity order, whose conditions the request satisfies.
    pub fn find_match(
        &self,
        params: &HashMap<String, String>,
        headers: &HashMap<String, String>,
    ) -> Option<&ResponseCandidate> {
        self.candidates
            .iter()
            .find(|candidate| candidate.matches(params, headers))
    }

    pub fn get(&self, id: ResponseId) -> Option<&ResponseCandidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    /// Candidates in matching order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResponseCandidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResponseSet {
    type Item = &'a ResponseCandidate;
    type IntoIter = std::slice::Iter<'a, ResponseCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
