//! Contracts: one expected request bound to its example responses.

use crate::config::ContractDocument;
use crate::error::ContractError;
use crate::request::{HttpMethod, RequestDescriptor, UrlPattern};
use crate::response::{ResponseCandidate, ResponsePayload, ResponseSet};
use crate::stats::{ContractId, ResponseId, UsageLedger};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A request shape and the responses it may be answered with.
///
/// Every successful [`Contract::respond`] is recorded in the shared
/// [`UsageLedger`] so coverage can be reported after a run.
#[derive(Debug)]
pub struct Contract {
    id: ContractId,
    name: Option<String>,
    request: RequestDescriptor,
    responses: ResponseSet,
    last_matched: Mutex<Option<ResponseId>>,
    ledger: Arc<UsageLedger>,
}

impl Contract {
    pub fn new(
        id: ContractId,
        name: Option<String>,
        request: RequestDescriptor,
        responses: ResponseSet,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            id,
            name,
            request,
            responses,
            last_matched: Mutex::new(None),
            ledger,
        }
    }

    /// Build a contract from a document, allocating a fresh id.
    pub fn from_document(doc: &ContractDocument, ledger: Arc<UsageLedger>) -> anyhow::Result<Self> {
        let id = ContractId::next();
        let method: HttpMethod = doc.schema.request.method.parse()?;
        let request = RequestDescriptor::new(method, doc.schema.request.path.to_url_pattern());
        let responses = ResponseSet::from_examples(id, &doc.examples);
        Ok(Self::new(id, doc.name.clone(), request, responses, ledger))
    }

    pub fn id(&self) -> ContractId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    pub fn http_method(&self) -> HttpMethod {
        self.request.method()
    }

    pub fn url_pattern(&self) -> &UrlPattern {
        self.request.url_pattern()
    }

    pub fn responses(&self) -> &ResponseSet {
        &self.responses
    }

    /// Most recently selected response, if any.
    pub fn last_matched(&self) -> Option<&ResponseCandidate> {
        let id = (*self.last_matched.lock())?;
        self.responses.get(id)
    }

    /// Pick the most specific example the request satisfies and record its use.
    pub fn respond(
        &self,
        params: &HashMap<String, String>,
        headers: &HashMap<String, String>,
    ) -> Result<&ResponsePayload, ContractError> {
        let Some(candidate) = self.responses.find_match(params, headers) else {
            debug!(
                contract_id = %self.id,
                method = %self.request.method(),
                url_pattern = %self.request.url_pattern(),
                "No example matches request"
            );
            return Err(ContractError::ResponseNotFound {
                method: self.request.method().to_string(),
                url_pattern: self.request.url_pattern().to_string(),
                params: params.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                headers: headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            });
        };

        *self.last_matched.lock() = Some(candidate.id());
        self.ledger.record_match(self.id, candidate.id());

        debug!(
            contract_id = %self.id,
            response_id = %candidate.id(),
            conditions = candidate.conditions_count(),
            "Example matched"
        );
        Ok(candidate.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocumentFormat, ResponseBody};

    fn contract(yaml: &str, ledger: &Arc<UsageLedger>) -> Contract {
        let docs = ContractDocument::parse_all(yaml, DocumentFormat::Yaml).unwrap();
        Contract::from_document(&docs[0], Arc::clone(ledger)).unwrap()
    }

    const STATUS_CONTRACT: &str = r#"
schema:
  request:
    method: GET
    path: /orders/:id
examples:
  - response:
      body: default
  - request:
      params:
        status: ok
    response:
      body: ok-case
"#;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn text(payload: &ResponsePayload) -> &str {
        match &payload.body {
            Some(ResponseBody::Text { content }) => content,
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_accessors() {
        let ledger = Arc::new(UsageLedger::new());
        let c = contract(STATUS_CONTRACT, &ledger);
        assert_eq!(c.http_method(), HttpMethod::Get);
        assert_eq!(c.url_pattern().as_str(), "/orders/:id");
        assert_eq!(c.responses().len(), 2);
        assert!(c.last_matched().is_none());
    }

    #[test]
    fn test_respond_records_usage() {
        let ledger = Arc::new(UsageLedger::new());
        let c = contract(STATUS_CONTRACT, &ledger);

        let payload = c.respond(&params(&[("status", "ok")]), &HashMap::new()).unwrap();
        assert_eq!(text(payload), "ok-case");
        assert_eq!(c.last_matched().unwrap().id(), ResponseId::new(c.id(), 1));
        assert!(ledger.is_contract_used(c.id()));

        let payload = c.respond(&params(&[("status", "fail")]), &HashMap::new()).unwrap();
        assert_eq!(text(payload), "default");
        assert_eq!(c.last_matched().unwrap().id(), ResponseId::new(c.id(), 0));

        assert_eq!(ledger.used_contracts().len(), 1);
        assert_eq!(ledger.used_responses().len(), 2);
    }

    #[test]
    fn test_response_not_found_carries_params() {
        let ledger = Arc::new(UsageLedger::new());
        let c = contract(
            r#"
schema:
  request: { method: GET, path: /orders }
examples:
  - request: { params: { status: ok } }
    response: { body: ok-case }
"#,
            &ledger,
        );

        let err = c
            .respond(&params(&[("status", "fail")]), &HashMap::new())
            .unwrap_err();
        assert_eq!(err.params().get("status").map(String::as_str), Some("fail"));
        let ContractError::ResponseNotFound { url_pattern, .. } = &err;
        assert_eq!(url_pattern, "/orders");
        assert!(err.to_string().contains("GET /orders"));

        assert!(c.last_matched().is_none());
        assert!(ledger.used_contracts().is_empty());
        assert!(ledger.used_responses().is_empty());
    }
}
