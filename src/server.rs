//! Stub server: answers requests from contract examples.
//!
//! Transport-agnostic: a hosting HTTP server converts its requests into
//! [`StubRequest`] values and writes back the returned [`StubResponse`].

use crate::config::{StubConfig, StubSettings};
use crate::contract::Contract;
use crate::error::{ContractError, RouterError};
use crate::report::CoverageReport;
use crate::response::{condition_value, ResponsePayload};
use crate::router::{parse_query_string, ContractRouter};
use crate::stats::UsageLedger;
use async_trait::async_trait;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An incoming request as handed over by the hosting server.
#[derive(Debug, Clone, Default)]
pub struct StubRequest {
    pub method: String,
    pub path: String,
    pub query_string: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl StubRequest {
    /// Build from a method and a request target; anything after `?` is the query.
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query_string) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method: method.into(),
            path,
            query_string,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON body with a matching content type.
    pub fn with_json(self, body: &serde_json::Value) -> Self {
        self.with_header("Content-Type", "application/json")
            .with_body(body.to_string())
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The response to hand back to the hosting server.
#[derive(Debug, Clone, PartialEq)]
pub struct StubResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl StubResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    fn json_error(status: u16, body: serde_json::Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status,
            headers,
            body: body.to_string().into_bytes(),
        }
    }
}

/// Seam between a hosting HTTP server and the stub logic.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn on_request(&self, request: &StubRequest) -> StubResponse;
}

/// Serves requests from a set of contracts and tracks their usage.
pub struct StubServer {
    router: ContractRouter,
    ledger: Arc<UsageLedger>,
    settings: StubSettings,
    /// Total requests processed.
    requests_total: AtomicU64,
    /// Requests answered from an example.
    requests_matched: AtomicU64,
    /// Requests without a contract or without a matching example.
    requests_unmatched: AtomicU64,
}

impl StubServer {
    /// Validate the configuration and build its contracts, sharing a fresh ledger.
    pub fn new(config: StubConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let ledger = Arc::new(UsageLedger::new());
        let contracts = config
            .contracts
            .iter()
            .map(|doc| Contract::from_document(doc, Arc::clone(&ledger)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::with_contracts(contracts, ledger, config.settings)?)
    }

    /// Serve prebuilt contracts. They should record into `ledger` for
    /// [`StubServer::coverage`] to see their use.
    pub fn with_contracts(
        contracts: Vec<Contract>,
        ledger: Arc<UsageLedger>,
        settings: StubSettings,
    ) -> Result<Self, RouterError> {
        let router = ContractRouter::new(contracts)?;
        info!(
            contracts = router.len(),
            examples = router.contracts().map(|c| c.responses().len()).sum::<usize>(),
            "Stub server initialized"
        );
        Ok(Self {
            router,
            ledger,
            settings,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        })
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: StubConfig = serde_yaml::from_str(yaml)?;
        Self::new(config)
    }

    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.router.contracts()
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    pub fn settings(&self) -> &StubSettings {
        &self.settings
    }

    /// Get total requests processed.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests matched.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests unmatched.
    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }

    /// Coverage of the served contracts so far.
    pub fn coverage(&self) -> CoverageReport {
        CoverageReport::build(self.router.contracts(), &self.ledger)
    }

    /// Route, match and build the response for one request.
    pub fn handle(&self, request: &StubRequest) -> StubResponse {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let Some(route) = self.router.route(&request.method, &request.path) else {
            self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
            if self.settings.log_unmatched {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    "No contract matches request"
                );
            }
            return StubResponse::json_error(
                404,
                serde_json::json!({
                    "error": "no_contract",
                    "message": "No contract matches request",
                    "method": request.method,
                    "path": request.path,
                }),
            );
        };

        let params = collect_params(request, route.path_params);
        match route.contract.respond(&params, &request.headers) {
            Ok(payload) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_matches {
                    info!(
                        contract_id = %route.contract.id(),
                        method = %request.method,
                        path = %request.path,
                        "Request matched contract"
                    );
                }
                self.build_response(payload)
            }
            Err(err) => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_unmatched {
                    warn!(
                        contract_id = %route.contract.id(),
                        path = %request.path,
                        error = %err,
                        "No example matches request"
                    );
                }
                self.response_not_found(&err)
            }
        }
    }

    fn build_response(&self, payload: &ResponsePayload) -> StubResponse {
        let body = match payload.body.as_ref().map(|b| b.to_bytes()).transpose() {
            Ok(body) => body.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to encode example body");
                return StubResponse::json_error(
                    500,
                    serde_json::json!({ "error": "invalid_body", "message": e.to_string() }),
                );
            }
        };

        let content_type = payload
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| {
                payload
                    .body
                    .as_ref()
                    .map(|b| b.content_type().to_string())
                    .unwrap_or_else(|| self.settings.default_content_type.clone())
            });

        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), content_type);
        for (name, value) in &payload.headers {
            if !name.eq_ignore_ascii_case("content-type") {
                headers.insert(name.clone(), value.clone());
            }
        }

        StubResponse {
            status: payload.status,
            headers,
            body,
        }
    }

    fn response_not_found(&self, err: &ContractError) -> StubResponse {
        let ContractError::ResponseNotFound {
            method,
            url_pattern,
            params,
            headers,
        } = err;
        StubResponse::json_error(
            self.settings.response_not_found_status,
            serde_json::json!({
                "error": "response_not_found",
                "message": err.to_string(),
                "method": method,
                "url_pattern": url_pattern,
                "params": params,
                "headers": headers,
            }),
        )
    }
}

/// Collapse query, body and path parameters into one map; later sources win.
fn collect_params(request: &StubRequest, path_params: HashMap<String, String>) -> HashMap<String, String> {
    let mut params = parse_query_string(request.query_string.as_deref().unwrap_or(""));
    params.extend(body_params(request));
    params.extend(path_params);
    params
}

/// Top-level fields of a JSON object body, or the fields of a form body.
fn body_params(request: &StubRequest) -> HashMap<String, String> {
    let Some(body) = request.body.as_deref().filter(|b| !b.is_empty()) else {
        return HashMap::new();
    };

    let is_form = request
        .header("content-type")
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        return std::str::from_utf8(body)
            .map(parse_query_string)
            .unwrap_or_default();
    }

    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(fields)) => fields
            .iter()
            .map(|(k, v)| (k.clone(), condition_value(v)))
            .collect(),
        _ => {
            debug!("Request body is not a JSON object, ignoring it for matching");
            HashMap::new()
        }
    }
}

#[async_trait]
impl RequestHandler for StubServer {
    async fn on_request(&self, request: &StubRequest) -> StubResponse {
        self.handle(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_server() -> StubServer {
        let yaml = r#"
contracts:
  - name: user by id
    schema:
      request:
        method: GET
        path: /users/:id
    examples:
      - request:
          params: { id: 1 }
        response:
          body: { id: 1, first_name: Max }
      - request:
          params: { id: 2 }
          headers: { Accept-Language: de }
        response:
          body: { id: 2, first_name: Maximilian }
      - request:
          params: { id: 2 }
        response:
          body: { id: 2, first_name: Maxwell }

  - name: search
    schema:
      request:
        method: GET
        path: /search
    examples:
      - request:
          params: { q: rust }
        response:
          headers: { X-Total: "1" }
          body: found

  - name: create user
    schema:
      request:
        method: POST
        path: /users
    examples:
      - request:
          params: { first_name: Max }
        response:
          status: 201
          headers: { Content-Type: application/vnd.user+json }
          body: { id: 3 }
      - response:
          status: 422

  - name: avatar
    schema:
      request:
        method: GET
        path: /avatar
    examples:
      - response:
          body:
            type: base64
            content: iVBORw0K

settings:
  log_matches: true
"#;
        StubServer::from_yaml(yaml).unwrap()
    }

    #[tokio::test]
    async fn test_path_param_match() {
        let server = test_server();
        let response = server.on_request(&StubRequest::new("GET", "/users/1")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.json().unwrap()["first_name"], "Max");
    }

    #[tokio::test]
    async fn test_header_condition_is_more_specific() {
        let server = test_server();

        let request = StubRequest::new("GET", "/users/2").with_header("accept-language", "de");
        let response = server.on_request(&request).await;
        assert_eq!(response.json().unwrap()["first_name"], "Maximilian");

        let response = server.on_request(&StubRequest::new("GET", "/users/2")).await;
        assert_eq!(response.json().unwrap()["first_name"], "Maxwell");
    }

    #[tokio::test]
    async fn test_query_param_match() {
        let server = test_server();
        let response = server
            .on_request(&StubRequest::new("GET", "/search?q=rust&page=1"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body_text(), "found");
        assert_eq!(response.header("X-Total"), Some("1"));
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_json_body_params() {
        let server = test_server();
        let request =
            StubRequest::new("POST", "/users").with_json(&serde_json::json!({"first_name": "Max"}));
        let response = server.on_request(&request).await;
        assert_eq!(response.status, 201);
        assert_eq!(
            response.header("content-type"),
            Some("application/vnd.user+json")
        );

        let request =
            StubRequest::new("POST", "/users").with_json(&serde_json::json!({"first_name": "Bob"}));
        assert_eq!(server.on_request(&request).await.status, 422);
    }

    #[tokio::test]
    async fn test_form_body_params() {
        let server = test_server();
        let request = StubRequest::new("POST", "/users")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("first_name=Max&last_name=Power");
        assert_eq!(server.on_request(&request).await.status, 201);
    }

    #[tokio::test]
    async fn test_binary_body() {
        let server = test_server();
        let response = server.on_request(&StubRequest::new("GET", "/avatar")).await;
        assert_eq!(response.body, vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a]);
        assert_eq!(
            response.header("content-type"),
            Some("application/octet-stream")
        );
    }

    #[tokio::test]
    async fn test_no_contract() {
        let server = test_server();
        let response = server.on_request(&StubRequest::new("GET", "/nonexistent")).await;
        assert_eq!(response.status, 404);
        assert_eq!(response.json().unwrap()["error"], "no_contract");
    }

    #[tokio::test]
    async fn test_response_not_found() {
        let server = test_server();
        let response = server.on_request(&StubRequest::new("GET", "/users/3")).await;
        assert_eq!(response.status, 404);

        let json = response.json().unwrap();
        assert_eq!(json["error"], "response_not_found");
        assert_eq!(json["params"]["id"], "3");
        assert_eq!(json["url_pattern"], "/users/:id");
    }

    #[tokio::test]
    async fn test_response_not_found_status_setting() {
        let mut config: StubConfig = serde_yaml::from_str(
            r#"
contracts:
  - schema:
      request: { method: GET, path: /strict }
    examples:
      - request: { params: { token: abc } }
        response: { body: ok }
"#,
        )
        .unwrap();
        config.settings.response_not_found_status = 500;
        let server = StubServer::new(config).unwrap();

        let response = server.on_request(&StubRequest::new("GET", "/strict")).await;
        assert_eq!(response.status, 500);
    }

    #[test]
    fn test_new_validates_config() {
        let config: StubConfig = serde_yaml::from_str(
            r#"
contracts:
  - schema:
      request: { method: GET, path: /broken }
    examples:
      - response: { status: 0 }
"#,
        )
        .unwrap();
        let err = StubServer::new(config).err().unwrap();
        assert!(err.to_string().contains("Invalid status code: 0"), "{}", err);

        let mut config = StubConfig::default();
        config.settings.response_not_found_status = 7;
        assert!(StubServer::new(config).is_err());
    }

    #[tokio::test]
    async fn test_request_counters() {
        let server = test_server();
        assert_eq!(server.total_requests(), 0);

        server.on_request(&StubRequest::new("GET", "/users/1")).await;
        server.on_request(&StubRequest::new("GET", "/users/9")).await;
        server.on_request(&StubRequest::new("GET", "/nope")).await;

        assert_eq!(server.total_requests(), 3);
        assert_eq!(server.total_matched(), 1);
        assert_eq!(server.total_unmatched(), 2);
    }

    #[tokio::test]
    async fn test_coverage_after_requests() {
        let server = test_server();
        server.on_request(&StubRequest::new("GET", "/users/1")).await;
        server.on_request(&StubRequest::new("GET", "/users/1")).await;

        let report = server.coverage();
        assert_eq!(report.contracts_total, 4);
        assert_eq!(report.contracts_used, 1);
        assert_eq!(report.responses_total, 7);
        assert_eq!(report.responses_used, 1);
        assert_eq!(server.ledger().used_responses().len(), 1);
    }

    #[test]
    fn test_stub_request_target_parsing() {
        let request = StubRequest::new("GET", "/search?q=a%20b");
        assert_eq!(request.path, "/search");
        assert_eq!(request.query_string.as_deref(), Some("q=a%20b"));

        let request = StubRequest::new("GET", "/plain");
        assert!(request.query_string.is_none());
    }
}
