//! Error types for contract matching and routing.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while serving a request from a contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractError {
    /// No example response of the contract accepts the request.
    #[error("no response of {method} {url_pattern} matches params {params:?} and headers {headers:?}")]
    ResponseNotFound {
        /// HTTP method of the contract
        method: String,
        /// URL pattern of the contract
        url_pattern: String,
        /// The params that were offered
        params: BTreeMap<String, String>,
        /// The headers that were offered
        headers: BTreeMap<String, String>,
    },
}

impl ContractError {
    /// The request params carried by the error.
    pub fn params(&self) -> &BTreeMap<String, String> {
        match self {
            ContractError::ResponseNotFound { params, .. } => params,
        }
    }
}

/// Errors raised while compiling URL patterns for routing.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid url pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
