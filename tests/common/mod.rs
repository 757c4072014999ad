#![allow(dead_code)]
//! Shared integration test utilities.

use contract_stub::config::DocumentFormat;
use contract_stub::{Contract, ContractDocument, UsageLedger};
use proptest::prelude::ProptestConfig;
use std::collections::HashMap;
use std::sync::{Arc, Once};

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging once per test binary.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Property test configuration with a fixed number of cases.
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

/// Build the first contract of a YAML document against `ledger`.
pub fn contract_from_yaml(yaml: &str, ledger: &Arc<UsageLedger>) -> Contract {
    let docs = ContractDocument::parse_all(yaml, DocumentFormat::Yaml).expect("valid contract");
    Contract::from_document(&docs[0], Arc::clone(ledger)).expect("contract builds")
}

pub fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
