//! Coverage of declared contracts and examples by a run.

use crate::contract::Contract;
use crate::stats::{ContractId, UsageLedger};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// An example that was never selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UncoveredExample {
    pub contract_id: ContractId,
    pub contract_name: Option<String>,
    pub method: String,
    pub url_pattern: String,
    /// Position of the example in the contract document
    pub example_index: usize,
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

/// Used versus declared contracts and examples.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub generated_at: DateTime<Utc>,
    pub contracts_total: usize,
    pub contracts_used: usize,
    pub responses_total: usize,
    pub responses_used: usize,
    /// Never-selected examples, by contract then declaration order
    pub uncovered: Vec<UncoveredExample>,
}

impl CoverageReport {
    pub fn build<'a>(
        contracts: impl IntoIterator<Item = &'a Contract>,
        ledger: &UsageLedger,
    ) -> Self {
        let used_contracts = ledger.used_contracts();
        let used_responses = ledger.used_responses();

        let mut report = Self {
            generated_at: Utc::now(),
            contracts_total: 0,
            contracts_used: 0,
            responses_total: 0,
            responses_used: 0,
            uncovered: Vec::new(),
        };

        for contract in contracts {
            report.contracts_total += 1;
            if used_contracts.contains(&contract.id()) {
                report.contracts_used += 1;
            }

            let mut missing = Vec::new();
            for candidate in contract.responses() {
                report.responses_total += 1;
                if used_responses.contains(&candidate.id()) {
                    report.responses_used += 1;
                    continue;
                }
                missing.push(UncoveredExample {
                    contract_id: contract.id(),
                    contract_name: contract.name().map(str::to_string),
                    method: contract.http_method().to_string(),
                    url_pattern: contract.url_pattern().to_string(),
                    example_index: candidate.id().index(),
                    params: candidate.param_conditions().clone(),
                    headers: candidate.header_conditions().clone(),
                });
            }
            // Response sets are in specificity order; report in document order
            missing.sort_by_key(|example| example.example_index);
            report.uncovered.extend(missing);
        }

        report
    }

    /// Share of contracts used at least once; 1.0 when none are declared.
    pub fn contract_coverage(&self) -> f64 {
        ratio(self.contracts_used, self.contracts_total)
    }

    /// Share of examples used at least once; 1.0 when none are declared.
    pub fn response_coverage(&self) -> f64 {
        ratio(self.responses_used, self.responses_total)
    }

    pub fn is_complete(&self) -> bool {
        self.uncovered.is_empty() && self.contracts_used == self.contracts_total
    }
}

fn ratio(used: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        used as f64 / total as f64
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "contracts: {}/{} used ({:.0}%), examples: {}/{} used ({:.0}%)",
            self.contracts_used,
            self.contracts_total,
            self.contract_coverage() * 100.0,
            self.responses_used,
            self.responses_total,
            self.response_coverage() * 100.0,
        )?;
        if self.uncovered.is_empty() {
            return writeln!(f, "all examples covered");
        }
        writeln!(f, "uncovered examples:")?;
        for example in &self.uncovered {
            write!(
                f,
                "  {} {} example #{}",
                example.method, example.url_pattern, example.example_index
            )?;
            if let Some(name) = &example.contract_name {
                write!(f, " ({})", name)?;
            }
            writeln!(f, " params={:?} headers={:?}", example.params, example.headers)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContractDocument, DocumentFormat};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn contracts(ledger: &Arc<UsageLedger>) -> Vec<Contract> {
        let yaml = r#"
- name: orders
  schema:
    request: { method: GET, path: /orders }
  examples:
    - response: { body: all }
    - request: { params: { status: open } }
      response: { body: open }
- schema:
    request: { method: POST, path: /orders }
  examples:
    - response: { status: 201 }
"#;
        ContractDocument::parse_all(yaml, DocumentFormat::Yaml)
            .unwrap()
            .iter()
            .map(|doc| Contract::from_document(doc, Arc::clone(ledger)).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_run() {
        let ledger = Arc::new(UsageLedger::new());
        let contracts = contracts(&ledger);
        let report = CoverageReport::build(&contracts, &ledger);

        assert_eq!(report.contracts_total, 2);
        assert_eq!(report.responses_total, 3);
        assert_eq!(report.uncovered.len(), 3);
        assert_eq!(report.contract_coverage(), 0.0);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_partial_coverage_lists_uncovered() {
        let ledger = Arc::new(UsageLedger::new());
        let contracts = contracts(&ledger);
        let params: HashMap<String, String> =
            [("status".to_string(), "open".to_string())].into_iter().collect();
        contracts[0].respond(&params, &HashMap::new()).unwrap();

        let report = CoverageReport::build(&contracts, &ledger);
        assert_eq!(report.contracts_used, 1);
        assert_eq!(report.responses_used, 1);
        assert_eq!(report.contract_coverage(), 0.5);

        let missing: Vec<_> = report
            .uncovered
            .iter()
            .map(|e| (e.method.as_str(), e.example_index))
            .collect();
        assert_eq!(missing, vec![("GET", 0), ("POST", 0)]);

        let text = report.to_string();
        assert!(text.contains("contracts: 1/2 used (50%)"));
        assert!(text.contains("GET /orders example #0 (orders)"));
    }

    #[test]
    fn test_complete_coverage() {
        let ledger = Arc::new(UsageLedger::new());
        let contracts = contracts(&ledger);
        let none = HashMap::new();
        let open: HashMap<String, String> =
            [("status".to_string(), "open".to_string())].into_iter().collect();
        contracts[0].respond(&none, &none).unwrap();
        contracts[0].respond(&open, &none).unwrap();
        contracts[1].respond(&none, &none).unwrap();

        let report = CoverageReport::build(&contracts, &ledger);
        assert!(report.is_complete());
        assert_eq!(report.response_coverage(), 1.0);
        assert!(report.to_string().contains("all examples covered"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["responses_used"], 3);
    }

    #[test]
    fn test_nothing_declared_is_complete() {
        let ledger = UsageLedger::new();
        let report = CoverageReport::build(std::iter::empty::<&Contract>(), &ledger);
        assert_eq!(report.contract_coverage(), 1.0);
        assert!(report.is_complete());
    }
}
