//! Usage ledger: which contracts and responses were selected during a run.
//!
//! The ledger is shared by every contract of a server run through an `Arc`.
//! It only ever grows; coverage is computed by comparing it against the
//! declared contracts (see [`crate::report`]).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a contract, assigned at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractId(u64);

static NEXT_CONTRACT_ID: AtomicU64 = AtomicU64::new(1);

impl ContractId {
    /// Allocate a fresh, process-unique id.
    pub fn next() -> Self {
        ContractId(NEXT_CONTRACT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contract#{}", self.0)
    }
}

/// Identity of a response candidate: its contract and declaration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResponseId {
    contract: ContractId,
    index: usize,
}

impl ResponseId {
    pub fn new(contract: ContractId, index: usize) -> Self {
        Self { contract, index }
    }

    pub fn contract(&self) -> ContractId {
        self.contract
    }

    /// Position of the example in the contract document.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/example#{}", self.contract, self.index)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    contracts: BTreeSet<ContractId>,
    responses: BTreeSet<ResponseId>,
    hits: HashMap<ResponseId, u64>,
}

/// Insert-only record of used contracts and responses.
#[derive(Debug, Default)]
pub struct UsageLedger {
    state: Mutex<LedgerState>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a contract as used. Returns `true` on first use.
    pub fn record_contract_use(&self, id: ContractId) -> bool {
        self.state.lock().contracts.insert(id)
    }

    /// Record a response as used. Returns `true` on first use.
    pub fn record_response_use(&self, id: ResponseId) -> bool {
        let mut state = self.state.lock();
        *state.hits.entry(id).or_insert(0) += 1;
        state.responses.insert(id)
    }

    /// Record a contract and the response it selected under one lock.
    pub fn record_match(&self, contract: ContractId, response: ResponseId) {
        let mut state = self.state.lock();
        state.contracts.insert(contract);
        state.responses.insert(response);
        *state.hits.entry(response).or_insert(0) += 1;
    }

    /// Snapshot of the contracts used so far.
    pub fn used_contracts(&self) -> BTreeSet<ContractId> {
        self.state.lock().contracts.clone()
    }

    /// Snapshot of the responses used so far.
    pub fn used_responses(&self) -> BTreeSet<ResponseId> {
        self.state.lock().responses.clone()
    }

    pub fn is_contract_used(&self, id: ContractId) -> bool {
        self.state.lock().contracts.contains(&id)
    }

    pub fn is_response_used(&self, id: ResponseId) -> bool {
        self.state.lock().responses.contains(&id)
    }

    /// How many times a response was selected.
    pub fn hit_count(&self, id: ResponseId) -> u64 {
        self.state.lock().hits.get(&id).copied().unwrap_or(0)
    }
}
