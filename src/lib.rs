//! Contract Stub
//!
//! Consumer-driven contract stubbing. A contract describes one expected
//! HTTP request and a list of example responses, each tagged with the
//! params and headers under which it applies. The stub answers requests
//! with the most specific applicable example and records which contracts
//! and examples were used, so a coverage report can be produced afterwards.
//!
//! # Features
//!
//! - **Specificity Matching**: Examples with more conditions are tried first
//! - **Subset Conditions**: Undeclared params and headers are wildcards
//! - **Routing**: Exact, prefix, regex, glob and template URL patterns
//! - **Usage Ledger**: Deduplicated record of used contracts and examples
//! - **Coverage Report**: Lists the examples a run never exercised
//!
//! # Example Contract
//!
//! ```yaml
//! schema:
//!   request:
//!     method: GET
//!     path: /users/:id
//! examples:
//!   - request:
//!       params: { id: 1 }
//!     response:
//!       body: { id: 1, first_name: Max }
//!   - response:
//!       status: 404
//! ```

pub mod config;
pub mod contract;
pub mod error;
pub mod report;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod stats;

pub use config::{ContractDocument, StubConfig, StubSettings};
pub use contract::Contract;
pub use error::{ContractError, RouterError};
pub use report::CoverageReport;
pub use request::{HttpMethod, RequestDescriptor, UrlPattern};
pub use response::{ResponseCandidate, ResponsePayload, ResponseSet};
pub use server::{RequestHandler, StubRequest, StubResponse, StubServer};
pub use stats::{ContractId, ResponseId, UsageLedger};
