//! Core engines for retag: paged resource discovery, the tag rename
//! transaction, the backup ledger, and ledger-driven rollback.
//!
//! The cloud collaborators (discovery service, tag read/write service,
//! operator confirmation) are consumed through the narrow traits in
//! [`client`]; everything here is synchronous and strictly sequential.

pub mod client;
pub mod discovery;
pub mod error;
pub mod export;
pub mod ledger;
pub mod model;
pub mod report;
pub mod rollback;
pub mod transform;

pub use client::{Confirm, QueryScope, ResourceExplorer, ResourceQuery, TagClient};
pub use error::{DiscoveryError, LedgerError, ServiceError};
pub use ledger::{load_ledger, LedgerWriter};
pub use model::{BackupRecord, ResourceRecord, TagDelta, TagRename};
pub use report::{RunSummary, Tally};
