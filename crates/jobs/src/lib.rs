//! Asynchronous catalog work: the operation ledger, product listings, bulk
//! import, report export, and the supervisor that runs detached jobs.
//!
//! Services depend on the [`store`] traits rather than on PostgreSQL
//! directly; [`pg::PgStore`] is the production implementation.

pub mod error;
pub mod export;
pub mod import;
pub mod ledger;
pub mod listing;
pub mod pg;
pub mod store;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use error::{JobError, SinkError};
pub use export::{report_channel, ChannelSink, ReportExportJob, ReportSink};
pub use import::{BulkImportJob, ImportRequest};
pub use ledger::{LedgerError, OperationLedger};
pub use listing::{ListingRequest, ListingService};
pub use pg::PgStore;
pub use store::{CatalogStore, OperationStore, StoreError};
pub use supervisor::JobSupervisor;
