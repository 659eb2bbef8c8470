//! Client core of TaxReport.
//!
//! Everything here runs on the device: reconciling the attachments of an
//! expense being edited, caching stored documents, filtering a year's
//! expenses and holding the connection to the remote service. Persistence,
//! compliance rules and document storage belong to the service and are only
//! reached through [`ExpenseService`].

pub use attachments::{
    AttachmentItem, AttachmentKey, AttachmentSet, PendingAttachment, SaveInstruction,
};
pub use cache::{DocumentCache, LocalDocument};
pub use editor::{ExpenseEditor, ExpenseForm};
pub use error::EngineError;
pub use filter::ExpenseFilter;
pub use listing::{ComplianceSummary, YearListing};
pub use service::{Connector, DocumentStream, ExpenseService};
pub use session::{Session, SessionBuilder};
pub use settings::{ConfigStore, ConnectionConfig};

pub mod attachments;
pub mod cache;
mod editor;
mod error;
mod filter;
pub mod listing;
mod service;
mod session;
pub mod settings;

pub type ResultEngine<T> = Result<T, EngineError>;
