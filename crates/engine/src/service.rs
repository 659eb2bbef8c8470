//! Seams towards the remote service.
//!
//! The engine never talks to the network itself: every read and write goes
//! through an [`ExpenseService`] handle obtained from a [`Connector`].

use std::sync::Arc;

use api_types::{expense::ExpenseRecord, person::Person};
use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::{ResultEngine, attachments::PendingAttachment, settings::ConnectionConfig};

/// Chunks of a stored document, in order.
pub type DocumentStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// Operations offered by the remote service.
#[async_trait]
pub trait ExpenseService: Send + Sync {
    async fn find_persons(&self) -> ResultEngine<Vec<Person>>;

    async fn register_person(&self, person: &Person) -> ResultEngine<()>;

    async fn find_expenses_by_year(&self, year: &str) -> ResultEngine<Vec<ExpenseRecord>>;

    async fn find_expense_by_id(&self, id: Uuid) -> ResultEngine<Option<ExpenseRecord>>;

    /// Persists `record` and uploads every file in `uploads`.
    ///
    /// `record.documents` is the full set of stored documents to keep. The
    /// service removes anything else attached to the expense.
    async fn register_expense(
        &self,
        record: &ExpenseRecord,
        uploads: &[PendingAttachment],
    ) -> ResultEngine<()>;

    /// Re-evaluates the compliance state of every expense of `year`.
    async fn run_compliance_check(&self, year: &str) -> ResultEngine<()>;

    /// Opens a stored document. `None` when the storage has no such file.
    async fn load_file(
        &self,
        directory: &str,
        filename: &str,
    ) -> ResultEngine<Option<DocumentStream>>;
}

/// Builds a live [`ExpenseService`] handle out of a stored configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> ResultEngine<Arc<dyn ExpenseService>>;
}
