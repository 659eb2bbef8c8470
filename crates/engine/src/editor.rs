//! Create/edit workflow for a single expense.

use api_types::{
    expense::{ComplianceState, ExpenseCategory, ExpenseRecord},
    person::Person,
};
use chrono::Datelike;
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    attachments::{AttachmentItem, AttachmentKey, AttachmentSet, PendingAttachment},
    cache::{DocumentCache, LocalDocument},
    service::ExpenseService,
};

/// Field values of the expense form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpenseForm {
    pub person: Option<Person>,
    pub year: String,
    pub raw_date: String,
    pub category: ExpenseCategory,
    pub description: String,
}

impl Default for ExpenseForm {
    fn default() -> Self {
        Self {
            person: None,
            year: chrono::Local::now().year().to_string(),
            raw_date: String::new(),
            category: ExpenseCategory::VisitaMedica,
            description: String::new(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExpenseEditor {
    original: Option<ExpenseRecord>,
    attachments: AttachmentSet,
}

impl ExpenseEditor {
    /// Editor for a brand new expense.
    pub fn new() -> Self {
        Self {
            original: None,
            attachments: AttachmentSet::start_new(),
        }
    }

    /// Editor for an existing expense, seeded with its stored documents.
    pub async fn load(service: &dyn ExpenseService, id: Uuid) -> ResultEngine<Self> {
        let record = service
            .find_expense_by_id(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        Ok(Self {
            attachments: AttachmentSet::start_edit(record.documents.iter().cloned()),
            original: Some(record),
        })
    }

    pub fn is_editing(&self) -> bool {
        self.attachments.is_editing()
    }

    pub fn original(&self) -> Option<&ExpenseRecord> {
        self.original.as_ref()
    }

    pub fn attachments(&self) -> &AttachmentSet {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut AttachmentSet {
        &mut self.attachments
    }

    /// Form prefilled from the expense being edited.
    ///
    /// `persons` is the registry as loaded by the caller; when the expense's
    /// person is found there that entry is preferred.
    pub fn form(&self, persons: &[Person]) -> ExpenseForm {
        let Some(original) = &self.original else {
            return ExpenseForm::default();
        };

        let person = persons
            .iter()
            .find(|p| p.id == original.person.id)
            .cloned()
            .unwrap_or_else(|| original.person.clone());

        ExpenseForm {
            person: Some(person),
            year: original.year.clone(),
            raw_date: original.raw_date.clone().unwrap_or_default(),
            category: original.category,
            description: original.description.clone().unwrap_or_default(),
        }
    }

    /// Validates the form and builds the record plus the files to upload.
    pub fn build(&self, form: &ExpenseForm) -> ResultEngine<(ExpenseRecord, Vec<PendingAttachment>)> {
        let person = form
            .person
            .clone()
            .ok_or_else(|| EngineError::Validation("select a person".to_string()))?;
        let description = form.description.trim();
        if description.is_empty() {
            return Err(EngineError::Validation("enter a description".to_string()));
        }

        let instruction = self.attachments.commit();
        let (id, state) = match &self.original {
            Some(original) => (original.id, original.state),
            None => (Uuid::new_v4(), ComplianceState::Initial),
        };
        let raw_date = form.raw_date.trim();

        let record = ExpenseRecord {
            id,
            year: form.year.trim().to_string(),
            person,
            category: form.category,
            description: Some(description.to_string()),
            raw_date: (!raw_date.is_empty()).then(|| raw_date.to_string()),
            state,
            documents: instruction.keep,
        };

        Ok((record, instruction.upload))
    }

    /// Saves the expense. Returns the record as sent.
    pub async fn save(
        &self,
        service: &dyn ExpenseService,
        form: &ExpenseForm,
    ) -> ResultEngine<ExpenseRecord> {
        let (record, uploads) = self.build(form)?;
        service.register_expense(&record, &uploads).await?;
        tracing::info!(
            id = %record.id,
            kept = record.documents.len(),
            uploaded = uploads.len(),
            "expense saved"
        );
        Ok(record)
    }

    /// Makes the attachment with `key` available locally for viewing.
    pub async fn open(
        &self,
        service: &dyn ExpenseService,
        cache: &DocumentCache,
        key: &AttachmentKey,
    ) -> ResultEngine<LocalDocument> {
        match self.attachments.find(key) {
            Some(AttachmentItem::Stored(doc)) => cache.resolve(service, doc).await,
            Some(AttachmentItem::Pending(pending)) => {
                Ok(LocalDocument::new(pending.local_path.clone(), false))
            }
            None => Err(EngineError::NotFound(format!("{key:?}"))),
        }
    }
}
