//! Editable attachment set for one expense.
//!
//! An expense being created or edited carries documents of two provenances:
//! documents the server already stores ([`DocumentRef`]) and files picked on
//! this device that have not been uploaded yet ([`PendingAttachment`]). Both
//! live in a single ordered list. Saving never replays the user's edits: it
//! states the complete desired end state ([`SaveInstruction`]), so committing
//! the same set twice is harmless.

use std::path::{Path, PathBuf};

use api_types::document::{DocumentKind, DocumentRef};

/// Display name used when the picked file has no readable name.
pub const UNKNOWN_FILE_NAME: &str = "file_unknown";

/// A file picked on this device, not yet uploaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAttachment {
    /// Only meaningful for the lifetime of the current process.
    pub local_path: PathBuf,
    pub display_name: String,
    pub kind: DocumentKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentItem {
    Stored(DocumentRef),
    Pending(PendingAttachment),
}

/// Identity of an [`AttachmentItem`] inside one set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentKey {
    Stored(String),
    Pending(PathBuf),
}

impl AttachmentItem {
    pub fn key(&self) -> AttachmentKey {
        match self {
            Self::Stored(doc) => AttachmentKey::Stored(doc.relative_path.clone()),
            Self::Pending(pending) => AttachmentKey::Pending(pending.local_path.clone()),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::Stored(doc) => doc.file_name(),
            Self::Pending(pending) => pending.display_name.clone(),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Stored(doc) => doc.kind,
            Self::Pending(pending) => pending.kind,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored(_))
    }
}

/// What the save call has to do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveInstruction {
    /// Stored documents that must survive. Anything else is dropped server side.
    pub keep: Vec<DocumentRef>,
    /// Files to transfer and attach.
    pub upload: Vec<PendingAttachment>,
}

#[derive(Clone, Debug, Default)]
pub struct AttachmentSet {
    items: Vec<AttachmentItem>,
    editing: bool,
}

impl AttachmentSet {
    pub fn start_new() -> Self {
        Self::default()
    }

    /// Starts from the documents the server currently holds for an expense.
    pub fn start_edit(documents: impl IntoIterator<Item = DocumentRef>) -> Self {
        let mut set = Self {
            items: Vec::new(),
            editing: true,
        };
        for doc in documents {
            let item = AttachmentItem::Stored(doc);
            if !set.contains(&item.key()) {
                set.items.push(item);
            }
        }
        set
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn items(&self) -> &[AttachmentItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &AttachmentKey) -> bool {
        self.find(key).is_some()
    }

    pub fn find(&self, key: &AttachmentKey) -> Option<&AttachmentItem> {
        self.items.iter().find(|item| &item.key() == key)
    }

    /// Appends a picked file.
    ///
    /// Returns `false` when the same local file is already in the set.
    pub fn add_pending(
        &mut self,
        local_path: impl Into<PathBuf>,
        display_name: Option<&str>,
        kind: DocumentKind,
    ) -> bool {
        let local_path = local_path.into();
        if self.contains(&AttachmentKey::Pending(local_path.clone())) {
            return false;
        }

        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_FILE_NAME)
            .to_string();

        self.items.push(AttachmentItem::Pending(PendingAttachment {
            local_path,
            display_name,
            kind,
        }));
        true
    }

    /// Removes the item with `key`. Absent keys are ignored.
    pub fn remove(&mut self, key: &AttachmentKey) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.key() != key);
        self.items.len() != before
    }

    pub fn commit(&self) -> SaveInstruction {
        let mut instruction = SaveInstruction::default();
        for item in &self.items {
            match item {
                AttachmentItem::Stored(doc) => instruction.keep.push(doc.clone()),
                AttachmentItem::Pending(pending) => instruction.upload.push(pending.clone()),
            }
        }
        instruction
    }
}

/// Name to show for a picked file, if the file system can tell.
pub fn local_display_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}
