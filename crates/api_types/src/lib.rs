use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a wire name does not match any variant of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

fn parse_variant<T: Copy>(
    kind: &'static str,
    raw: &str,
    all: &[T],
    name: fn(T) -> &'static str,
) -> Result<T, UnknownVariant> {
    let wanted = raw.trim().replace(['-', ' '], "_");
    all.iter()
        .copied()
        .find(|variant| name(*variant).eq_ignore_ascii_case(&wanted))
        .ok_or_else(|| UnknownVariant {
            kind,
            value: raw.to_string(),
        })
}

pub mod person {
    use super::*;

    /// A person expenses can be recorded for. Owned by the server registry.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Person {
        pub id: Uuid,
        pub name: String,
    }

    impl Person {
        pub fn new(name: &str) -> Self {
            Self {
                id: Uuid::new_v4(),
                name: name.trim().to_string(),
            }
        }
    }
}

pub mod document {
    use super::*;

    /// Kind of supporting document, chosen when the file is picked.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum DocumentKind {
        Fattura,
        Scontrino,
        Ricetta,
        Referto,
        PagamentoTracciabile,
        Altro,
    }

    impl DocumentKind {
        pub const ALL: [Self; 6] = [
            Self::Fattura,
            Self::Scontrino,
            Self::Ricetta,
            Self::Referto,
            Self::PagamentoTracciabile,
            Self::Altro,
        ];

        /// Returns the wire name used by the server.
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Fattura => "FATTURA",
                Self::Scontrino => "SCONTRINO",
                Self::Ricetta => "RICETTA",
                Self::Referto => "REFERTO",
                Self::PagamentoTracciabile => "PAGAMENTO_TRACCIABILE",
                Self::Altro => "ALTRO",
            }
        }
    }

    impl std::fmt::Display for DocumentKind {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl std::str::FromStr for DocumentKind {
        type Err = UnknownVariant;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            parse_variant("document kind", s, &Self::ALL, Self::as_str)
        }
    }

    /// A document persisted by the storage service.
    ///
    /// `relative_path` is both the identity of the document and the location
    /// it is read back from. Paths written by Windows hosts may use `\`.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DocumentRef {
        pub relative_path: String,
        pub kind: DocumentKind,
    }

    impl DocumentRef {
        pub fn new(relative_path: &str, kind: DocumentKind) -> Self {
            Self {
                relative_path: relative_path.to_string(),
                kind,
            }
        }

        /// Storage path with every separator turned into `/`.
        pub fn normalized_path(&self) -> String {
            self.relative_path.replace('\\', "/")
        }

        /// Final segment of the storage path.
        pub fn file_name(&self) -> String {
            let normalized = self.normalized_path();
            match normalized.rsplit_once('/') {
                Some((_, name)) => name.to_string(),
                None => normalized,
            }
        }

        /// Splits the storage path into `(directory, filename)`.
        pub fn split_path(&self) -> (String, String) {
            let normalized = self.normalized_path();
            match normalized.rsplit_once('/') {
                Some((dir, name)) => (dir.to_string(), name.to_string()),
                None => (String::new(), normalized),
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FileGet {
        pub directory: String,
        pub filename: String,
    }
}

pub mod expense {
    use super::*;
    use crate::{
        document::{DocumentKind, DocumentRef},
        person::Person,
    };

    /// Deductible expense category.
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum ExpenseCategory {
        VisitaMedica,
        Farmaci,
        AnalisiCliniche,
        Dentista,
        Occhiali,
        Veterinario,
        Istruzione,
        Sport,
        Altro,
    }

    impl ExpenseCategory {
        pub const ALL: [Self; 9] = [
            Self::VisitaMedica,
            Self::Farmaci,
            Self::AnalisiCliniche,
            Self::Dentista,
            Self::Occhiali,
            Self::Veterinario,
            Self::Istruzione,
            Self::Sport,
            Self::Altro,
        ];

        pub fn as_str(self) -> &'static str {
            match self {
                Self::VisitaMedica => "VISITA_MEDICA",
                Self::Farmaci => "FARMACI",
                Self::AnalisiCliniche => "ANALISI_CLINICHE",
                Self::Dentista => "DENTISTA",
                Self::Occhiali => "OCCHIALI",
                Self::Veterinario => "VETERINARIO",
                Self::Istruzione => "ISTRUZIONE",
                Self::Sport => "SPORT",
                Self::Altro => "ALTRO",
            }
        }
    }

    impl std::fmt::Display for ExpenseCategory {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl std::str::FromStr for ExpenseCategory {
        type Err = UnknownVariant;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            parse_variant("expense category", s, &Self::ALL, Self::as_str)
        }
    }

    /// Completion status of an expense.
    ///
    /// Computed by the server's compliance rules only; clients display it and
    /// send it back untouched.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum ComplianceState {
        #[default]
        Initial,
        Partial,
        Completed,
    }

    impl ComplianceState {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Initial => "INITIAL",
                Self::Partial => "PARTIAL",
                Self::Completed => "COMPLETED",
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ExpenseRecord {
        pub id: Uuid,
        pub year: String,
        pub person: Person,
        pub category: ExpenseCategory,
        pub description: Option<String>,
        /// Date as typed by the user, conventionally `dd/MM/yyyy`.
        pub raw_date: Option<String>,
        #[serde(default)]
        pub state: ComplianceState,
        #[serde(default)]
        pub documents: Vec<DocumentRef>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpensesByYear {
        pub year: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseGet {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ComplianceCheck {
        pub year: String,
    }

    /// Metadata for one uploaded file, in the same order as the file parts.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct UploadMeta {
        pub name: String,
        pub kind: DocumentKind,
    }

    /// JSON part of the multipart save request.
    ///
    /// `expense.documents` is the complete set of stored documents to keep;
    /// the server drops any other document attached to the expense.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseRegister {
        pub expense: ExpenseRecord,
        pub uploads: Vec<UploadMeta>,
    }
}
