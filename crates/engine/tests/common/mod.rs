#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use api_types::{
    document::{DocumentKind, DocumentRef},
    expense::{ComplianceState, ExpenseCategory, ExpenseRecord},
    person::Person,
};
use async_trait::async_trait;
use engine::{
    Connector, ConnectionConfig, DocumentStream, EngineError, ExpenseService, PendingAttachment,
    ResultEngine,
};
use futures::stream;
use uuid::Uuid;

/// In-memory stand-in for the remote service.
#[derive(Default)]
pub struct FakeService {
    pub persons: Mutex<Vec<Person>>,
    pub expenses: Mutex<Vec<ExpenseRecord>>,
    /// Stored files keyed by `directory/filename`.
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    /// Files whose stream breaks after the first chunk.
    pub broken: Mutex<HashSet<String>>,
    /// When set, every `load_file` fails with this service error.
    pub storage_error: Mutex<Option<String>>,
    pub loads: AtomicUsize,
    pub checks: Mutex<Vec<String>>,
    pub saves: Mutex<Vec<(ExpenseRecord, Vec<PendingAttachment>)>>,
}

impl FakeService {
    pub fn put_file(&self, path: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
    }

    pub fn break_file(&self, path: &str) {
        self.broken.lock().unwrap().insert(path.to_string());
    }

    pub fn repair_file(&self, path: &str) {
        self.broken.lock().unwrap().remove(path);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn expense(&self, id: Uuid) -> Option<ExpenseRecord> {
        self.expenses
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }
}

#[async_trait]
impl ExpenseService for FakeService {
    async fn find_persons(&self) -> ResultEngine<Vec<Person>> {
        Ok(self.persons.lock().unwrap().clone())
    }

    async fn register_person(&self, person: &Person) -> ResultEngine<()> {
        self.persons.lock().unwrap().push(person.clone());
        Ok(())
    }

    async fn find_expenses_by_year(&self, year: &str) -> ResultEngine<Vec<ExpenseRecord>> {
        Ok(self
            .expenses
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.year == year)
            .cloned()
            .collect())
    }

    async fn find_expense_by_id(&self, id: Uuid) -> ResultEngine<Option<ExpenseRecord>> {
        Ok(self.expense(id))
    }

    async fn register_expense(
        &self,
        record: &ExpenseRecord,
        uploads: &[PendingAttachment],
    ) -> ResultEngine<()> {
        let mut stored = record.clone();
        for upload in uploads {
            let path = format!("{}/{}/{}", record.year, record.person.name, upload.display_name);
            stored.documents.push(DocumentRef::new(&path, upload.kind));
        }

        let mut expenses = self.expenses.lock().unwrap();
        expenses.retain(|e| e.id != record.id);
        expenses.push(stored);
        self.saves
            .lock()
            .unwrap()
            .push((record.clone(), uploads.to_vec()));
        Ok(())
    }

    async fn run_compliance_check(&self, year: &str) -> ResultEngine<()> {
        self.checks.lock().unwrap().push(year.to_string());
        for expense in self.expenses.lock().unwrap().iter_mut() {
            if expense.year == year && !expense.documents.is_empty() {
                expense.state = ComplianceState::Completed;
            }
        }
        Ok(())
    }

    async fn load_file(
        &self,
        directory: &str,
        filename: &str,
    ) -> ResultEngine<Option<DocumentStream>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.storage_error.lock().unwrap().clone() {
            return Err(EngineError::Service(message));
        }
        let key = if directory.is_empty() {
            filename.to_string()
        } else {
            format!("{directory}/{filename}")
        };

        let Some(content) = self.files.lock().unwrap().get(&key).cloned() else {
            return Ok(None);
        };
        let (head, tail) = content.split_at(content.len() / 2);
        let second: std::io::Result<Vec<u8>> = if self.broken.lock().unwrap().contains(&key) {
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "share went away",
            ))
        } else {
            Ok(tail.to_vec())
        };
        let chunks = vec![Ok(head.to_vec()), second];
        let stream: DocumentStream = Box::pin(stream::iter(chunks));
        Ok(Some(stream))
    }
}

/// Connects to [`FakeService`] for the hosts it knows about.
pub struct FakeConnector {
    pub service: Arc<FakeService>,
    pub reachable: Mutex<HashSet<String>>,
    /// Per-host services overriding `service`.
    pub services: Mutex<HashMap<String, Arc<FakeService>>>,
    /// Hosts whose connect waits for `gate`.
    pub gated: Mutex<HashSet<String>>,
    pub gate: tokio::sync::Mutex<()>,
    pub attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn new(service: Arc<FakeService>, reachable: &[&str]) -> Self {
        Self {
            service,
            reachable: Mutex::new(reachable.iter().map(|h| h.to_string()).collect()),
            services: Mutex::new(HashMap::new()),
            gated: Mutex::new(HashSet::new()),
            gate: tokio::sync::Mutex::new(()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, config: &ConnectionConfig) -> ResultEngine<Arc<dyn ExpenseService>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let gated = self.gated.lock().unwrap().contains(&config.host);
        if gated {
            let _open = self.gate.lock().await;
        }

        if !self.reachable.lock().unwrap().contains(&config.host) {
            return Err(EngineError::Service(format!("{} unreachable", config.host)));
        }
        let service = self
            .services
            .lock()
            .unwrap()
            .get(&config.host)
            .cloned()
            .unwrap_or_else(|| self.service.clone());
        let service: Arc<dyn ExpenseService> = service;
        Ok(service)
    }
}

pub fn person(name: &str) -> Person {
    Person::new(name)
}

pub fn expense(
    person: &Person,
    year: &str,
    category: ExpenseCategory,
    documents: Vec<DocumentRef>,
) -> ExpenseRecord {
    ExpenseRecord {
        id: Uuid::new_v4(),
        year: year.to_string(),
        person: person.clone(),
        category,
        description: Some("visita".to_string()),
        raw_date: Some("10/03/2025".to_string()),
        state: ComplianceState::Initial,
        documents,
    }
}

pub fn doc(path: &str) -> DocumentRef {
    DocumentRef::new(path, DocumentKind::Fattura)
}
