//! Person/category selection over a year's expenses.

use std::collections::BTreeSet;

use api_types::expense::{ExpenseCategory, ExpenseRecord};
use uuid::Uuid;

/// Two independent selection sets combined with AND.
///
/// An empty set selects everything for its dimension.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpenseFilter {
    persons: BTreeSet<Uuid>,
    categories: BTreeSet<ExpenseCategory>,
}

impl ExpenseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_persons(mut self, persons: impl IntoIterator<Item = Uuid>) -> Self {
        self.persons.extend(persons);
        self
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = ExpenseCategory>) -> Self {
        self.categories.extend(categories);
        self
    }

    pub fn persons(&self) -> &BTreeSet<Uuid> {
        &self.persons
    }

    pub fn categories(&self) -> &BTreeSet<ExpenseCategory> {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty() && self.categories.is_empty()
    }

    pub fn matches(&self, record: &ExpenseRecord) -> bool {
        let person_ok = self.persons.is_empty() || self.persons.contains(&record.person.id);
        let category_ok = self.categories.is_empty() || self.categories.contains(&record.category);
        person_ok && category_ok
    }

    /// Matching records, in input order.
    pub fn apply<'a>(&self, all: &'a [ExpenseRecord]) -> Vec<&'a ExpenseRecord> {
        all.iter().filter(|record| self.matches(record)).collect()
    }
}
