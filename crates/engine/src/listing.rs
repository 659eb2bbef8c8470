//! Expenses of one year, as shown on the dashboard.

use std::cmp::Reverse;

use api_types::expense::{ComplianceState, ExpenseRecord};
use chrono::NaiveDate;

use crate::{ResultEngine, filter::ExpenseFilter, service::ExpenseService};

const RAW_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComplianceSummary {
    pub completed: usize,
    /// Everything not completed yet.
    pub pending: usize,
}

#[derive(Clone, Debug)]
pub struct YearListing {
    year: String,
    expenses: Vec<ExpenseRecord>,
}

impl YearListing {
    pub async fn load(service: &dyn ExpenseService, year: &str) -> ResultEngine<Self> {
        let mut expenses = service.find_expenses_by_year(year).await?;
        sort_newest_first(&mut expenses);
        tracing::debug!(year, count = expenses.len(), "expenses loaded");
        Ok(Self {
            year: year.to_string(),
            expenses,
        })
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn expenses(&self) -> &[ExpenseRecord] {
        &self.expenses
    }

    pub fn visible(&self, filter: &ExpenseFilter) -> Vec<&ExpenseRecord> {
        filter.apply(&self.expenses)
    }

    pub fn summary(&self) -> ComplianceSummary {
        summarize(&self.expenses)
    }

    /// Asks the server to re-run its compliance rules, then reloads.
    pub async fn recheck(&mut self, service: &dyn ExpenseService) -> ResultEngine<()> {
        let year = self.year.clone();
        service.run_compliance_check(&year).await?;
        *self = Self::load(service, &year).await?;
        Ok(())
    }
}

/// Parses a `dd/MM/yyyy` date, `None` when it does not match.
pub fn parse_raw_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), RAW_DATE_FORMAT).ok()
}

/// Most recent first. Records without a readable date go last, in their
/// original order.
pub fn sort_newest_first(expenses: &mut [ExpenseRecord]) {
    expenses.sort_by_key(|record| Reverse(record.raw_date.as_deref().and_then(parse_raw_date)));
}

pub fn summarize<'a>(expenses: impl IntoIterator<Item = &'a ExpenseRecord>) -> ComplianceSummary {
    expenses
        .into_iter()
        .fold(ComplianceSummary::default(), |mut summary, record| {
            if record.state == ComplianceState::Completed {
                summary.completed += 1;
            } else {
                summary.pending += 1;
            }
            summary
        })
}
