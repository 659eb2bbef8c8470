//! CSV export of a year's expenses

use std::io::Write;

use api_types::expense::ExpenseRecord;
use csv::Writer;
use serde::Serialize;

use crate::error::Result;

#[derive(Serialize)]
struct ExportRow<'a> {
    id: String,
    year: &'a str,
    date: &'a str,
    person: &'a str,
    category: &'static str,
    description: &'a str,
    state: &'static str,
    documents: usize,
}

pub fn write_csv<'a, W: Write>(
    out: W,
    expenses: impl IntoIterator<Item = &'a ExpenseRecord>,
) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    for record in expenses {
        writer.serialize(ExportRow {
            id: record.id.to_string(),
            year: &record.year,
            date: record.raw_date.as_deref().unwrap_or_default(),
            person: &record.person.name,
            category: record.category.as_str(),
            description: record.description.as_deref().unwrap_or_default(),
            state: record.state.as_str(),
            documents: record.documents.len(),
        })?;
    }
    writer.flush()?;
    Ok(())
}
