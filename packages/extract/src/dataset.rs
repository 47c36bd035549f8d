//! The merged, column-projected dataset and its CSV output.
//!
//! Columns are selected from the [`Column`] allow-list at the dataset level:
//! a column is written when at least one merged record carries the field,
//! and omitted entirely otherwise. Records lacking a written column get an
//! empty cell. Fields outside the allow-list are never written.

use std::borrow::Cow;
use std::io;
use std::path::Path;

use food_prices_extract_models::Column;
use food_prices_scraper::RawRecord;

/// Records from every retained query dimension, in merge order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<Column>,
    records: Vec<RawRecord>,
}

impl Dataset {
    /// Concatenates record batches in the order given and selects the
    /// allow-listed columns present in the result.
    #[must_use]
    pub fn merge<I>(batches: I) -> Self
    where
        I: IntoIterator<Item = Vec<RawRecord>>,
    {
        let records: Vec<RawRecord> = batches.into_iter().flatten().collect();
        let columns = Column::ALL
            .into_iter()
            .filter(|column| records.iter().any(|r| r.contains_key(column.name())))
            .collect();

        Self { columns, records }
    }

    /// The columns that will be written, in output order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The merged records, unprojected.
    #[must_use]
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    /// Number of records (output rows).
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes a header row followed by one row per record.
    ///
    /// # Errors
    ///
    /// Returns [`csv::Error`] if writing to `writer` fails.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(self.columns.iter().map(|column| column.name()))?;

        for record in &self.records {
            let row: Vec<Cow<'_, str>> = self
                .columns
                .iter()
                .map(|column| cell_text(record.get(column.name())))
                .collect();
            csv_writer.write_record(row.iter().map(|cell| cell.as_bytes()))?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the dataset to `path`, creating parent directories and
    /// replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`csv::Error`] if the directory or file cannot be written.
    pub fn write_to_path(&self, path: &Path) -> Result<(), csv::Error> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::File::create(path)?;
        self.write_csv(io::BufWriter::new(file))
    }
}

/// Renders one field as CSV text. Strings are written verbatim, missing and
/// null fields as empty cells, everything else as compact JSON.
fn cell_text(value: Option<&serde_json::Value>) -> Cow<'_, str> {
    match value {
        None | Some(serde_json::Value::Null) => Cow::Borrowed(""),
        Some(serde_json::Value::String(s)) => Cow::Borrowed(s),
        Some(other) => Cow::Owned(other.to_string()),
    }
}
