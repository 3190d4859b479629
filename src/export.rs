//! CSV export and import of the trip log.
//!
//! The header is the trip field names in declaration order; each row is one
//! trip. Import maps columns by header name, so column order and extra
//! columns don't matter, and runs every row through the same normalization as
//! stored records.

use std::io;

use serde_json::{Map, Value};

use crate::model::{NormalizeError, Trip, TripField, normalize_trip};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("missing column: {0}")]
    MissingColumn(&'static str),

    #[error("line {line}: {source}")]
    Row {
        line: u64,
        #[source]
        source: NormalizeError,
    },
}

pub type Result<T> = core::result::Result<T, ExportError>;

/// Writes `trips` as CSV: a header line plus one line per trip.
pub fn write_csv<'a, W: io::Write>(
    trips: impl IntoIterator<Item = &'a Trip>,
    writer: W,
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(TripField::ALL.iter().map(|f| f.name()))?;
    for trip in trips {
        csv.write_record(trip.fields())?;
    }
    csv.flush()?;
    Ok(())
}

pub fn to_csv_string<'a>(trips: impl IntoIterator<Item = &'a Trip>) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(trips, &mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

/// Reads trips from CSV. The first bad row fails the whole read.
pub fn read_csv<R: io::Read>(reader: R) -> Result<Vec<Trip>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<Option<TripField>> = csv
        .headers()?
        .iter()
        .map(TripField::from_name)
        .collect();
    if !columns.contains(&Some(TripField::Date)) {
        return Err(ExportError::MissingColumn("date"));
    }

    let mut trips = Vec::new();
    for record in csv.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);
        let mut row = Map::new();
        for (field, value) in columns.iter().zip(record.iter()) {
            if let Some(field) = field {
                row.insert(field.name().to_string(), Value::String(value.to_string()));
            }
        }
        let trip = normalize_trip(Value::Object(row))
            .map_err(|source| ExportError::Row { line, source })?;
        trips.push(trip);
    }
    Ok(trips)
}
