//! CSV side of the paired writer.

use std::io::Write;

use serde::Serialize;

use super::FormatError;

pub(crate) fn write_records<T: Serialize>(
    records: &[T],
    writer: &mut dyn Write,
) -> Result<(), FormatError> {
    let mut wtr = ::csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(writer);

    for record in records {
        wtr.serialize(record)
            .map_err(|e| FormatError::Serde(Box::new(e)))?;
    }

    wtr.flush().map_err(FormatError::Io)
}
