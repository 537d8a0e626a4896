use csv::{ByteRecord, Reader, ReaderBuilder};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::ParseError;
use crate::schema::TableSchema;
use crate::writer::RowValues;

/// A well-formed source row ready for insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// 1-based line number in the source file
    pub line: u64,
    pub values: RowValues,
}

/// Outcome of parsing one source record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Row(ParsedRow),
    Malformed(ParseError),
}

/// Lazy reader over one registry source file.
///
/// Yields one [`Record`] per data line. Not restartable: re-open the file to
/// parse it again.
pub struct RowReader<R: Read> {
    reader: Reader<R>,
    schema: &'static TableSchema,
    record: ByteRecord,
}

impl RowReader<File> {
    pub fn open(path: &Path, schema: &'static TableSchema) -> csv::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file, schema))
    }
}

impl<R: Read> RowReader<R> {
    pub fn new(source: R, schema: &'static TableSchema) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(schema.has_header)
            .flexible(true)
            .from_reader(source);

        Self {
            reader,
            schema,
            record: ByteRecord::new(),
        }
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = csv::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => {
                let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                Some(Ok(parse_record(&self.record, line, self.schema)))
            }
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Convert one raw record into positional column values
pub fn parse_record(record: &ByteRecord, line: u64, schema: &TableSchema) -> Record {
    let expected = schema.columns.len();
    let mut fields: Vec<&[u8]> = record.iter().collect();

    // Registry lines end with a trailing comma
    let trailing_blank = fields
        .last()
        .is_some_and(|f| f.iter().all(u8::is_ascii_whitespace));
    if fields.len() == expected + 1 && trailing_blank {
        fields.pop();
    }

    if fields.len() != expected {
        return Record::Malformed(ParseError::ColumnCount {
            line,
            expected,
            found: fields.len(),
        });
    }

    let mut values = Vec::with_capacity(expected);
    for (col, raw) in schema.columns.iter().zip(fields) {
        let value = String::from_utf8_lossy(raw).trim().to_string();
        if value.is_empty() {
            if col.required {
                return Record::Malformed(ParseError::MissingValue {
                    line,
                    column: col.name,
                });
            }
            values.push(None);
        } else {
            values.push(Some(value));
        }
    }

    Record::Row(ParsedRow { line, values })
}
