//! NDJSON streams of records.
//!
//! Hosts that batch records as newline-delimited JSON use these to feed documents
//! through a pipeline and write the enriched records back out.

use std::io::{BufRead, Write};

use serde::Serialize;

use crate::document::Document;
use crate::error::{ExtractError, Result};

/// NDJSON (Newline Delimited JSON) reader
///
/// Yields one [`Document`] per non-blank line, with its 1-based line number.
pub struct NdjsonReader<R: BufRead> {
    lines: std::io::Lines<R>,
    line_number: usize,
}

impl<R: BufRead> NdjsonReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for NdjsonReader<R> {
    type Item = (usize, Result<Document>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;

            let line = match line {
                Ok(line) => line,
                Err(e) => return Some((self.line_number, Err(ExtractError::Io(e)))),
            };
            if line.trim().is_empty() {
                continue;
            }

            let document = serde_json::from_str::<serde_json::Value>(&line)
                .map_err(ExtractError::from)
                .and_then(Document::from_value);
            return Some((self.line_number, document));
        }
    }
}

/// NDJSON (Newline Delimited JSON) writer
///
/// Writes records as NDJSON, one JSON object per line.
pub struct NdjsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonWriter<W> {
    /// Create a new NDJSON writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a single record as an NDJSON line
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Consume the writer, returning the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}
