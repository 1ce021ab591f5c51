// Rapport - a banded report generator.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::value::Value;

/// Where rows come from.  The engine pulls one row at a time; column
/// ordering is positional and fixed for the whole run, established when
/// the report's column references were bound.
///
/// Rows are expected to arrive already sorted by the report's group
/// columns, outermost group first.
pub trait RowSource {
    /// Column names, in row position order.
    fn columns(&self) -> &[String];

    /// The next row, or `None` at end of data.
    fn read_row(&mut self) -> Result<Option<Vec<Value>>>;

    /// Releases whatever the source holds open.  Called once after the
    /// last `read_row`, on every exit path.
    fn close(&mut self) {}
}

/// A character-separated-values source with a header line.
pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    columns: Vec<String>,
    record: csv::StringRecord,
}

impl CsvSource<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(csv::Reader::from_path(path)?)
    }
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        Self::new(csv::Reader::from_reader(reader))
    }

    fn new(mut reader: csv::Reader<R>) -> Result<Self> {
        let columns = reader
            .headers()?
            .iter()
            .map(|name| name.trim().to_string())
            .collect();
        Ok(Self {
            reader,
            columns,
            record: csv::StringRecord::new(),
        })
    }
}

impl<R: Read> RowSource for CsvSource<R> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn read_row(&mut self) -> Result<Option<Vec<Value>>> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        Ok(Some(self.record.iter().map(Value::parse).collect()))
    }
}

/// An in-memory source, mostly for tests and embedding.
pub struct Rows {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
}

impl Rows {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: VecDeque::new(),
        }
    }

    pub fn with_row<V: Into<Value>>(mut self, row: impl IntoIterator<Item = V>) -> Self {
        self.rows.push_back(row.into_iter().map(Into::into).collect());
        self
    }
}

impl RowSource for Rows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn read_row(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }
}
