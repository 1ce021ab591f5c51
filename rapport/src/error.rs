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

use thiserror::Error as ThisError;

use crate::expr::ExprError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    /// A field definition refers to a field id that does not exist.
    #[error("field {0} refers to unknown field {1}")]
    UnknownField(u64, u64),

    /// Two field definitions carry the same explicit id.
    #[error("duplicate field id {0}")]
    DuplicateField(u64),

    /// An aggregate's target is a kind of field whose values cannot be
    /// accumulated (for example, another aggregate).
    #[error("aggregate field {0} refers to field {1}, which cannot be aggregated")]
    NotAggregatable(u64, u64),

    /// A group index in a field definition is out of range.
    #[error("field {0} refers to unknown group {1}")]
    UnknownGroup(u64, usize),

    /// A column name does not appear in the data source's column list.
    #[error("column {0:?} is not present in the data source")]
    UnknownColumn(String),

    /// A parameter name is not declared by the report definition.
    #[error("parameter {0:?} is not declared by the report")]
    UnknownParameter(String),

    /// A date format string failed strftime validation.
    #[error("field {0} has invalid date format {1:?}")]
    InvalidDateFormat(u64, String),

    #[error("error evaluating expression: {0}")]
    Expr(#[from] ExprError),

    #[error("error reading report definition: {0}")]
    Definition(#[from] serde_json::Error),

    #[error("error reading data source: {0}")]
    Source(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Where the layout engine reports output-driver failures.
///
/// Driver errors do not abort with a propagated `Err`: the engine reports
/// the failure here exactly once, stops asking for data, and lets the run
/// wind down so already-open output can still be closed.
pub trait Reporter {
    fn report(&mut self, error: &Error);
}

/// Reports driver failures on standard error.
#[derive(Default)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn report(&mut self, error: &Error) {
        eprintln!("rapport: {error}");
    }
}

/// Collects reported failures; used by tests and by callers that want to
/// inspect failures after a run.
#[derive(Default)]
pub struct CollectingReporter {
    pub errors: Vec<String>,
}

impl Reporter for CollectingReporter {
    fn report(&mut self, error: &Error) {
        self.errors.push(error.to_string());
    }
}
